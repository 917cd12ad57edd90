//! Sampling strategies for hyperparameter optimization

use super::importance::variance_importances;
use super::search_space::{SearchSpace, TrialParams, ParameterValue};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Type of sampler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplerType {
    /// Random sampling
    Random,
    /// Tree-structured Parzen Estimator
    #[default]
    TPE,
}

/// Search oracle: proposes the next candidate from the trial history.
///
/// `history` holds only completed trials of the space being sampled.
pub trait Sampler: Send + Sync {
    /// Sample the next set of hyperparameters
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams;

    /// Estimated contribution of each parameter to loss variance, sorted
    /// descending
    fn importances(&self, history: &[(TrialParams, f64)]) -> Vec<(String, f64)> {
        variance_importances(history)
    }
}

/// Random sampler
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, search_space: &SearchSpace, _history: &[(TrialParams, f64)]) -> TrialParams {
        search_space.sample(&mut self.rng)
    }
}

/// Tree-structured Parzen Estimator sampler.
///
/// After the startup trials, draws `n_candidates` random configurations and
/// keeps the one closest to the best `gamma` share of the history relative to
/// the rest. Distances are taken on range-normalised values.
#[derive(Debug)]
pub struct TPESampler {
    rng: Xoshiro256PlusPlus,
    n_startup_trials: usize,
    gamma: f64,
    n_candidates: usize,
}

impl TPESampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
        }
    }

    /// Set number of startup trials
    pub fn with_n_startup(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Set gamma (quantile for splitting good/bad)
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma.clamp(0.01, 1.0);
        self
    }

    fn similarity(space: &SearchSpace, candidate: &TrialParams, trials: &[&TrialParams]) -> f64 {
        if trials.is_empty() {
            return 0.0;
        }

        let total: f64 = trials
            .iter()
            .map(|other| {
                let mut dist = 0.0;
                let mut count = 0;
                for (key, val) in candidate {
                    if let Some(other_val) = other.get(key) {
                        let d = Self::param_distance(space, key, val, other_val);
                        dist += d * d;
                        count += 1;
                    }
                }
                if count == 0 {
                    0.0
                } else {
                    1.0 / (1.0 + (dist / count as f64).sqrt())
                }
            })
            .sum();
        total / trials.len() as f64
    }

    fn param_distance(space: &SearchSpace, key: &str, a: &ParameterValue, b: &ParameterValue) -> f64 {
        let normalized = space
            .get(key)
            .and_then(|p| Some((p.normalize(a)?, p.normalize(b)?)));
        match normalized {
            Some((na, nb)) => (na - nb).abs(),
            None => {
                if a == b {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }
}

impl Sampler for TPESampler {
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams {
        let finite: Vec<&(TrialParams, f64)> = history.iter().filter(|(_, v)| v.is_finite()).collect();
        if finite.len() < self.n_startup_trials.max(2) {
            return search_space.sample(&mut self.rng);
        }

        let mut sorted = finite;
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

        let n_good = ((sorted.len() as f64 * self.gamma).ceil() as usize).clamp(1, sorted.len() - 1);
        let good: Vec<&TrialParams> = sorted[..n_good].iter().map(|(p, _)| p).collect();
        let bad: Vec<&TrialParams> = sorted[n_good..].iter().map(|(p, _)| p).collect();

        let mut best_params = search_space.sample(&mut self.rng);
        let mut best_score = f64::NEG_INFINITY;

        for _ in 0..self.n_candidates {
            let candidate = search_space.sample(&mut self.rng);
            let l = Self::similarity(search_space, &candidate, &good);
            let g = Self::similarity(search_space, &candidate, &bad);
            let score = l / (g + 1e-12);

            if score > best_score {
                best_score = score;
                best_params = candidate;
            }
        }

        best_params
    }
}

/// Create a sampler from type
pub fn create_sampler(sampler_type: SamplerType, seed: u64) -> Box<dyn Sampler> {
    match sampler_type {
        SamplerType::Random => Box::new(RandomSampler::new(seed)),
        SamplerType::TPE => Box::new(TPESampler::new(seed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_sampler() {
        let space = SearchSpace::new().float("lr", 0.001, 0.1).int("n", 10, 100);

        let mut sampler = RandomSampler::new(42);
        let params = sampler.sample(&space, &[]);

        assert!(params.contains_key("lr"));
        assert!(params.contains_key("n"));
    }

    #[test]
    fn test_samplers_are_seeded() {
        let space = SearchSpace::new().float("lr", 0.001, 0.1);
        let mut s1 = TPESampler::new(7);
        let mut s2 = TPESampler::new(7);
        let a: Vec<_> = (0..5).map(|_| s1.sample(&space, &[])).collect();
        let b: Vec<_> = (0..5).map(|_| s2.sample(&space, &[])).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tpe_moves_toward_good_region() {
        let space = SearchSpace::new().float("x", 0.0, 1.0);
        // loss grows with x, so good trials sit near zero
        let history: Vec<(TrialParams, f64)> = (0..40)
            .map(|i| {
                let x = i as f64 / 40.0;
                let mut params = TrialParams::new();
                params.insert("x".to_string(), ParameterValue::Float(x));
                (params, x)
            })
            .collect();

        let mut sampler = TPESampler::new(42);
        let mean: f64 = (0..20)
            .map(|_| sampler.sample(&space, &history)["x"].as_float().unwrap())
            .sum::<f64>()
            / 20.0;
        assert!(mean < 0.4, "mean sample {}", mean);
    }

    #[test]
    fn test_default_importances() {
        let sampler = RandomSampler::new(0);
        let history: Vec<(TrialParams, f64)> = (0..8)
            .map(|i| {
                let mut params = TrialParams::new();
                params.insert("n".to_string(), ParameterValue::Int(i));
                (params, i as f64)
            })
            .collect();
        let imp = sampler.importances(&history);
        assert_eq!(imp.len(), 1);
        assert!((imp[0].1 - 1.0).abs() < 1e-9);
    }
}
