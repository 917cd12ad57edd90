//! Search configuration

use super::SamplerType;
use serde::{Deserialize, Serialize};

/// Configuration for hyperparameter search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of trials to run
    pub n_trials: usize,

    /// Maximum time in seconds
    pub timeout_secs: Option<f64>,

    /// Sampler type
    pub sampler: SamplerType,

    /// Seed for the sampler
    pub random_state: u64,

    /// Stop after this many trials without improvement
    pub early_stopping_patience: Option<usize>,

    /// Minimum improvement to reset the patience counter
    pub min_improvement: f64,

    /// Record failing trials and continue instead of aborting the search
    pub catch_failures: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_trials: 30,
            timeout_secs: None,
            sampler: SamplerType::TPE,
            random_state: 42,
            early_stopping_patience: None,
            min_improvement: 0.0,
            catch_failures: false,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set number of trials
    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    /// Builder method to set timeout
    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Builder method to set sampler
    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.early_stopping_patience = Some(patience);
        self
    }

    pub fn with_catch_failures(mut self, catch: bool) -> Self {
        self.catch_failures = catch;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.n_trials, 30);
        assert!(matches!(config.sampler, SamplerType::TPE));
        assert!(!config.catch_failures);
        assert!(config.early_stopping_patience.is_none());
    }

    #[test]
    fn test_builder() {
        let config = SearchConfig::new()
            .with_n_trials(50)
            .with_sampler(SamplerType::Random)
            .with_patience(5);

        assert_eq!(config.n_trials, 50);
        assert!(matches!(config.sampler, SamplerType::Random));
        assert_eq!(config.early_stopping_patience, Some(5));
    }
}
