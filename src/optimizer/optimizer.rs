//! HyperSearch - trial loop over a model-conditional search space

use super::{
    config::SearchConfig,
    model_space::ModelSearchSpace,
    params::{HyperparamRecord, FAMILY_KEY},
    samplers::{create_sampler, Sampler},
    search_space::TrialParams,
};
use crate::error::{PredictorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Result of a single trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    /// Trial number
    pub trial_id: usize,
    /// Parameters used, including the family key
    pub params: TrialParams,
    /// Validation loss; infinite for failed trials (stored as JSON null)
    #[serde(deserialize_with = "loss_or_infinity")]
    pub value: f64,
    /// Trial duration in seconds
    pub duration_secs: f64,
    /// Error message when the trial failed
    pub error: Option<String>,
}

fn loss_or_infinity<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

impl TrialResult {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.value.is_finite()
    }
}

/// Study containing all trials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    /// All trial results
    pub trials: Vec<TrialResult>,
    /// Best trial index
    pub best_trial_idx: Option<usize>,
    /// Total duration
    pub total_duration_secs: f64,
}

impl Study {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the best trial
    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.map(|idx| &self.trials[idx])
    }

    /// Get the best value
    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().map(|t| t.value)
    }

    /// Get the best parameters
    pub fn best_params(&self) -> Option<&TrialParams> {
        self.best_trial().map(|t| &t.params)
    }

    /// Add a trial result; earlier trials win ties
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();
        let is_better = result.is_complete()
            && self.best_value().map_or(true, |best| result.value < best);
        if is_better {
            self.best_trial_idx = Some(idx);
        }
        self.trials.push(result);
    }

    /// Completed trials as (params, loss) pairs
    pub fn history(&self) -> Vec<(TrialParams, f64)> {
        self.trials
            .iter()
            .filter(|t| t.is_complete())
            .map(|t| (t.params.clone(), t.value))
            .collect()
    }

    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| !t.is_complete()).count()
    }

    /// Save study to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load study from file
    pub fn load(path: &Path) -> Result<Study> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Hyperparameter search over model families.
///
/// Each trial asks the sampler for a family and its hyperparameters, then
/// reports the objective's loss back through the study history.
pub struct HyperSearch {
    config: SearchConfig,
    space: ModelSearchSpace,
    sampler: Box<dyn Sampler>,
    study: Study,
}

impl HyperSearch {
    /// Create a search with the sampler named in `config`
    pub fn new(config: SearchConfig, space: ModelSearchSpace) -> Result<Self> {
        space.validate()?;
        let sampler = create_sampler(config.sampler, config.random_state);
        Ok(Self {
            config,
            space,
            sampler,
            study: Study::new(),
        })
    }

    /// Replace the search oracle
    pub fn with_sampler(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Run the trial budget against `objective`.
    ///
    /// A failing trial aborts the search unless `catch_failures` is set, in
    /// which case it is recorded with an infinite loss and skipped by the
    /// sampler.
    pub fn optimize<F>(&mut self, mut objective: F) -> Result<&Study>
    where
        F: FnMut(&TrialParams) -> Result<f64>,
    {
        let start = Instant::now();
        let mut trials_without_improvement = 0;
        let first_id = self.study.trials.len();

        for trial_id in first_id..first_id + self.config.n_trials {
            if let Some(t) = self.config.timeout_secs {
                if start.elapsed().as_secs_f64() > t {
                    info!(trials = trial_id - first_id, "Timeout reached");
                    break;
                }
            }
            if let Some(p) = self.config.early_stopping_patience {
                if trials_without_improvement >= p {
                    info!(patience = p, "Early stopping, no improvement");
                    break;
                }
            }

            let trial_start = Instant::now();
            let history = self.study.history();
            let params = self.space.sample(self.sampler.as_mut(), &history)?;

            let outcome = objective(&params).and_then(|value| {
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(PredictorError::Data(format!("non-finite loss {}", value)))
                }
            });

            let result = match outcome {
                Ok(value) => {
                    let improved = self
                        .study
                        .best_value()
                        .map_or(true, |best| value < best - self.config.min_improvement);
                    if improved {
                        trials_without_improvement = 0;
                    } else {
                        trials_without_improvement += 1;
                    }
                    TrialResult {
                        trial_id,
                        params,
                        value,
                        duration_secs: trial_start.elapsed().as_secs_f64(),
                        error: None,
                    }
                }
                Err(err) if self.config.catch_failures => {
                    warn!(trial_id, error = %err, "Trial failed");
                    trials_without_improvement += 1;
                    TrialResult {
                        trial_id,
                        params,
                        value: f64::INFINITY,
                        duration_secs: trial_start.elapsed().as_secs_f64(),
                        error: Some(err.to_string()),
                    }
                }
                Err(err) => return Err(err),
            };

            let family = result.params.get(FAMILY_KEY).map(|v| v.to_string()).unwrap_or_default();
            let value = result.value;
            self.study.add_trial(result);
            info!(
                trial_id,
                family = %family,
                value,
                best = self.study.best_value().unwrap_or(f64::INFINITY),
                "Trial finished"
            );
        }

        self.study.total_duration_secs += start.elapsed().as_secs_f64();

        if self.study.best_trial().is_none() {
            return Err(PredictorError::InvalidState("no trial completed".to_string()));
        }
        Ok(&self.study)
    }

    /// Get the study results
    pub fn study(&self) -> &Study {
        &self.study
    }

    /// Best trial as a durable hyperparameter record
    pub fn best_record(&self) -> Result<HyperparamRecord> {
        let params = self
            .study
            .best_params()
            .ok_or_else(|| PredictorError::InvalidState("no trial completed".to_string()))?;
        HyperparamRecord::from_trial(params)
    }

    /// Parameter importances from the sampler, sorted descending
    pub fn importances(&self) -> Vec<(String, f64)> {
        self.sampler.importances(&self.study.history())
    }
}
