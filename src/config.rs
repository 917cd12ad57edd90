//! Pipeline configuration

use crate::data::{DataPaths, Schema};
use crate::error::{PredictorError, Result};
use crate::optimizer::{SamplerType, SearchConfig};
use crate::training::{FailurePolicy, TrainerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings shared by the `cv` and `tune` runs.
///
/// Every field has a default, so a JSON config file only needs the keys it
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the three input tables
    pub data_dir: PathBuf,
    pub train_features_file: String,
    pub train_targets_file: String,
    pub test_features_file: String,

    /// Directory for checkpoints, predictions and the hyperparameter file
    pub model_dir: PathBuf,
    pub predictions_file: String,
    /// Cross-validation report, written next to the predictions
    pub report_file: String,
    /// Best hyperparameters, read by `cv` and written by `tune`
    pub params_file: Option<String>,
    /// Full trial history dump written by `tune`
    pub study_file: Option<String>,
    /// Category code mapping fitted on the train table
    pub encoder_file: String,

    pub n_folds: usize,
    pub fold_seed: u64,

    pub n_trials: usize,
    pub sampler: SamplerType,
    pub search_seed: u64,
    /// Share of the train table held out to score each trial
    pub valid_ratio: f64,
    pub split_seed: u64,
    /// Seed handed to every estimator
    pub model_seed: u64,

    pub schema: Schema,

    /// Add the mean predictor to the candidates
    pub include_baseline: bool,
    pub failure_policy: FailurePolicy,
    /// Record failing trials instead of aborting the search
    pub catch_failures: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            train_features_file: "train_features.csv".to_string(),
            train_targets_file: "train_salaries.csv".to_string(),
            test_features_file: "test_features.csv".to_string(),
            model_dir: PathBuf::from("models"),
            predictions_file: "predictions.csv".to_string(),
            report_file: "cv_report.json".to_string(),
            params_file: Some("best_hyperparams.json".to_string()),
            study_file: None,
            encoder_file: "category_codes.json".to_string(),
            n_folds: 10,
            fold_seed: 42,
            n_trials: 30,
            sampler: SamplerType::TPE,
            search_seed: 42,
            valid_ratio: 0.2,
            split_seed: 23,
            model_seed: 42,
            schema: Schema::default(),
            include_baseline: false,
            failure_policy: FailurePolicy::FailFast,
            catch_failures: false,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            PredictorError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            PredictorError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    pub fn with_n_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    pub fn with_n_trials(mut self, n_trials: usize) -> Self {
        self.n_trials = n_trials;
        self
    }

    /// Hyperparameter file name inside the model dir; `None` uses defaults
    pub fn with_params_file(mut self, file: Option<String>) -> Self {
        self.params_file = file;
        self
    }

    pub fn with_study_file(mut self, file: Option<String>) -> Self {
        self.study_file = file;
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_baseline(mut self, include: bool) -> Self {
        self.include_baseline = include;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.fold_seed = seed;
        self.search_seed = seed;
        self.model_seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_folds < 2 {
            return Err(PredictorError::Config(format!(
                "n_folds must be at least 2, got {}",
                self.n_folds
            )));
        }
        if self.n_trials == 0 {
            return Err(PredictorError::Config("n_trials must be positive".to_string()));
        }
        if !(self.valid_ratio > 0.0 && self.valid_ratio < 1.0) {
            return Err(PredictorError::Config(format!(
                "valid_ratio must be in (0, 1), got {}",
                self.valid_ratio
            )));
        }
        self.schema
            .validate()
            .map_err(|e| PredictorError::Config(e.to_string()))
    }

    pub fn data_paths(&self) -> DataPaths {
        DataPaths {
            train_features: self.data_dir.join(&self.train_features_file),
            train_targets: self.data_dir.join(&self.train_targets_file),
            test_features: self.data_dir.join(&self.test_features_file),
        }
    }

    pub fn predictions_path(&self) -> PathBuf {
        self.model_dir.join(&self.predictions_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.model_dir.join(&self.report_file)
    }

    pub fn params_path(&self) -> Option<PathBuf> {
        self.params_file.as_ref().map(|f| self.model_dir.join(f))
    }

    pub fn encoder_path(&self) -> PathBuf {
        self.model_dir.join(&self.encoder_file)
    }

    pub fn study_path(&self) -> Option<PathBuf> {
        self.study_file.as_ref().map(|f| self.model_dir.join(f))
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig::default()
            .with_model_dir(&self.model_dir)
            .with_predictions_path(self.predictions_path())
            .with_failure_policy(self.failure_policy)
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig::new()
            .with_n_trials(self.n_trials)
            .with_sampler(self.sampler)
            .with_random_state(self.search_seed)
            .with_catch_failures(self.catch_failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_folds, 10);
        assert_eq!(config.schema.target, "salary");
        assert_eq!(config.params_path(), Some(PathBuf::from("models/best_hyperparams.json")));
        assert_eq!(
            config.data_paths().train_targets,
            PathBuf::from("data/train_salaries.csv")
        );
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            PipelineConfig::new().with_n_folds(1).validate(),
            Err(PredictorError::Config(_))
        ));
        let mut config = PipelineConfig::new();
        config.valid_ratio = 1.0;
        assert!(config.validate().is_err());
        let empty = Schema::new(Vec::<String>::new(), Vec::<String>::new(), "salary", "jobId");
        assert!(matches!(
            PipelineConfig::new().with_schema(empty).validate(),
            Err(PredictorError::Config(_))
        ));
    }

    #[test]
    fn test_from_file_partial() {
        let path = std::env::temp_dir().join(format!("salary_config_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"n_folds": 5, "model_dir": "out", "failure_policy": "isolate"}"#).unwrap();
        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.n_folds, 5);
        assert_eq!(config.model_dir, PathBuf::from("out"));
        assert_eq!(config.failure_policy, FailurePolicy::Isolate);
        assert_eq!(config.n_trials, 30);

        std::fs::write(&path, r#"{"n_folds": 1}"#).unwrap();
        assert!(PipelineConfig::from_file(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
