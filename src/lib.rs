//! Salary predictor - regression over job postings
//!
//! This crate provides the full modelling flow for predicting salaries from
//! job-posting attributes:
//! - Loading and joining the train feature/target tables and the test table
//! - Feature engineering: category codes, grouped target statistics, k-fold ids
//! - Cross-validated comparison of candidate estimators, refit and prediction
//! - Hyperparameter search over model families with a pluggable sampler
//!
//! # Modules
//!
//! - [`data`] - Schema, CSV loading and the [`Dataset`](data::Dataset) container
//! - [`features`] - Encoders, grouped statistics and fold assignment
//! - [`training`] - Estimators, cross-validation and model selection
//! - [`optimizer`] - Search spaces, samplers and the trial loop
//! - [`pipeline`] - The `cv` and `tune` runs end to end
//! - [`config`] - Pipeline configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data and features
pub mod data;
pub mod features;

// Models
pub mod training;
pub mod optimizer;

// Runs
pub mod config;
pub mod pipeline;
pub mod cli;

pub use error::{PredictorError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PredictorError, Result};

    pub use crate::config::PipelineConfig;
    pub use crate::pipeline::{CvOutcome, Pipeline, SearchOutcome};

    pub use crate::data::{DataLoader, DataPaths, Dataset, PredictionWriter, Schema};
    pub use crate::features::{CategoryEncoder, FeatureConfig, FeatureEngineer, KFold, TargetStatistics};

    pub use crate::training::{
        Estimator, FailurePolicy, FittedModel, LightGBMConfig, ModelFamily, RandomForestConfig, Trainer,
        TrainerConfig, TrainingReport,
    };

    pub use crate::optimizer::{
        HyperSearch, HyperparamRecord, ModelSearchSpace, Sampler, SamplerType, SearchConfig, SearchSpace,
        TrialObjective,
    };
}
