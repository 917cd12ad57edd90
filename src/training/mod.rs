//! Model training module
//!
//! Provides:
//! - Regression estimators: leaf-wise gradient boosting, random forest and a
//!   mean baseline, unified behind [`Estimator`] / [`FittedModel`]
//! - K-fold cross-validation with per-estimator checkpoints ([`Trainer`])
//! - Best-model selection, full refit and test prediction

mod checkpoint;
mod estimator;
mod metrics;
mod trainer;
pub mod decision_tree;
pub mod lightgbm;
pub mod random_forest;

pub use checkpoint::CheckpointStore;
pub use decision_tree::{RegressionTree, TreeNode};
pub use estimator::{Estimator, FittedModel, MeanRegressor, ModelFamily};
pub use lightgbm::{LightGBMConfig, LightGBMRegressor};
pub use metrics::{mean_squared_error, LossSummary};
pub use random_forest::{MaxFeatures, RandomForestConfig, RandomForestRegressor};
pub use trainer::{
    CandidateReport, FailurePolicy, Trainer, TrainerConfig, TrainerState, TrainingReport,
};
