//! Feature engineering
//!
//! - [`CategoryEncoder`] - label encoding with an explicit, persisted mapping
//! - [`TargetStatistics`] - grouped target statistics per categorical field
//! - [`KFold`] / [`holdout_split`] - fold assignment and fixed hold-out splits
//! - [`FeatureEngineer`] - applies all of the above to a [`Dataset`](crate::data::Dataset)

mod encoder;
mod engineer;
pub mod folds;
mod group_stats;

pub use encoder::{CategoryEncoder, UNSEEN_CODE};
pub use engineer::{FeatureConfig, FeatureEngineer};
pub use folds::{holdout_split, HoldoutSplit, KFold};
pub use group_stats::{Statistic, TargetStatistics};
