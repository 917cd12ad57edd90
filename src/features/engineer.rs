//! Feature engineering over a loaded [`Dataset`]

use super::encoder::CategoryEncoder;
use super::folds::KFold;
use super::group_stats::{Statistic, TargetStatistics};
use crate::data::{Dataset, FOLD_COLUMN};
use crate::error::{PredictorError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Settings for [`FeatureEngineer`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Number of cross-validation folds to assign
    pub n_folds: usize,
    /// Seed for the fold shuffle
    pub fold_seed: u64,
    /// Grouped target statistics to derive per categorical field
    pub statistics: Vec<Statistic>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_folds: 10,
            fold_seed: 42,
            statistics: TargetStatistics::default().statistics().to_vec(),
        }
    }
}

/// Derives model features and mutates the dataset in place.
///
/// Feature set after [`FeatureEngineer::add_features`]: numeric fields, label
/// encoded categorical fields, then grouped target statistics. Encodings and
/// statistics are fitted on the train table and applied unchanged to the test
/// table.
pub struct FeatureEngineer {
    config: FeatureConfig,
    encoder: CategoryEncoder,
    target_stats: TargetStatistics,
}

impl FeatureEngineer {
    pub fn new(config: FeatureConfig) -> Self {
        let target_stats = TargetStatistics::new(config.statistics.clone());
        Self {
            config,
            encoder: CategoryEncoder::new(),
            target_stats,
        }
    }

    /// Engineer with default statistics and the given fold count
    pub fn with_folds(n_folds: usize) -> Self {
        Self::new(FeatureConfig {
            n_folds,
            ..Default::default()
        })
    }

    /// Fitted category mapping
    pub fn encoder(&self) -> &CategoryEncoder {
        &self.encoder
    }

    /// Fitted group statistics
    pub fn target_statistics(&self) -> &TargetStatistics {
        &self.target_stats
    }

    /// Add engineered columns to both tables, and fold ids to the train table
    /// when `kfold` is set. Row count and ids are left untouched.
    pub fn add_features(&mut self, data: &mut Dataset, kfold: bool) -> Result<()> {
        let schema = data.schema().clone();
        let (n_train, n_test) = (data.n_train(), data.n_test());

        // Statistics are keyed by raw categories, so they come before encoding.
        if !schema.categorical.is_empty() && !self.config.statistics.is_empty() {
            self.target_stats
                .fit(&data.train, &schema.categorical, &schema.target)?;
            self.target_stats.transform(&mut data.train)?;
            self.target_stats.transform(&mut data.test)?;
            debug!(columns = self.target_stats.output_columns().len(), "Added group statistics");
        }

        if !schema.categorical.is_empty() {
            self.encoder.fit(&data.train, &schema.categorical)?;
            self.encoder.transform(&mut data.train)?;
            self.encoder.transform(&mut data.test)?;
            debug!(fields = schema.categorical.len(), "Encoded categorical fields");
        }

        let mut feature_names: Vec<String> = schema.numeric.clone();
        feature_names.extend(schema.categorical.iter().cloned());
        if !schema.categorical.is_empty() {
            feature_names.extend(self.target_stats.output_columns());
        }
        data.set_feature_names(feature_names);

        if kfold {
            let folds = KFold::new(self.config.n_folds)
                .with_random_state(self.config.fold_seed)
                .assign(n_train)?;
            let folds: Vec<u32> = folds.into_iter().map(|f| f as u32).collect();
            data.train
                .with_column(Series::new(FOLD_COLUMN.into(), folds))?;
        }

        if data.n_train() != n_train || data.n_test() != n_test {
            return Err(PredictorError::ShapeMismatch {
                expected: format!("{} train / {} test rows", n_train, n_test),
                actual: format!("{} train / {} test rows", data.n_train(), data.n_test()),
            });
        }

        info!(
            n_features = data.feature_names().len(),
            kfold,
            n_folds = self.config.n_folds,
            "Feature engineering complete"
        );
        Ok(())
    }
}
