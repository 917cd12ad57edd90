//! Trial evaluation on a fixed train/validation split

use super::params::HyperparamRecord;
use super::search_space::TrialParams;
use crate::data::Dataset;
use crate::error::Result;
use crate::features::holdout_split;
use crate::training::mean_squared_error;
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

/// Scores sampled hyperparameters by validation MSE.
///
/// The split is drawn once, so every trial sees the same partition.
pub struct TrialObjective {
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_valid: Array2<f64>,
    y_valid: Array1<f64>,
    model_seed: u64,
}

impl TrialObjective {
    /// Split the engineered train table
    pub fn from_dataset(data: &Dataset, valid_ratio: f64, split_seed: u64) -> Result<Self> {
        let (x, y) = data.train_matrix()?;
        Self::from_arrays(&x, &y, valid_ratio, split_seed)
    }

    pub fn from_arrays(x: &Array2<f64>, y: &Array1<f64>, valid_ratio: f64, split_seed: u64) -> Result<Self> {
        let split = holdout_split(x.nrows(), valid_ratio, split_seed)?;
        debug!(
            n_train = split.train_indices.len(),
            n_valid = split.valid_indices.len(),
            "Hold-out split"
        );
        Ok(Self {
            x_train: x.select(Axis(0), &split.train_indices),
            y_train: y.select(Axis(0), &split.train_indices),
            x_valid: x.select(Axis(0), &split.valid_indices),
            y_valid: y.select(Axis(0), &split.valid_indices),
            model_seed: split_seed,
        })
    }

    /// Seed passed to the estimators built for each trial
    pub fn with_model_seed(mut self, seed: u64) -> Self {
        self.model_seed = seed;
        self
    }

    pub fn n_train(&self) -> usize {
        self.x_train.nrows()
    }

    pub fn n_valid(&self) -> usize {
        self.x_valid.nrows()
    }

    /// Fit the sampled family on the train part and return validation MSE
    pub fn evaluate(&self, params: &TrialParams) -> Result<f64> {
        let estimator = HyperparamRecord::from_trial(params)?.to_estimator(self.model_seed)?;
        let model = estimator.fit(&self.x_train, &self.y_train)?;
        let preds = model.predict(&self.x_valid)?;
        mean_squared_error(&self.y_valid, &preds)
    }
}
