//! Estimator families behind a single fit/predict capability

use super::lightgbm::{LightGBMConfig, LightGBMRegressor};
use super::random_forest::{RandomForestConfig, RandomForestRegressor};
use crate::error::{PredictorError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model family key, as written into hyperparameter records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelFamily {
    #[serde(rename = "lgbr")]
    LightGbm,
    #[serde(rename = "rf")]
    RandomForest,
    #[serde(rename = "baseline")]
    Baseline,
}

impl ModelFamily {
    pub fn key(&self) -> &'static str {
        match self {
            ModelFamily::LightGbm => "lgbr",
            ModelFamily::RandomForest => "rf",
            ModelFamily::Baseline => "baseline",
        }
    }

    /// Families the hyperparameter search chooses between
    pub fn searchable() -> [ModelFamily; 2] {
        [ModelFamily::LightGbm, ModelFamily::RandomForest]
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ModelFamily {
    type Err = PredictorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lgbr" | "lightgbm" => Ok(ModelFamily::LightGbm),
            "rf" | "random_forest" | "randomforest" => Ok(ModelFamily::RandomForest),
            "baseline" | "mean" => Ok(ModelFamily::Baseline),
            other => Err(PredictorError::Config(format!("unknown model family `{}`", other))),
        }
    }
}

/// An unfitted candidate estimator with its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Estimator {
    LightGbm(LightGBMConfig),
    RandomForest(RandomForestConfig),
    Baseline,
}

impl Estimator {
    pub fn family(&self) -> ModelFamily {
        match self {
            Estimator::LightGbm(_) => ModelFamily::LightGbm,
            Estimator::RandomForest(_) => ModelFamily::RandomForest,
            Estimator::Baseline => ModelFamily::Baseline,
        }
    }

    /// Display name, also used to name checkpoints
    pub fn name(&self) -> &'static str {
        match self {
            Estimator::LightGbm(_) => "LGBMRegressor",
            Estimator::RandomForest(_) => "RandomForestRegressor",
            Estimator::Baseline => "MeanRegressor",
        }
    }

    /// Fit a fresh model; any rejection surfaces as [`PredictorError::Fit`]
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FittedModel> {
        self.fit_inner(x, y)
            .map_err(|e| PredictorError::fit_failure(self.name(), e))
    }

    fn fit_inner(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FittedModel> {
        if x.nrows() != y.len() {
            return Err(PredictorError::ShapeMismatch {
                expected: format!("{} targets", x.nrows()),
                actual: format!("{} targets", y.len()),
            });
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(PredictorError::Data("non-finite value in training data".to_string()));
        }

        match self {
            Estimator::LightGbm(config) => {
                let mut model = LightGBMRegressor::new(config.clone());
                model.fit(x, y)?;
                Ok(FittedModel::LightGbm(model))
            }
            Estimator::RandomForest(config) => {
                let mut model = RandomForestRegressor::new(config.clone());
                model.fit(x, y)?;
                Ok(FittedModel::RandomForest(model))
            }
            Estimator::Baseline => Ok(FittedModel::Baseline(MeanRegressor::fit(x, y)?)),
        }
    }
}

/// Predicts the training mean for every row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanRegressor {
    mean: f64,
    n_features: usize,
}

impl MeanRegressor {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        let mean = y
            .mean()
            .ok_or_else(|| PredictorError::Data("cannot fit on zero rows".to_string()))?;
        Ok(Self { mean, n_features: x.ncols() })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(PredictorError::ShapeMismatch {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(Array1::from_elem(x.nrows(), self.mean))
    }
}

/// Fitted state of an [`Estimator`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedModel {
    LightGbm(LightGBMRegressor),
    RandomForest(RandomForestRegressor),
    Baseline(MeanRegressor),
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            FittedModel::LightGbm(_) => ModelFamily::LightGbm,
            FittedModel::RandomForest(_) => ModelFamily::RandomForest,
            FittedModel::Baseline(_) => ModelFamily::Baseline,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            FittedModel::LightGbm(m) => m.predict(x),
            FittedModel::RandomForest(m) => m.predict(x),
            FittedModel::Baseline(m) => m.predict(x),
        }
    }
}
