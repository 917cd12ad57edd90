//! Durable record of tuned hyperparameters
//!
//! The record is a flat JSON object: the reserved `regressor` key names the
//! model family and every other key is one hyperparameter of that family.

use super::search_space::{ParameterValue, TrialParams};
use crate::error::{PredictorError, Result};
use crate::training::{
    Estimator, LightGBMConfig, MaxFeatures, ModelFamily, RandomForestConfig,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Reserved key holding the model family
pub const FAMILY_KEY: &str = "regressor";

const LIGHTGBM_KEYS: [&str; 10] = [
    "n_estimators",
    "reg_alpha",
    "reg_lambda",
    "num_leaves",
    "max_depth",
    "learning_rate",
    "colsample_bytree",
    "subsample",
    "subsample_freq",
    "min_child_samples",
];

const RANDOM_FOREST_KEYS: [&str; 4] = ["n_estimators", "max_depth", "max_features", "min_samples_split"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparamRecord {
    #[serde(rename = "regressor")]
    pub family: ModelFamily,
    #[serde(flatten)]
    pub params: TrialParams,
}

impl HyperparamRecord {
    /// Split sampled trial parameters into family and hyperparameters
    pub fn from_trial(params: &TrialParams) -> Result<Self> {
        let family = params
            .get(FAMILY_KEY)
            .and_then(ParameterValue::as_string)
            .ok_or_else(|| PredictorError::Config(format!("missing `{}` key", FAMILY_KEY)))?
            .parse::<ModelFamily>()?;
        let params = params
            .iter()
            .filter(|(k, _)| k.as_str() != FAMILY_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Self { family, params })
    }

    /// Record describing an existing estimator configuration
    pub fn from_estimator(estimator: &Estimator) -> Self {
        let mut params = TrialParams::new();
        let mut put = |k: &str, v: ParameterValue| {
            params.insert(k.to_string(), v);
        };
        match estimator {
            Estimator::LightGbm(c) => {
                put("n_estimators", ParameterValue::Int(c.n_estimators as i64));
                put("reg_alpha", ParameterValue::Float(c.reg_alpha));
                put("reg_lambda", ParameterValue::Float(c.reg_lambda));
                put("num_leaves", ParameterValue::Int(c.num_leaves as i64));
                put("max_depth", ParameterValue::Int(c.max_depth.map_or(-1, |d| d as i64)));
                put("learning_rate", ParameterValue::Float(c.learning_rate));
                put("colsample_bytree", ParameterValue::Float(c.colsample_bytree));
                put("subsample", ParameterValue::Float(c.subsample));
                put("subsample_freq", ParameterValue::Int(c.subsample_freq as i64));
                put("min_child_samples", ParameterValue::Int(c.min_child_samples as i64));
            }
            Estimator::RandomForest(c) => {
                put("n_estimators", ParameterValue::Int(c.n_estimators as i64));
                put("max_depth", ParameterValue::Int(c.max_depth.map_or(-1, |d| d as i64)));
                put("min_samples_split", ParameterValue::Int(c.min_samples_split as i64));
                let mf = match c.max_features {
                    MaxFeatures::Sqrt => ParameterValue::String("sqrt".into()),
                    MaxFeatures::Log2 => ParameterValue::String("log2".into()),
                    MaxFeatures::All => ParameterValue::String("none".into()),
                    MaxFeatures::Fixed(n) => ParameterValue::Int(n as i64),
                    MaxFeatures::Fraction(f) => ParameterValue::Float(f),
                };
                put("max_features", mf);
            }
            Estimator::Baseline => {}
        }
        Self {
            family: estimator.family(),
            params,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), family = %self.family, "Hyperparameters written");
        Ok(())
    }

    /// Read a record; a missing file or key is a configuration error.
    ///
    /// A `null` `max_features` means every feature, same as `"none"`.
    pub fn read(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            PredictorError::Config(format!("cannot read hyperparameters {}: {}", path.display(), e))
        })?;
        let invalid = |e: serde_json::Error| {
            PredictorError::Config(format!("invalid hyperparameters {}: {}", path.display(), e))
        };
        let mut value: serde_json::Value = serde_json::from_str(&json).map_err(invalid)?;
        if let Some(max_features) = value.get_mut("max_features").filter(|v| v.is_null()) {
            *max_features = serde_json::Value::String("none".to_string());
        }
        serde_json::from_value(value).map_err(invalid)
    }

    /// Build the estimator this record describes.
    ///
    /// Every hyperparameter of the family must be present; unknown keys are
    /// rejected.
    pub fn to_estimator(&self, random_state: u64) -> Result<Estimator> {
        let expected: &[&str] = match self.family {
            ModelFamily::LightGbm => &LIGHTGBM_KEYS,
            ModelFamily::RandomForest => &RANDOM_FOREST_KEYS,
            ModelFamily::Baseline => &[],
        };
        if let Some(unknown) = self.params.keys().find(|k| !expected.contains(&k.as_str())) {
            return Err(PredictorError::Config(format!(
                "unexpected hyperparameter `{}` for {}",
                unknown, self.family
            )));
        }

        match self.family {
            ModelFamily::LightGbm => Ok(Estimator::LightGbm(LightGBMConfig {
                n_estimators: self.count("n_estimators")?,
                learning_rate: self.positive_float("learning_rate")?,
                num_leaves: self.count("num_leaves")?,
                max_depth: self.depth("max_depth")?,
                min_child_samples: self.count("min_child_samples")?,
                reg_lambda: self.non_negative_float("reg_lambda")?,
                reg_alpha: self.non_negative_float("reg_alpha")?,
                subsample: self.fraction("subsample")?,
                subsample_freq: self.non_negative_int("subsample_freq")?,
                colsample_bytree: self.fraction("colsample_bytree")?,
                random_state,
            })),
            ModelFamily::RandomForest => Ok(Estimator::RandomForest(RandomForestConfig {
                n_estimators: self.count("n_estimators")?,
                max_depth: self.depth("max_depth")?,
                min_samples_split: self.count("min_samples_split")?,
                max_features: self.max_features("max_features")?,
                random_state,
                ..Default::default()
            })),
            ModelFamily::Baseline => Ok(Estimator::Baseline),
        }
    }

    fn require(&self, name: &str) -> Result<&ParameterValue> {
        self.params.get(name).ok_or_else(|| {
            PredictorError::Config(format!("missing hyperparameter `{}` for {}", name, self.family))
        })
    }

    fn wrong(&self, name: &str, value: &ParameterValue, expected: &str) -> PredictorError {
        PredictorError::Config(format!(
            "hyperparameter `{}` = {} for {}: expected {}",
            name, value, self.family, expected
        ))
    }

    fn int(&self, name: &str) -> Result<i64> {
        let v = self.require(name)?;
        v.as_int().ok_or_else(|| self.wrong(name, v, "an integer"))
    }

    fn non_negative_int(&self, name: &str) -> Result<usize> {
        let i = self.int(name)?;
        usize::try_from(i).map_err(|_| self.wrong(name, &ParameterValue::Int(i), "a non-negative integer"))
    }

    fn count(&self, name: &str) -> Result<usize> {
        match self.non_negative_int(name)? {
            0 => Err(self.wrong(name, &ParameterValue::Int(0), "a positive integer")),
            n => Ok(n),
        }
    }

    /// Non-positive depth means unlimited
    fn depth(&self, name: &str) -> Result<Option<usize>> {
        let d = self.int(name)?;
        Ok(usize::try_from(d).ok().filter(|&d| d > 0))
    }

    fn float(&self, name: &str) -> Result<f64> {
        let v = self.require(name)?;
        v.as_float()
            .filter(|f| f.is_finite())
            .ok_or_else(|| self.wrong(name, v, "a finite number"))
    }

    fn non_negative_float(&self, name: &str) -> Result<f64> {
        let f = self.float(name)?;
        if f < 0.0 {
            return Err(self.wrong(name, &ParameterValue::Float(f), "a non-negative number"));
        }
        Ok(f)
    }

    fn positive_float(&self, name: &str) -> Result<f64> {
        let f = self.float(name)?;
        if f <= 0.0 {
            return Err(self.wrong(name, &ParameterValue::Float(f), "a positive number"));
        }
        Ok(f)
    }

    fn fraction(&self, name: &str) -> Result<f64> {
        let f = self.float(name)?;
        if !(f > 0.0 && f <= 1.0) {
            return Err(self.wrong(name, &ParameterValue::Float(f), "a value in (0, 1]"));
        }
        Ok(f)
    }

    fn max_features(&self, name: &str) -> Result<MaxFeatures> {
        let v = self.require(name)?;
        match v {
            ParameterValue::String(s) => match s.to_lowercase().as_str() {
                "sqrt" | "auto" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                "none" | "all" => Ok(MaxFeatures::All),
                _ => Err(self.wrong(name, v, "`sqrt`, `log2`, `none` or a number")),
            },
            ParameterValue::Int(n) if *n > 0 => Ok(MaxFeatures::Fixed(*n as usize)),
            ParameterValue::Float(f) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
            _ => Err(self.wrong(name, v, "`sqrt`, `log2`, `none` or a positive number")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ModelSearchSpace;
    use crate::optimizer::RandomSampler;
    use ndarray::{Array1, Array2};

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("salary_params_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_json_layout() {
        let record = HyperparamRecord::from_estimator(&Estimator::RandomForest(RandomForestConfig {
            n_estimators: 60,
            max_depth: Some(15),
            min_samples_split: 80,
            max_features: MaxFeatures::Fixed(8),
            ..Default::default()
        }));
        let value: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["regressor"], "rf");
        assert_eq!(value["n_estimators"], 60);
        assert_eq!(value["max_features"], 8);
        assert_eq!(value.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_sampled_params_round_trip_and_fit() {
        let space = ModelSearchSpace::default();
        let mut sampler = RandomSampler::new(3);
        let x = Array2::from_shape_fn((40, 3), |(r, c)| ((r * 7 + c * 3) % 11) as f64);
        let y = Array1::from_shape_fn(40, |r| 50.0 + (r % 9) as f64 * 10.0);

        for i in 0..6 {
            let trial = space.sample(&mut sampler, &[]).unwrap();
            let record = HyperparamRecord::from_trial(&trial).unwrap();
            let path = temp_path(&format!("rt{}", i));
            record.write(&path).unwrap();
            let back = HyperparamRecord::read(&path).unwrap();
            assert_eq!(back, record);

            let mut est = back.to_estimator(1).unwrap();
            // keep the test quick
            match &mut est {
                Estimator::LightGbm(c) => c.n_estimators = 3,
                Estimator::RandomForest(c) => c.n_estimators = 3,
                Estimator::Baseline => {}
            }
            let fitted = est.fit(&x, &y).unwrap();
            assert_eq!(fitted.predict(&x).unwrap().len(), 40);
            let _ = std::fs::remove_file(&path);
        }
    }

    #[test]
    fn test_missing_keys_are_config_errors() {
        let path = temp_path("missing");
        std::fs::write(&path, r#"{"regressor": "lgbr", "n_estimators": 100}"#).unwrap();
        let record = HyperparamRecord::read(&path).unwrap();
        assert!(matches!(record.to_estimator(0), Err(PredictorError::Config(_))));

        std::fs::write(&path, r#"{"n_estimators": 100}"#).unwrap();
        assert!(matches!(HyperparamRecord::read(&path), Err(PredictorError::Config(_))));
        let _ = std::fs::remove_file(&path);

        assert!(matches!(
            HyperparamRecord::read(Path::new("/nonexistent/best_hyperparams.json")),
            Err(PredictorError::Config(_))
        ));
    }

    #[test]
    fn test_null_max_features_means_all() {
        let path = temp_path("null_mf");
        std::fs::write(
            &path,
            r#"{"regressor": "rf", "n_estimators": 60, "max_depth": 15, "max_features": null, "min_samples_split": 80}"#,
        )
        .unwrap();
        let est = HyperparamRecord::read(&path).unwrap().to_estimator(0).unwrap();
        match est {
            Estimator::RandomForest(c) => assert_eq!(c.max_features, MaxFeatures::All),
            other => panic!("expected a random forest, got {other:?}"),
        }

        std::fs::write(&path, r#"{"regressor": "rf", "n_estimators": null}"#).unwrap();
        assert!(matches!(HyperparamRecord::read(&path), Err(PredictorError::Config(_))));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut record = HyperparamRecord::from_estimator(&Estimator::RandomForest(RandomForestConfig::default()));
        record.params.insert("max_features".into(), ParameterValue::String("half".into()));
        assert!(record.to_estimator(0).is_err());

        let mut record = HyperparamRecord::from_estimator(&Estimator::LightGbm(LightGBMConfig::default()));
        record.params.insert("subsample".into(), ParameterValue::Float(1.5));
        assert!(record.to_estimator(0).is_err());

        let mut record = HyperparamRecord::from_estimator(&Estimator::Baseline);
        record.params.insert("alpha".into(), ParameterValue::Int(1));
        assert!(record.to_estimator(0).is_err());
    }

    #[test]
    fn test_estimator_round_trip() {
        let est = Estimator::LightGbm(LightGBMConfig {
            max_depth: Some(12),
            random_state: 9,
            ..Default::default()
        });
        let back = HyperparamRecord::from_estimator(&est).to_estimator(9).unwrap();
        assert_eq!(back, est);
    }
}
