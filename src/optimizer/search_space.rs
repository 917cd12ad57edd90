//! Search space definition for hyperparameters

use crate::error::{PredictorError, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous float parameter
    Float { low: f64, high: f64, log_scale: bool },
    /// Integer parameter, bounds inclusive
    Int { low: i64, high: i64 },
    /// Categorical parameter
    Categorical { choices: Vec<String> },
}

/// A single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create a float parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float { low, high, log_scale: false },
        }
    }

    /// Create a log-scale float parameter
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float { low, high, log_scale: true },
        }
    }

    /// Create an integer parameter
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high },
        }
    }

    /// Create a categorical parameter
    pub fn categorical(name: impl Into<String>, choices: &[&str]) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Categorical {
                choices: choices.iter().map(|c| c.to_string()).collect(),
            },
        }
    }

    /// Reject empty or inverted ranges
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| PredictorError::InvalidParameter {
            name: self.name.clone(),
            value: format!("{:?}", self.param_type),
            reason: reason.to_string(),
        };
        match &self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                if !(low.is_finite() && high.is_finite()) || low > high {
                    return Err(invalid("bounds must be finite with low <= high"));
                }
                if *log_scale && *low <= 0.0 {
                    return Err(invalid("log-scale bounds must be positive"));
                }
            }
            ParameterType::Int { low, high } => {
                if low > high {
                    return Err(invalid("low must not exceed high"));
                }
            }
            ParameterType::Categorical { choices } => {
                if choices.is_empty() {
                    return Err(invalid("needs at least one choice"));
                }
            }
        }
        Ok(())
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Float { low, high, log_scale } => {
                let val = if *log_scale {
                    let log_low = low.ln();
                    let log_high = high.ln();
                    (rng.gen::<f64>() * (log_high - log_low) + log_low).exp()
                } else {
                    rng.gen::<f64>() * (high - low) + low
                };
                ParameterValue::Float(val.clamp(*low, *high))
            }
            ParameterType::Int { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
            ParameterType::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len());
                ParameterValue::String(choices[idx].clone())
            }
        }
    }

    /// Position of `value` within the range, scaled to [0, 1].
    ///
    /// Log-scale floats are normalised in log space. Categorical values have no
    /// position and return `None`.
    pub fn normalize(&self, value: &ParameterValue) -> Option<f64> {
        let (pos, low, high) = match (&self.param_type, value) {
            (ParameterType::Float { low, high, log_scale: true }, v) => {
                let x = v.as_float()?;
                (x.max(f64::MIN_POSITIVE).ln(), low.ln(), high.ln())
            }
            (ParameterType::Float { low, high, .. }, v) => (v.as_float()?, *low, *high),
            (ParameterType::Int { low, high }, v) => (v.as_float()?, *low as f64, *high as f64),
            (ParameterType::Categorical { .. }, _) => return None,
        };
        if high > low {
            Some(((pos - low) / (high - low)).clamp(0.0, 1.0))
        } else {
            Some(0.0)
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            ParameterValue::String(_) => None,
        }
    }

    /// Get as int; floats must be integral
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::String(v) => f.write_str(v),
        }
    }
}

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing any earlier one with the same name
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.retain(|p| p.name != param.name);
        self.parameters.push(param);
        self
    }

    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    pub fn log_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::log_float(name, low, high))
    }

    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    pub fn categorical(self, name: impl Into<String>, choices: &[&str]) -> Self {
        self.add(Parameter::categorical(name, choices))
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        self.parameters.iter().try_for_each(Parameter::validate)
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Get parameter names in order
    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

/// Alias for sampled configuration
pub type TrialParams = BTreeMap<String, ParameterValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_search_space_builder() {
        let space = SearchSpace::new()
            .float("colsample_bytree", 0.3, 1.0)
            .int("n_estimators", 100, 200)
            .categorical("max_features", &["log2", "sqrt", "none"])
            .int("n_estimators", 100, 500);

        assert_eq!(space.len(), 3);
        assert_eq!(
            space.get("n_estimators").unwrap().param_type,
            ParameterType::Int { low: 100, high: 500 }
        );
        assert!(space.validate().is_ok());
    }

    #[test]
    fn test_sampling_stays_in_bounds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let space = SearchSpace::new()
            .log_float("reg_alpha", 1e-8, 10.0)
            .int("subsample_freq", 1, 7)
            .categorical("max_features", &["log2", "sqrt", "none"]);

        for _ in 0..200 {
            let params = space.sample(&mut rng);
            let alpha = params["reg_alpha"].as_float().unwrap();
            assert!((1e-8..=10.0).contains(&alpha));
            let freq = params["subsample_freq"].as_int().unwrap();
            assert!((1..=7).contains(&freq));
            let mf = params["max_features"].as_string().unwrap();
            assert!(["log2", "sqrt", "none"].contains(&mf));
        }
    }

    #[test]
    fn test_normalize() {
        let p = Parameter::log_float("lr", 0.01, 1.0);
        let mid = p.normalize(&ParameterValue::Float(0.1)).unwrap();
        assert!((mid - 0.5).abs() < 1e-12);

        let p = Parameter::int("depth", 4, 30);
        assert_eq!(p.normalize(&ParameterValue::Int(4)), Some(0.0));
        assert_eq!(p.normalize(&ParameterValue::Int(30)), Some(1.0));

        let p = Parameter::categorical("mf", &["sqrt"]);
        assert_eq!(p.normalize(&ParameterValue::String("sqrt".into())), None);
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(Parameter::int("n", 5, 1).validate().is_err());
        assert!(Parameter::log_float("a", 0.0, 1.0).validate().is_err());
        assert!(Parameter::categorical("c", &[]).validate().is_err());
    }

    #[test]
    fn test_value_json_shape() {
        let mut params = TrialParams::new();
        params.insert("n".into(), ParameterValue::Int(3));
        params.insert("lr".into(), ParameterValue::Float(0.5));
        params.insert("mf".into(), ParameterValue::String("sqrt".into()));
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"lr":0.5,"mf":"sqrt","n":3}"#);
        let back: TrialParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
