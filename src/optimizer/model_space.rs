//! Family-conditional search space
//!
//! A trial first picks a model family, then samples that family's own space.
//! The sampler sees the family choice as a one-parameter space over every
//! completed trial, and each family space only over that family's trials.

use super::params::FAMILY_KEY;
use super::samplers::Sampler;
use super::search_space::{ParameterValue, SearchSpace, TrialParams};
use crate::error::{PredictorError, Result};
use crate::training::ModelFamily;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSearchSpace {
    families: BTreeMap<ModelFamily, SearchSpace>,
}

impl Default for ModelSearchSpace {
    /// Gradient boosting and random forest ranges
    fn default() -> Self {
        Self::new()
            .with_family(ModelFamily::LightGbm, lightgbm_space())
            .with_family(ModelFamily::RandomForest, random_forest_space())
    }
}

/// Ranges searched for the gradient-boosted family
pub fn lightgbm_space() -> SearchSpace {
    SearchSpace::new()
        .int("n_estimators", 100, 200)
        .log_float("reg_alpha", 1e-8, 10.0)
        .log_float("reg_lambda", 1e-8, 10.0)
        .int("num_leaves", 100, 500)
        .int("max_depth", 4, 30)
        .log_float("learning_rate", 0.01, 1.0)
        .float("colsample_bytree", 0.3, 1.0)
        .float("subsample", 0.4, 1.0)
        .int("subsample_freq", 1, 7)
        .int("min_child_samples", 5, 100)
}

/// Ranges searched for the random forest family
pub fn random_forest_space() -> SearchSpace {
    SearchSpace::new()
        .int("n_estimators", 100, 500)
        .int("max_depth", 4, 30)
        .categorical("max_features", &["log2", "sqrt", "none"])
        .int("min_samples_split", 2, 10)
}

impl ModelSearchSpace {
    /// Space with no families
    pub fn new() -> Self {
        Self {
            families: BTreeMap::new(),
        }
    }

    /// Add or replace the space searched for `family`
    pub fn with_family(mut self, family: ModelFamily, space: SearchSpace) -> Self {
        self.families.insert(family, space);
        self
    }

    pub fn without_family(mut self, family: ModelFamily) -> Self {
        self.families.remove(&family);
        self
    }

    pub fn families(&self) -> Vec<ModelFamily> {
        self.families.keys().copied().collect()
    }

    pub fn space(&self, family: ModelFamily) -> Option<&SearchSpace> {
        self.families.get(&family)
    }

    pub fn validate(&self) -> Result<()> {
        if self.families.is_empty() {
            return Err(PredictorError::Config("search space has no model families".to_string()));
        }
        for space in self.families.values() {
            space.validate()?;
            if space.get(FAMILY_KEY).is_some() {
                return Err(PredictorError::Config(format!(
                    "`{}` is reserved and cannot be a hyperparameter",
                    FAMILY_KEY
                )));
            }
        }
        Ok(())
    }

    /// Sample one trial: family key plus that family's hyperparameters
    pub fn sample(&self, sampler: &mut dyn Sampler, history: &[(TrialParams, f64)]) -> Result<TrialParams> {
        let keys: Vec<&str> = self.families.keys().map(ModelFamily::key).collect();
        let family_space = SearchSpace::new().categorical(FAMILY_KEY, &keys);

        let family_history: Vec<(TrialParams, f64)> = history
            .iter()
            .filter_map(|(params, loss)| {
                params.get(FAMILY_KEY).map(|f| {
                    let mut p = TrialParams::new();
                    p.insert(FAMILY_KEY.to_string(), f.clone());
                    (p, *loss)
                })
            })
            .collect();

        let choice = sampler.sample(&family_space, &family_history);
        let family: ModelFamily = choice
            .get(FAMILY_KEY)
            .and_then(ParameterValue::as_string)
            .ok_or_else(|| PredictorError::Config("sampler returned no model family".to_string()))?
            .parse()?;
        let space = self.families.get(&family).ok_or_else(|| {
            PredictorError::Config(format!("sampler chose unknown family `{}`", family))
        })?;

        let family_value = ParameterValue::String(family.key().to_string());
        let sub_history: Vec<(TrialParams, f64)> = history
            .iter()
            .filter(|(params, _)| params.get(FAMILY_KEY) == Some(&family_value))
            .map(|(params, loss)| {
                let mut p = params.clone();
                p.remove(FAMILY_KEY);
                (p, *loss)
            })
            .collect();

        let mut params = sampler.sample(space, &sub_history);
        params.insert(FAMILY_KEY.to_string(), family_value);
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::RandomSampler;
    use std::collections::BTreeSet;

    #[test]
    fn test_samples_carry_family_and_matching_keys() {
        let space = ModelSearchSpace::default();
        assert!(space.validate().is_ok());
        let mut sampler = RandomSampler::new(11);

        let mut seen = BTreeSet::new();
        for _ in 0..40 {
            let params = space.sample(&mut sampler, &[]).unwrap();
            let family: ModelFamily = params[FAMILY_KEY].as_string().unwrap().parse().unwrap();
            seen.insert(family);

            let mut expected = space.space(family).unwrap().param_names();
            expected.push(FAMILY_KEY.to_string());
            expected.sort();
            let keys: Vec<String> = params.keys().cloned().collect();
            assert_eq!(keys, expected);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_single_family() {
        let space = ModelSearchSpace::new().with_family(ModelFamily::RandomForest, random_forest_space());
        let mut sampler = RandomSampler::new(0);
        let params = space.sample(&mut sampler, &[]).unwrap();
        assert_eq!(params[FAMILY_KEY], ParameterValue::String("rf".into()));
    }

    #[test]
    fn test_invalid_spaces() {
        assert!(ModelSearchSpace::new().validate().is_err());
        let reserved = ModelSearchSpace::new()
            .with_family(ModelFamily::Baseline, SearchSpace::new().int(FAMILY_KEY, 0, 1));
        assert!(reserved.validate().is_err());
        let empty_range = ModelSearchSpace::default()
            .with_family(ModelFamily::LightGbm, SearchSpace::new().int("num_leaves", 10, 2));
        assert!(empty_range.validate().is_err());
    }
}
