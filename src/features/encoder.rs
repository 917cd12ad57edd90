//! Categorical label encoding with a persisted category → code mapping

use crate::data::string_values;
use crate::error::{PredictorError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Code assigned to categories never seen while fitting
pub const UNSEEN_CODE: i64 = -1;

/// Label encoder fitted once on the train table and reused for every other table.
///
/// Codes are assigned in sorted category order, so the mapping depends only on
/// the set of training categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    /// column name -> (category -> code)
    mappings: BTreeMap<String, BTreeMap<String, i64>>,
}

impl CategoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the mapping for each column from the categories present in `df`
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        for name in columns {
            let categories: BTreeSet<String> = string_values(df, name)?.into_iter().collect();
            let mapping = categories
                .into_iter()
                .enumerate()
                .map(|(code, category)| (category, code as i64))
                .collect();
            self.mappings.insert(name.clone(), mapping);
        }
        Ok(self)
    }

    pub fn is_fitted(&self) -> bool {
        !self.mappings.is_empty()
    }

    /// Code of `category` in `column`; [`UNSEEN_CODE`] when the category is new
    pub fn encode(&self, column: &str, category: &str) -> Result<i64> {
        let mapping = self
            .mappings
            .get(column)
            .ok_or_else(|| PredictorError::Data(format!("no encoding fitted for `{}`", column)))?;
        Ok(mapping.get(category).copied().unwrap_or(UNSEEN_CODE))
    }

    /// Number of known categories of a column
    pub fn n_categories(&self, column: &str) -> Option<usize> {
        self.mappings.get(column).map(BTreeMap::len)
    }

    /// Replace every fitted column of `df` with its integer codes
    pub fn transform(&self, df: &mut DataFrame) -> Result<()> {
        if !self.is_fitted() {
            return Err(PredictorError::NotFitted);
        }
        for (name, mapping) in &self.mappings {
            let codes: Vec<i64> = string_values(df, name)?
                .iter()
                .map(|v| mapping.get(v).copied().unwrap_or(UNSEEN_CODE))
                .collect();
            df.with_column(Series::new(name.as_str().into(), codes))?;
        }
        Ok(())
    }

    /// Save the mapping as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a mapping saved with [`CategoryEncoder::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Vec<String> {
        vec!["degree".to_string()]
    }

    #[test]
    fn test_codes_follow_sorted_categories() {
        let train = df!("degree" => &["MASTERS", "BACHELORS", "NONE", "MASTERS"]).unwrap();
        let mut enc = CategoryEncoder::new();
        enc.fit(&train, &cols()).unwrap();

        assert_eq!(enc.encode("degree", "BACHELORS").unwrap(), 0);
        assert_eq!(enc.encode("degree", "MASTERS").unwrap(), 1);
        assert_eq!(enc.encode("degree", "NONE").unwrap(), 2);
        assert_eq!(enc.n_categories("degree"), Some(3));
    }

    #[test]
    fn test_same_mapping_on_test_and_unseen_sentinel() {
        let train = df!("degree" => &["MASTERS", "BACHELORS"]).unwrap();
        let mut test = df!("degree" => &["BACHELORS", "DOCTORAL", "MASTERS"]).unwrap();

        let mut enc = CategoryEncoder::new();
        enc.fit(&train, &cols()).unwrap();
        enc.transform(&mut test).unwrap();

        let codes: Vec<Option<i64>> = test
            .column("degree")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(codes, vec![Some(0), Some(UNSEEN_CODE), Some(1)]);
    }

    #[test]
    fn test_transform_requires_fit() {
        let enc = CategoryEncoder::new();
        let mut df = df!("degree" => &["NONE"]).unwrap();
        assert!(matches!(enc.transform(&mut df), Err(PredictorError::NotFitted)));
    }

    #[test]
    fn test_save_and_load() {
        let train = df!("degree" => &["MASTERS", "NONE"]).unwrap();
        let mut enc = CategoryEncoder::new();
        enc.fit(&train, &cols()).unwrap();

        let path = std::env::temp_dir().join(format!("salary_encoder_{}.json", std::process::id()));
        enc.save(&path).unwrap();
        let loaded = CategoryEncoder::load(&path).unwrap();
        assert_eq!(loaded, enc);
        std::fs::remove_file(&path).ok();
    }
}
