//! Column schema for the job-posting tables

use crate::error::{PredictorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Declared column roles. The four sets never overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Categorical field names
    pub categorical: Vec<String>,
    /// Numeric field names
    pub numeric: Vec<String>,
    /// Target field name
    pub target: String,
    /// Unique id field name
    pub id: String,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new(
            ["companyId", "jobType", "degree", "major", "industry"],
            ["yearsExperience", "milesFromMetropolis"],
            "salary",
            "jobId",
        )
    }
}

impl Schema {
    /// Create a schema from column names
    pub fn new<C, N>(categorical: C, numeric: N, target: impl Into<String>, id: impl Into<String>) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        Self {
            categorical: categorical.into_iter().map(Into::into).collect(),
            numeric: numeric.into_iter().map(Into::into).collect(),
            target: target.into(),
            id: id.into(),
        }
    }

    /// Check that no column is declared twice across roles
    pub fn validate(&self) -> Result<()> {
        if self.categorical.is_empty() && self.numeric.is_empty() {
            return Err(PredictorError::Schema(
                "schema declares no categorical or numeric fields".to_string(),
            ));
        }
        if self.target == self.id {
            return Err(PredictorError::Schema(format!(
                "target and id both name `{}`",
                self.target
            )));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(self.target.as_str());
        seen.insert(self.id.as_str());
        for name in self.categorical.iter().chain(self.numeric.iter()) {
            if !seen.insert(name.as_str()) {
                return Err(PredictorError::Schema(format!(
                    "column `{}` is declared in more than one role",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Feature columns expected in a features file (id first)
    pub fn feature_columns(&self) -> Vec<&str> {
        std::iter::once(self.id.as_str())
            .chain(self.categorical.iter().map(String::as_str))
            .chain(self.numeric.iter().map(String::as_str))
            .collect()
    }

    /// Columns expected in the targets file
    pub fn target_columns(&self) -> Vec<&str> {
        vec![self.id.as_str(), self.target.as_str()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_is_valid() {
        let schema = Schema::default();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.feature_columns().len(), 8);
        assert_eq!(schema.feature_columns()[0], "jobId");
    }

    #[test]
    fn test_overlap_rejected() {
        let schema = Schema::new(["degree", "major"], ["major"], "salary", "jobId");
        let err = schema.validate().unwrap_err();
        assert!(matches!(err, PredictorError::Schema(_)));
    }

    #[test]
    fn test_target_in_features_rejected() {
        let schema = Schema::new(["salary"], ["yearsExperience"], "salary", "jobId");
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_empty_schema_rejected() {
        let schema = Schema::new(Vec::<String>::new(), Vec::<String>::new(), "salary", "jobId");
        assert!(schema.validate().is_err());
    }
}
