//! Dataset loading and access
//!
//! A [`Dataset`] holds the joined train table (features + target) and the test
//! table (features only) as polars frames. Feature engineering mutates the frames
//! in place; estimators read them through [`Dataset::train_matrix`] and
//! [`Dataset::test_matrix`].

mod loader;
mod schema;

pub use loader::{DataLoader, DataPaths, PredictionWriter};
pub use schema::Schema;

use crate::error::{PredictorError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Name of the fold-id column added to the train table
pub const FOLD_COLUMN: &str = "kfold";

/// Train and test tables sharing one schema
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: Schema,
    /// Train table: id, features, target (and `kfold` once assigned)
    pub train: DataFrame,
    /// Test table: id and features
    pub test: DataFrame,
    feature_names: Vec<String>,
}

impl Dataset {
    /// Build a dataset from already-joined frames.
    ///
    /// Until features are engineered only the numeric fields are usable by
    /// estimators.
    pub fn new(schema: Schema, train: DataFrame, test: DataFrame) -> Result<Self> {
        schema.validate()?;
        let feature_names = schema.numeric.clone();
        Ok(Self {
            schema,
            train,
            test,
            feature_names,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Columns fed to estimators, in matrix column order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub(crate) fn set_feature_names(&mut self, names: Vec<String>) {
        self.feature_names = names;
    }

    pub fn n_train(&self) -> usize {
        self.train.height()
    }

    pub fn n_test(&self) -> usize {
        self.test.height()
    }

    /// Whether fold ids have been assigned to the train table
    pub fn has_folds(&self) -> bool {
        self.train.column(FOLD_COLUMN).is_ok()
    }

    /// Feature matrix and target vector of the train table
    pub fn train_matrix(&self) -> Result<(Array2<f64>, Array1<f64>)> {
        let x = columns_to_array2(&self.train, &self.feature_names)?;
        let y = Array1::from_vec(float_values(&self.train, &self.schema.target)?);
        Ok((x, y))
    }

    /// Feature matrix of the test table
    pub fn test_matrix(&self) -> Result<Array2<f64>> {
        columns_to_array2(&self.test, &self.feature_names)
    }

    /// Fold id of every train row
    pub fn fold_ids(&self) -> Result<Vec<usize>> {
        let column = self.train.column(FOLD_COLUMN).map_err(|_| {
            PredictorError::Data("fold ids have not been assigned".to_string())
        })?;
        let series = column.as_materialized_series().cast(&DataType::UInt32)?;
        let ids = series
            .u32()?
            .into_iter()
            .map(|v| v.map(|f| f as usize))
            .collect::<Option<Vec<usize>>>()
            .ok_or_else(|| PredictorError::Data("null fold id".to_string()))?;
        Ok(ids)
    }

    /// Id column of the test table, in row order
    pub fn test_ids(&self) -> Result<Vec<String>> {
        string_values(&self.test, &self.schema.id)
    }

    /// Id column of the train table, in row order
    pub fn train_ids(&self) -> Result<Vec<String>> {
        string_values(&self.train, &self.schema.id)
    }
}

/// Read a column as strings. Nulls are rejected.
pub(crate) fn string_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df
        .column(name)
        .map_err(|_| PredictorError::Schema(format!("column `{}` not found", name)))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    series
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::to_string)
                .ok_or_else(|| PredictorError::Data(format!("null value in column `{}`", name)))
        })
        .collect()
}

/// Read a column as f64. Nulls are rejected.
pub(crate) fn float_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PredictorError::Schema(format!("column `{}` not found", name)))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .map(|v| v.ok_or_else(|| PredictorError::Data(format!("null value in column `{}`", name))))
        .collect()
}

/// Extract named columns from a frame into a row-major matrix
fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| float_values(df, name))
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, col_names.len()), |(r, c)| {
        col_data[c][r]
    }))
}
