//! Data loading and prediction output

use super::{float_values, string_values, Dataset, Schema};
use crate::error::{PredictorError, Result};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Locations of the three input tables
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub train_features: PathBuf,
    pub train_targets: PathBuf,
    pub test_features: PathBuf,
}

impl DataPaths {
    /// Standard file names inside a data directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            train_features: dir.join("train_features.csv"),
            train_targets: dir.join("train_salaries.csv"),
            test_features: dir.join("test_features.csv"),
        }
    }
}

/// CSV loader that joins the train features with their targets
pub struct DataLoader {
    /// Rows used for dtype inference in `load_csv`. Schema-driven loads read
    /// text and never infer.
    infer_schema_length: Option<usize>,
    delimiter: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(1000),
            delimiter: b',',
        }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set how many rows polars scans to infer column types
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a delimited file with a header row, inferring column types
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        self.read_csv(path, self.infer_schema_length)
    }

    /// Load a delimited file with every column read as text.
    ///
    /// Ids and category labels keep their exact spelling (`0100` stays
    /// `0100`); numeric columns are parsed later by the schema.
    pub fn load_csv_as_text(&self, path: &Path) -> Result<DataFrame> {
        self.read_csv(path, Some(0))
    }

    fn read_csv(&self, path: &Path, infer_schema_length: Option<usize>) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| PredictorError::Load(format!("{}: {}", path.display(), e)))?;

        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PredictorError::Load(format!("{}: {}", path.display(), e)))
    }

    /// Load the three tables and join train features with targets on the id column
    pub fn load(&self, paths: &DataPaths, schema: &Schema) -> Result<Dataset> {
        schema.validate()?;

        let train_features = self.load_csv_as_text(&paths.train_features)?;
        let train_targets = self.load_csv_as_text(&paths.train_targets)?;
        let test_features = self.load_csv_as_text(&paths.test_features)?;
        debug!(
            train_rows = train_features.height(),
            target_rows = train_targets.height(),
            test_rows = test_features.height(),
            "Raw tables read"
        );

        let train = join_frames(train_features, &train_targets, schema)?;
        let test = normalize_features(test_features, schema, "test features")?;
        ensure_unique_ids(&test, &schema.id, "test features")?;

        info!(
            n_train = train.height(),
            n_test = test.height(),
            "Loaded train and test tables"
        );
        Dataset::new(schema.clone(), train, test)
    }

    /// Join already-read frames, for callers that build tables in memory
    pub fn from_frames(
        train_features: DataFrame,
        train_targets: &DataFrame,
        test_features: DataFrame,
        schema: &Schema,
    ) -> Result<Dataset> {
        schema.validate()?;
        let train = join_frames(train_features, train_targets, schema)?;
        let test = normalize_features(test_features, schema, "test features")?;
        ensure_unique_ids(&test, &schema.id, "test features")?;
        Dataset::new(schema.clone(), train, test)
    }
}

fn require_columns(df: &DataFrame, columns: &[&str], table: &str) -> Result<()> {
    let present: HashSet<&str> = df.get_column_names().into_iter().map(|c| c.as_str()).collect();
    for col in columns {
        if !present.contains(col) {
            return Err(PredictorError::Schema(format!(
                "column `{}` missing from {}",
                col, table
            )));
        }
    }
    Ok(())
}

/// Keep the declared feature columns, with ids and categories as strings and
/// numerics as f64
fn normalize_features(df: DataFrame, schema: &Schema, table: &str) -> Result<DataFrame> {
    let columns = schema.feature_columns();
    require_columns(&df, &columns, table)?;

    let mut out = df.select(columns.iter().copied())?;
    let string_cols = std::iter::once(&schema.id).chain(schema.categorical.iter());
    for name in string_cols {
        let values = string_values(&out, name)
            .map_err(|e| PredictorError::Load(format!("{}: {}", table, e)))?;
        out.with_column(Series::new(name.as_str().into(), values))?;
    }
    for name in &schema.numeric {
        let values = float_values(&out, name)
            .map_err(|e| PredictorError::Load(format!("{}: {}", table, e)))?;
        out.with_column(Series::new(name.as_str().into(), values))?;
    }
    Ok(out)
}

fn ensure_unique_ids(df: &DataFrame, id: &str, table: &str) -> Result<()> {
    let ids = string_values(df, id)?;
    let mut seen = HashSet::with_capacity(ids.len());
    for value in &ids {
        if !seen.insert(value.as_str()) {
            return Err(PredictorError::Load(format!(
                "duplicate id `{}` in {}",
                value, table
            )));
        }
    }
    Ok(())
}

/// Attach the target to every feature row. Every id must match on both sides.
fn join_frames(train_features: DataFrame, train_targets: &DataFrame, schema: &Schema) -> Result<DataFrame> {
    let mut train = normalize_features(train_features, schema, "train features")?;
    ensure_unique_ids(&train, &schema.id, "train features")?;

    require_columns(train_targets, &schema.target_columns(), "train targets")?;
    ensure_unique_ids(train_targets, &schema.id, "train targets")?;

    let target_ids = string_values(train_targets, &schema.id)?;
    let target_values = float_values(train_targets, &schema.target)
        .map_err(|e| PredictorError::Load(format!("train targets: {}", e)))?;
    let lookup: HashMap<&str, f64> = target_ids
        .iter()
        .map(String::as_str)
        .zip(target_values.iter().copied())
        .collect();

    let feature_ids = string_values(&train, &schema.id)?;
    let joined: Vec<f64> = feature_ids
        .iter()
        .map(|id| {
            lookup.get(id.as_str()).copied().ok_or_else(|| {
                PredictorError::Load(format!("id `{}` has features but no target", id))
            })
        })
        .collect::<Result<_>>()?;

    if target_ids.len() != feature_ids.len() {
        let feature_set: HashSet<&str> = feature_ids.iter().map(String::as_str).collect();
        let orphan = target_ids
            .iter()
            .find(|id| !feature_set.contains(id.as_str()))
            .map(String::as_str)
            .unwrap_or("?");
        return Err(PredictorError::Load(format!(
            "id `{}` has a target but no features",
            orphan
        )));
    }

    train.with_column(Series::new(schema.target.as_str().into(), joined))?;
    Ok(train)
}

/// Writes the final id → prediction file
pub struct PredictionWriter;

impl PredictionWriter {
    /// Write `ids` and `predictions` as two columns. Lengths must match; nothing
    /// is written otherwise.
    pub fn write_csv(
        path: &Path,
        id_column: &str,
        value_column: &str,
        ids: &[String],
        predictions: &[f64],
    ) -> Result<()> {
        if ids.len() != predictions.len() {
            return Err(PredictorError::ShapeMismatch {
                expected: format!("{} predictions", ids.len()),
                actual: format!("{} predictions", predictions.len()),
            });
        }

        let mut df = DataFrame::new(vec![
            Series::new(id_column.into(), ids).into(),
            Series::new(value_column.into(), predictions).into(),
        ])?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)?;
        Ok(())
    }
}
