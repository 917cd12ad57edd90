//! Grouped target statistics per categorical field

use crate::data::{float_values, string_values};
use crate::error::{PredictorError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Summary statistic of the target within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Mean,
    Median,
    Min,
    Max,
    /// Sample standard deviation; 0 for single-row groups
    Std,
    /// Quantile in percent, e.g. `Percentile(25)`
    Percentile(u8),
}

impl Statistic {
    /// Suffix used for the derived column name
    pub fn suffix(&self) -> String {
        match self {
            Statistic::Mean => "mean".to_string(),
            Statistic::Median => "median".to_string(),
            Statistic::Min => "min".to_string(),
            Statistic::Max => "max".to_string(),
            Statistic::Std => "std".to_string(),
            Statistic::Percentile(p) => format!("p{}", p),
        }
    }

    /// Compute the statistic over a non-empty, sorted slice
    fn compute(&self, sorted: &[f64]) -> f64 {
        let n = sorted.len();
        match self {
            Statistic::Mean => sorted.iter().sum::<f64>() / n as f64,
            Statistic::Median => quantile(sorted, 0.5),
            Statistic::Min => sorted[0],
            Statistic::Max => sorted[n - 1],
            Statistic::Std => {
                if n < 2 {
                    return 0.0;
                }
                let mean = sorted.iter().sum::<f64>() / n as f64;
                let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
                var.sqrt()
            }
            Statistic::Percentile(p) => quantile(sorted, f64::from(*p) / 100.0),
        }
    }
}

/// Linear-interpolated quantile of a sorted slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Per-field lookup: category -> statistic values, plus the global fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GroupTable {
    groups: BTreeMap<String, Vec<f64>>,
    global: Vec<f64>,
}

/// Target statistics per category, fitted on train rows only.
///
/// Applying the fitted tables to any other frame never looks at that frame's
/// target; categories missing from the train rows receive the global statistic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetStatistics {
    statistics: Vec<Statistic>,
    tables: BTreeMap<String, GroupTable>,
}

impl Default for TargetStatistics {
    fn default() -> Self {
        Self::new(vec![
            Statistic::Mean,
            Statistic::Median,
            Statistic::Min,
            Statistic::Max,
            Statistic::Std,
        ])
    }
}

impl TargetStatistics {
    pub fn new(statistics: Vec<Statistic>) -> Self {
        Self {
            statistics,
            tables: BTreeMap::new(),
        }
    }

    pub fn statistics(&self) -> &[Statistic] {
        &self.statistics
    }

    /// Derived column name for a field and statistic
    pub fn column_name(field: &str, stat: Statistic) -> String {
        format!("{}_{}", field, stat.suffix())
    }

    /// Names of every column [`TargetStatistics::transform`] adds, in order
    pub fn output_columns(&self) -> Vec<String> {
        self.tables
            .keys()
            .flat_map(|field| {
                self.statistics
                    .iter()
                    .map(move |&stat| Self::column_name(field, stat))
            })
            .collect()
    }

    /// Group the train target by each categorical field
    pub fn fit(&mut self, train: &DataFrame, fields: &[String], target: &str) -> Result<&mut Self> {
        let y = float_values(train, target)?;
        if y.is_empty() {
            return Err(PredictorError::Data(
                "cannot compute group statistics on an empty table".to_string(),
            ));
        }

        let mut all = y.clone();
        all.sort_by(f64::total_cmp);
        let global: Vec<f64> = self.statistics.iter().map(|s| s.compute(&all)).collect();

        for field in fields {
            let keys = string_values(train, field)?;
            let mut grouped: HashMap<&str, Vec<f64>> = HashMap::new();
            for (key, &value) in keys.iter().zip(y.iter()) {
                grouped.entry(key.as_str()).or_default().push(value);
            }

            let groups = grouped
                .into_iter()
                .map(|(key, mut values)| {
                    values.sort_by(f64::total_cmp);
                    let stats = self.statistics.iter().map(|s| s.compute(&values)).collect();
                    (key.to_string(), stats)
                })
                .collect();

            self.tables.insert(
                field.clone(),
                GroupTable {
                    groups,
                    global: global.clone(),
                },
            );
        }
        Ok(self)
    }

    /// Value of a statistic for a category, falling back to the global value
    pub fn lookup(&self, field: &str, category: &str, stat: Statistic) -> Option<f64> {
        let idx = self.statistics.iter().position(|&s| s == stat)?;
        let table = self.tables.get(field)?;
        Some(
            table
                .groups
                .get(category)
                .map(|v| v[idx])
                .unwrap_or(table.global[idx]),
        )
    }

    /// Join the fitted statistics onto `df` by each field's category
    pub fn transform(&self, df: &mut DataFrame) -> Result<()> {
        if self.tables.is_empty() {
            return Err(PredictorError::NotFitted);
        }
        for (field, table) in &self.tables {
            let keys = string_values(df, field)?;
            for (idx, stat) in self.statistics.iter().enumerate() {
                let values: Vec<f64> = keys
                    .iter()
                    .map(|k| table.groups.get(k).map(|v| v[idx]).unwrap_or(table.global[idx]))
                    .collect();
                let name = Self::column_name(field, *stat);
                df.with_column(Series::new(name.as_str().into(), values))?;
            }
        }
        Ok(())
    }
}
