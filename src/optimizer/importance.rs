//! Hyperparameter importance from completed trials
//!
//! Each parameter's score is the share of loss variance explained by grouping
//! trials on that parameter (a correlation ratio). Numeric parameters with
//! many distinct values are grouped into rank bins. Scores are normalised to
//! sum to one.

use super::search_space::{ParameterValue, TrialParams};
use std::collections::{BTreeMap, BTreeSet};

const MAX_BINS: usize = 4;

/// Importance of every parameter seen in `history`, sorted descending
pub fn variance_importances(history: &[(TrialParams, f64)]) -> Vec<(String, f64)> {
    let finite: Vec<&(TrialParams, f64)> = history.iter().filter(|(_, v)| v.is_finite()).collect();
    let names: BTreeSet<&String> = finite.iter().flat_map(|(p, _)| p.keys()).collect();

    let mut scores: Vec<(String, f64)> = names
        .into_iter()
        .map(|name| {
            let rows: Vec<(&ParameterValue, f64)> = finite
                .iter()
                .filter_map(|(p, loss)| p.get(name).map(|v| (v, *loss)))
                .collect();
            (name.clone(), correlation_ratio(&rows))
        })
        .collect();

    let total: f64 = scores.iter().map(|(_, s)| s).sum();
    if total > 0.0 {
        for (_, s) in &mut scores {
            *s /= total;
        }
    }
    scores.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scores
}

fn correlation_ratio(rows: &[(&ParameterValue, f64)]) -> f64 {
    if rows.len() < 2 {
        return 0.0;
    }
    let n = rows.len() as f64;
    let mean = rows.iter().map(|(_, l)| l).sum::<f64>() / n;
    let total: f64 = rows.iter().map(|(_, l)| (l - mean).powi(2)).sum();
    if total <= 0.0 {
        return 0.0;
    }

    let between: f64 = group(rows)
        .values()
        .map(|losses| {
            let m = losses.iter().sum::<f64>() / losses.len() as f64;
            losses.len() as f64 * (m - mean).powi(2)
        })
        .sum();
    (between / total).clamp(0.0, 1.0)
}

/// Group losses by category, distinct value, or rank bin
fn group(rows: &[(&ParameterValue, f64)]) -> BTreeMap<String, Vec<f64>> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    let numeric: Option<Vec<(f64, f64)>> = rows
        .iter()
        .map(|(v, l)| v.as_float().map(|x| (x, *l)))
        .collect();

    match numeric {
        Some(mut values) => {
            let distinct: BTreeSet<u64> = values.iter().map(|(x, _)| x.to_bits()).collect();
            if distinct.len() <= MAX_BINS {
                for (x, l) in values {
                    groups.entry(x.to_string()).or_default().push(l);
                }
            } else {
                values.sort_by(|a, b| a.0.total_cmp(&b.0));
                let n = values.len();
                for (rank, (_, l)) in values.into_iter().enumerate() {
                    let bin = rank * MAX_BINS / n;
                    groups.entry(format!("bin{}", bin)).or_default().push(l);
                }
            }
        }
        None => {
            for (v, l) in rows {
                groups.entry(v.to_string()).or_default().push(*l);
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(lr: f64, mf: &str, loss: f64) -> (TrialParams, f64) {
        let mut p = TrialParams::new();
        p.insert("learning_rate".into(), ParameterValue::Float(lr));
        p.insert("max_features".into(), ParameterValue::String(mf.into()));
        (p, loss)
    }

    #[test]
    fn test_driving_parameter_ranks_first() {
        // loss follows learning_rate; max_features alternates independently
        let history: Vec<_> = (0..12)
            .map(|i| {
                let lr = 0.01 * (i + 1) as f64;
                let mf = if i % 2 == 0 { "sqrt" } else { "log2" };
                trial(lr, mf, 100.0 * lr)
            })
            .collect();

        let imp = variance_importances(&history);
        assert_eq!(imp.len(), 2);
        assert_eq!(imp[0].0, "learning_rate");
        assert!(imp[0].1 > imp[1].1);
        let sum: f64 = imp.iter().map(|(_, s)| s).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_trials_ignored_and_constant_loss() {
        let history = vec![
            trial(0.1, "sqrt", 5.0),
            trial(0.2, "log2", 5.0),
            trial(0.3, "none", f64::INFINITY),
        ];
        let imp = variance_importances(&history);
        assert!(imp.iter().all(|(_, s)| *s == 0.0));
        assert!(variance_importances(&[]).is_empty());
    }
}
