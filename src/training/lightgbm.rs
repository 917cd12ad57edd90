//! LightGBM-style gradient boosting regressor with leaf-wise tree growth
//!
//! - Leaf-wise (best-first) tree growth bounded by `num_leaves` and `max_depth`
//! - Row bagging (`subsample`) refreshed every `subsample_freq` iterations
//! - Per-tree column sampling (`colsample_bytree`)
//! - L1 / L2 regularised leaf weights (`reg_alpha`, `reg_lambda`)

use crate::error::{PredictorError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGBMConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Maximum leaves per tree
    pub num_leaves: usize,
    pub max_depth: Option<usize>,
    /// Minimum rows per leaf
    pub min_child_samples: usize,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    /// Fraction of rows drawn for each bagging round
    pub subsample: f64,
    /// Iterations between bagging rounds; 0 disables bagging
    pub subsample_freq: usize,
    pub colsample_bytree: f64,
    pub random_state: u64,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
            subsample: 1.0,
            subsample_freq: 0,
            colsample_bytree: 1.0,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum LGBNode {
    Leaf { value: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<LGBNode>,
        right: Box<LGBNode>,
    },
}

impl LGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            LGBNode::Leaf { value } => *value,
            LGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

// ---- Tree building utilities ----

fn compute_leaf_weight(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g.abs() <= alpha { 0.0 } else { g - alpha * g.signum() };
    -g_adj / (h + lambda).max(1e-12)
}

fn compute_gain_single(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda).max(1e-12)
}

fn make_leaf(gradients: &[f64], hessians: &[f64], indices: &[usize], lambda: f64, alpha: f64) -> LGBNode {
    let g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    LGBNode::Leaf { value: compute_leaf_weight(g, h, lambda, alpha) }
}

/// (feature, threshold, gain, left rows, right rows)
type FeatureSplit = (usize, f64, f64, Vec<usize>, Vec<usize>);

fn find_best_split_for_feature(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature: usize,
    config: &LightGBMConfig,
) -> Option<FeatureSplit> {
    if indices.len() < 2 {
        return None;
    }
    let mut sorted: Vec<(usize, f64)> = indices.iter().map(|&i| (i, x[[i, feature]])).collect();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

    let total_g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let total_h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    let base_score = compute_gain_single(total_g, total_h, config.reg_lambda);
    let min_child = config.min_child_samples.max(1);

    let mut left_g = 0.0;
    let mut left_h = 0.0;
    let mut best_gain = f64::NEG_INFINITY;
    let mut best_threshold = 0.0;
    let mut best_pos = 0;

    for i in 0..sorted.len() - 1 {
        left_g += gradients[sorted[i].0];
        left_h += hessians[sorted[i].0];
        let right_g = total_g - left_g;
        let right_h = total_h - left_h;

        if i + 1 < min_child || sorted.len() - i - 1 < min_child {
            continue;
        }
        if sorted[i].1 == sorted[i + 1].1 {
            continue;
        }

        let gain = compute_gain_single(left_g, left_h, config.reg_lambda)
            + compute_gain_single(right_g, right_h, config.reg_lambda)
            - base_score;

        if gain > best_gain {
            best_gain = gain;
            best_threshold = (sorted[i].1 + sorted[i + 1].1) / 2.0;
            best_pos = i + 1;
        }
    }

    if best_gain <= 1e-12 {
        return None;
    }

    let left_indices: Vec<usize> = sorted[..best_pos].iter().map(|&(i, _)| i).collect();
    let right_indices: Vec<usize> = sorted[best_pos..].iter().map(|&(i, _)| i).collect();
    Some((feature, best_threshold, best_gain, left_indices, right_indices))
}

fn best_split(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    features: &[usize],
    config: &LightGBMConfig,
) -> Option<FeatureSplit> {
    if indices.len() < config.min_child_samples.max(1) * 2 {
        return None;
    }
    features
        .par_iter()
        .filter_map(|&feat| find_best_split_for_feature(x, gradients, hessians, indices, feat, config))
        .collect::<Vec<_>>()
        .into_iter()
        .max_by(|a, b| a.2.total_cmp(&b.2))
}

struct PendingSplit {
    gain: f64,
    node_id: usize,
    feature: usize,
    threshold: f64,
    left_indices: Vec<usize>,
    right_indices: Vec<usize>,
}

impl PendingSplit {
    fn new(node_id: usize, split: FeatureSplit) -> Self {
        let (feature, threshold, gain, left_indices, right_indices) = split;
        Self { gain, node_id, feature, threshold, left_indices, right_indices }
    }
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.gain == other.gain
    }
}
impl Eq for PendingSplit {}
impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingSplit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gain.total_cmp(&other.gain)
    }
}

enum NodeSlot {
    Leaf(Vec<usize>),
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// Build one tree using leaf-wise (best-first) growth
fn build_lgb_tree(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    config: &LightGBMConfig,
    rng: &mut Xoshiro256PlusPlus,
) -> LGBNode {
    let n_features = x.ncols();
    let n_selected = ((n_features as f64 * config.colsample_bytree).ceil() as usize).clamp(1, n_features.max(1));
    let mut features: Vec<usize> = (0..n_features).collect();
    features.shuffle(rng);
    features.truncate(n_selected);

    let mut nodes: Vec<NodeSlot> = vec![NodeSlot::Leaf(indices.to_vec())];
    let mut depths: Vec<usize> = vec![0];
    let mut heap: BinaryHeap<PendingSplit> = BinaryHeap::new();
    let max_depth = config.max_depth.unwrap_or(usize::MAX);

    if max_depth > 0 {
        if let Some(split) = best_split(x, gradients, hessians, indices, &features, config) {
            heap.push(PendingSplit::new(0, split));
        }
    }

    let mut n_leaves = 1usize;
    while n_leaves < config.num_leaves.max(2) {
        let Some(split) = heap.pop() else { break };

        let depth = depths[split.node_id];
        let left_id = nodes.len();
        let right_id = left_id + 1;

        nodes.push(NodeSlot::Leaf(split.left_indices.clone()));
        nodes.push(NodeSlot::Leaf(split.right_indices.clone()));
        depths.push(depth + 1);
        depths.push(depth + 1);
        nodes[split.node_id] = NodeSlot::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        n_leaves += 1;

        if depth + 1 < max_depth {
            for (child_id, child_indices) in [(left_id, &split.left_indices), (right_id, &split.right_indices)] {
                if let Some(child) = best_split(x, gradients, hessians, child_indices, &features, config) {
                    heap.push(PendingSplit::new(child_id, child));
                }
            }
        }
    }

    fn to_node(nodes: &[NodeSlot], idx: usize, g: &[f64], h: &[f64], lam: f64, alpha: f64) -> LGBNode {
        match &nodes[idx] {
            NodeSlot::Leaf(indices) => make_leaf(g, h, indices, lam, alpha),
            NodeSlot::Split { feature, threshold, left, right } => LGBNode::Split {
                feature: *feature,
                threshold: *threshold,
                left: Box::new(to_node(nodes, *left, g, h, lam, alpha)),
                right: Box::new(to_node(nodes, *right, g, h, lam, alpha)),
            },
        }
    }
    to_node(&nodes, 0, gradients, hessians, config.reg_lambda, config.reg_alpha)
}

fn bagging_sample(n: usize, fraction: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let k = ((n as f64 * fraction).ceil() as usize).clamp(1, n);
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(rng);
    idx.truncate(k);
    idx.sort_unstable();
    idx
}

// ============ LightGBM Regressor ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMRegressor {
    pub config: LightGBMConfig,
    trees: Vec<LGBNode>,
    base_prediction: f64,
    n_features: usize,
}

impl LightGBMRegressor {
    pub fn new(config: LightGBMConfig) -> Self {
        Self { config, trees: Vec::new(), base_prediction: 0.0, n_features: 0 }
    }

    /// Boost `n_estimators` trees on the squared-error gradient
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        if n != y.len() {
            return Err(PredictorError::ShapeMismatch {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n == 0 {
            return Err(PredictorError::Data("Empty dataset".into()));
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.trees.clear();
        self.n_features = x.ncols();
        self.base_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n, self.base_prediction);
        let hessians: Vec<f64> = vec![1.0; n];

        let bagging = self.config.subsample < 1.0 && self.config.subsample_freq > 0;
        let mut bag: Vec<usize> = (0..n).collect();

        for iter in 0..self.config.n_estimators {
            let gradients: Vec<f64> = predictions.iter().zip(y.iter()).map(|(&p, &yi)| p - yi).collect();

            if bagging && iter % self.config.subsample_freq == 0 {
                bag = bagging_sample(n, self.config.subsample, &mut rng);
            }

            let tree = build_lgb_tree(x, &gradients, &hessians, &bag, &self.config, &mut rng);
            for (i, row) in x.rows().into_iter().enumerate() {
                predictions[i] += self.config.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PredictorError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PredictorError::ShapeMismatch {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.base_prediction
                    + self.trees.iter().map(|t| self.config.learning_rate * t.predict(row)).sum::<f64>()
            })
            .collect())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 3), (0..300).map(|i| (i as f64) / 100.0).collect()).unwrap();
        let y = Array1::from_vec((0..100).map(|i| {
            let x0 = (i * 3) as f64 / 100.0;
            2.0 * x0 + 0.1
        }).collect());
        (x, y)
    }

    fn mse(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(p, t)| (p - t).powi(2)).sum::<f64>() / a.len() as f64
    }

    #[test]
    fn test_lightgbm_regressor() {
        let (x, y) = make_regression_data();
        let config = LightGBMConfig { n_estimators: 50, num_leaves: 8, min_child_samples: 2, ..Default::default() };
        let mut model = LightGBMRegressor::new(config);
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();
        assert_eq!(preds.len(), 100);

        let baseline = Array1::from_elem(100, y.mean().unwrap());
        assert!(mse(&preds, &y) < mse(&baseline, &y) * 0.1);
    }

    #[test]
    fn test_lightgbm_bagging_and_colsample() {
        let (x, y) = make_regression_data();
        let config = LightGBMConfig {
            n_estimators: 10,
            num_leaves: 8,
            min_child_samples: 2,
            subsample: 0.5,
            subsample_freq: 2,
            colsample_bytree: 0.5,
            reg_alpha: 0.1,
            reg_lambda: 1.0,
            ..Default::default()
        };
        let mut a = LightGBMRegressor::new(config.clone());
        let mut b = LightGBMRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.n_trees(), 10);
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_lightgbm_depth_zero_is_constant() {
        let (x, y) = make_regression_data();
        let config = LightGBMConfig { n_estimators: 5, max_depth: Some(0), ..Default::default() };
        let mut model = LightGBMRegressor::new(config);
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();
        assert!(preds.iter().all(|&p| (p - preds[0]).abs() < 1e-9));
    }

    #[test]
    fn test_lightgbm_errors() {
        let model = LightGBMRegressor::new(LightGBMConfig::default());
        assert!(matches!(model.predict(&Array2::zeros((1, 3))), Err(PredictorError::NotFitted)));

        let mut model = LightGBMRegressor::new(LightGBMConfig::default());
        assert!(model.fit(&Array2::zeros((0, 3)), &Array1::zeros(0)).is_err());
    }
}
