//! K-fold assignment and hold-out splits

use crate::error::{PredictorError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// K-fold partitioner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub random_state: u64,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            random_state: 42,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Fold id for each of `n_samples` rows.
    ///
    /// Fold sizes differ by at most one, every fold is non-empty, and the result
    /// depends only on `n_samples`, `n_splits` and the seed.
    pub fn assign(&self, n_samples: usize) -> Result<Vec<usize>> {
        if self.n_splits < 2 {
            return Err(PredictorError::InvalidParameter {
                name: "n_folds".to_string(),
                value: self.n_splits.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if n_samples < self.n_splits {
            return Err(PredictorError::InvalidParameter {
                name: "n_folds".to_string(),
                value: self.n_splits.to_string(),
                reason: format!("cannot exceed the number of rows ({})", n_samples),
            });
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            indices.shuffle(&mut rng);
        }

        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut folds = vec![0usize; n_samples];
        let mut current = 0;
        for fold in 0..self.n_splits {
            let size = if fold < remainder { base + 1 } else { base };
            for &row in &indices[current..current + size] {
                folds[row] = fold;
            }
            current += size;
        }
        Ok(folds)
    }
}

/// Row indices of a fixed train/validation split
#[derive(Debug, Clone, PartialEq)]
pub struct HoldoutSplit {
    pub train_indices: Vec<usize>,
    pub valid_indices: Vec<usize>,
}

/// Shuffle rows with a fixed seed and hold out `valid_ratio` of them.
///
/// The validation share is rounded up, matching the usual `test_size` semantics,
/// and both sides are kept non-empty.
pub fn holdout_split(n_samples: usize, valid_ratio: f64, seed: u64) -> Result<HoldoutSplit> {
    if !(valid_ratio > 0.0 && valid_ratio < 1.0) {
        return Err(PredictorError::InvalidParameter {
            name: "valid_ratio".to_string(),
            value: valid_ratio.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        });
    }
    if n_samples < 2 {
        return Err(PredictorError::Data(format!(
            "need at least 2 rows for a hold-out split, got {}",
            n_samples
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_valid = ((n_samples as f64 * valid_ratio).ceil() as usize).clamp(1, n_samples - 1);
    let valid_indices = indices[..n_valid].to_vec();
    let train_indices = indices[n_valid..].to_vec();

    Ok(HoldoutSplit {
        train_indices,
        valid_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold_sizes(folds: &[usize], k: usize) -> Vec<usize> {
        let mut sizes = vec![0; k];
        for &f in folds {
            sizes[f] += 1;
        }
        sizes
    }

    #[test]
    fn test_every_fold_non_empty_and_balanced() {
        for k in 2..=12 {
            for n in [k, k + 1, 37, 100] {
                let folds = KFold::new(k).assign(n).unwrap();
                assert_eq!(folds.len(), n);
                assert!(folds.iter().all(|&f| f < k));

                let sizes = fold_sizes(&folds, k);
                let min = *sizes.iter().min().unwrap();
                let max = *sizes.iter().max().unwrap();
                assert!(min >= 1, "empty fold for n={} k={}", n, k);
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let a = KFold::new(5).with_random_state(7).assign(100).unwrap();
        let b = KFold::new(5).with_random_state(7).assign(100).unwrap();
        let c = KFold::new(5).with_random_state(8).assign(100).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_leave_one_out() {
        let folds = KFold::new(10).assign(10).unwrap();
        assert_eq!(fold_sizes(&folds, 10), vec![1; 10]);
    }

    #[test]
    fn test_without_shuffle_is_contiguous() {
        let folds = KFold::new(2).with_shuffle(false).assign(5).unwrap();
        assert_eq!(folds, vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_invalid_fold_counts() {
        assert!(KFold::new(1).assign(10).is_err());
        assert!(KFold::new(11).assign(10).is_err());
    }

    #[test]
    fn test_holdout_split() {
        let split = holdout_split(100, 0.2, 23).unwrap();
        assert_eq!(split.valid_indices.len(), 20);
        assert_eq!(split.train_indices.len(), 80);

        let mut all: Vec<usize> = split
            .train_indices
            .iter()
            .chain(split.valid_indices.iter())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());

        assert_eq!(split, holdout_split(100, 0.2, 23).unwrap());
    }

    #[test]
    fn test_holdout_rejects_bad_ratio() {
        assert!(holdout_split(10, 0.0, 1).is_err());
        assert!(holdout_split(10, 1.0, 1).is_err());
        assert!(holdout_split(1, 0.5, 1).is_err());
    }
}
