//! Cross-validation splitters

use crate::error::{Result, StackwiseError};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified K-Fold: every fold keeps roughly the class proportions of `y`.
///
/// Without shuffling, rows of each class are assigned to folds in contiguous blocks in
/// their original order, so the folds are fully determined by `y`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub random_state: Option<u64>,
}

impl Default for StratifiedKFold {
    fn default() -> Self {
        Self::new(5)
    }
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    /// Shuffle rows within each class before assignment
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.random_state = Some(seed);
        self
    }

    /// Fold assignment for every row
    pub fn test_folds(&self, y: &Array1<f64>) -> Result<Vec<usize>> {
        let n_samples = y.len();
        if self.n_splits < 2 {
            return Err(StackwiseError::InvalidParameter {
                name: "n_splits".to_string(),
                value: self.n_splits.to_string(),
                reason: "at least 2 folds are required".to_string(),
            });
        }
        if self.n_splits > n_samples {
            return Err(StackwiseError::ValidationError(format!(
                "cannot make {} folds from {} rows",
                self.n_splits, n_samples
            )));
        }

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if class_indices.values().all(|indices| indices.len() < self.n_splits) {
            return Err(StackwiseError::ValidationError(format!(
                "every class has fewer rows than n_splits={}",
                self.n_splits
            )));
        }
        if let Some((label, indices)) = class_indices
            .iter()
            .find(|(_, indices)| indices.len() < self.n_splits)
        {
            warn!(
                class = label,
                rows = indices.len(),
                n_splits = self.n_splits,
                "least populated class has fewer rows than folds"
            );
        }

        if self.shuffle {
            let mut rng = match self.random_state {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Labels sorted by class; fold f takes every n_splits-th element starting at f.
        // The class counts in each such stride give how many rows of a class land in fold f.
        let sorted_labels: Vec<i64> = class_indices
            .iter()
            .flat_map(|(&label, idx)| std::iter::repeat(label).take(idx.len()))
            .collect();

        let mut test_folds = vec![0usize; n_samples];
        for (&label, indices) in &class_indices {
            let mut cursor = 0;
            for fold in 0..self.n_splits {
                let take = sorted_labels
                    .iter()
                    .skip(fold)
                    .step_by(self.n_splits)
                    .filter(|&&l| l == label)
                    .count();
                for &row in &indices[cursor..cursor + take] {
                    test_folds[row] = fold;
                }
                cursor += take;
            }
        }

        Ok(test_folds)
    }

    /// Train/test index sets for each fold, indices ascending
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let test_folds = self.test_folds(y)?;

        Ok((0..self.n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| test_folds[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect())
    }
}
