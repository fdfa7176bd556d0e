//! Seeded train/test partitioning

use crate::error::{Result, StackwiseError};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of a train/test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Materialized partition of a feature matrix and target vector
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub indices: SplitIndices,
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Shuffle `0..n_rows` with a seeded RNG and hold out `ceil(n_rows * test_size)` rows.
///
/// The same seed and row count always yield the same partition.
pub fn train_test_split_indices(n_rows: usize, test_size: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(StackwiseError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }

    let n_test = ((n_rows as f64) * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(StackwiseError::ValidationError(format!(
            "cannot split {} rows with test_size {}: both partitions need at least one row",
            n_rows, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(SplitIndices {
        train,
        test: indices,
    })
}

/// Split a feature matrix and target vector into train and test partitions.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if x.nrows() != y.len() {
        return Err(StackwiseError::ShapeError {
            expected: format!("{} target values", x.nrows()),
            actual: format!("{} target values", y.len()),
        });
    }

    let indices = train_test_split_indices(x.nrows(), test_size, seed)?;

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &indices.train),
        x_test: x.select(Axis(0), &indices.test),
        y_train: y.select(Axis(0), &indices.train),
        y_test: y.select(Axis(0), &indices.test),
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let split = train_test_split_indices(10, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn test_split_is_a_partition() {
        let split = train_test_split_indices(25, 0.2, 1).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort();
        assert_eq!(all, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = train_test_split_indices(100, 0.2, 42).unwrap();
        let b = train_test_split_indices(100, 0.2, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_different_split() {
        let a = train_test_split_indices(100, 0.2, 42).unwrap();
        let b = train_test_split_indices(100, 0.2, 43).unwrap();
        assert_ne!(a.test, b.test);
    }

    #[test]
    fn test_too_few_rows() {
        assert!(train_test_split_indices(1, 0.2, 42).is_err());
    }

    #[test]
    fn test_matrix_split_follows_indices() {
        let x = Array2::from_shape_fn((10, 2), |(r, c)| (r * 10 + c) as f64);
        let y = Array1::from_iter((0..10).map(|r| (r % 2) as f64));
        let split = train_test_split(&x, &y, 0.3, 3).unwrap();

        for (i, &row) in split.indices.test.iter().enumerate() {
            assert_eq!(split.x_test[[i, 0]], (row * 10) as f64);
            assert_eq!(split.y_test[i], (row % 2) as f64);
        }
    }
}
