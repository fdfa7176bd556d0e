//! Data preprocessing module
//!
//! Provides the steps that turn a raw table into model-ready matrices:
//! - Identifier / target / feature column separation
//! - Seeded train/test partitioning
//! - Z-score feature scaling fit on training rows only

mod dataset;
mod scaler;
mod split;

pub use dataset::Dataset;
pub(crate) use dataset::columns_to_array2;
pub use scaler::StandardScaler;
pub use split::{train_test_split, train_test_split_indices, SplitIndices, TrainTestSplit};
