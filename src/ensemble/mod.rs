//! Ensemble methods module
//!
//! Provides stacking (meta-learning over out-of-fold base predictions).

mod stacking;

pub use stacking::{StackingClassifier, StackingConfig, XgbLogisticStack};
