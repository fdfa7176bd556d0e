//! Model training module
//!
//! Provides the learners used by the stacking pipeline:
//! - XGBoost-style second-order gradient boosted trees
//! - L2-regularized logistic regression (Newton-Raphson)
//! - Weighted ridge regression for local surrogate models
//! - Stratified K-Fold cross-validation
//! - Classification report

mod models;
pub mod cross_validation;
pub mod linear_models;
pub mod xgboost;

pub use cross_validation::{CVSplit, StratifiedKFold};
pub use linear_models::{LogisticRegression, RidgeRegression};
pub use models::{ClassMetrics, ClassificationReport, Classifier};
pub(crate) use models::validate_binary_target;
pub use xgboost::{ImportanceType, TreeNode, XGBoostClassifier, XGBoostConfig};
