//! stackwise - Stacked gradient boosting with explanations
//!
//! This crate trains a two-stage binary classifier on a tabular dataset and explains it:
//! - Seeded train/test partitioning and z-score scaling
//! - XGBoost-style boosted trees stacked under a logistic-regression meta learner
//! - Classification report and gain-based feature importance
//! - Exact TreeSHAP (summary and force plots, plain-language sentences)
//! - LIME-style local surrogate rendered as an HTML report
//! - Batch scoring of new files through a serializable inference bundle
//!
//! # Modules
//!
//! ## Core ML Modules
//! - [`preprocessing`] - Column separation, splitting, scaling
//! - [`training`] - Boosted trees, logistic/ridge regression, cross-validation, metrics
//! - [`ensemble`] - Stacking with out-of-fold meta features
//! - [`inference`] - Inference bundle and batch scoring
//!
//! ## Explanations
//! - [`explainability`] - Importance ranking, TreeSHAP, LIME, narratives
//! - [`visualization`] - SHAP summary and force plots
//! - [`export`] - LIME HTML report
//!
//! ## Orchestration
//! - [`config`] - Pipeline configuration
//! - [`pipeline`] - End-to-end run
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod ensemble;
pub mod inference;

// Explanations
pub mod explainability;
pub mod visualization;
pub mod export;

// Utilities
pub mod utils;

// Orchestration
pub mod pipeline;
pub mod cli;

pub use error::{Result, StackwiseError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, StackwiseError};

    // Configuration and orchestration
    pub use crate::config::PipelineConfig;
    pub use crate::pipeline::{Pipeline, PipelineReport};

    // Preprocessing
    pub use crate::preprocessing::{train_test_split, Dataset, StandardScaler};

    // Training
    pub use crate::training::{
        ClassificationReport, Classifier, LogisticRegression, StratifiedKFold, XGBoostClassifier,
        XGBoostConfig,
    };

    // Ensemble
    pub use crate::ensemble::{StackingClassifier, StackingConfig, XgbLogisticStack};

    // Explainability
    pub use crate::explainability::{
        interpret_local_attribution, rank_feature_importances, LimeConfig, LimeTabularExplainer,
        ShapValues, TreeExplainer,
    };

    // Inference
    pub use crate::inference::{BatchPredictor, InferenceBundle};

    // Utilities
    pub use crate::utils::{DataLoader, DataSaver};
}
