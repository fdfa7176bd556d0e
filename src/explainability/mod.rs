//! Model explainability module
//!
//! Provides model interpretation and explanation methods including:
//! - Ranked gain-based feature importance
//! - Exact TreeSHAP attributions for boosted trees
//! - LIME-style local surrogate explanations
//! - Plain-language summaries of local attributions

mod importance;
mod lime;
mod narrative;
mod tree_shap;

pub use importance::{rank_feature_importances, FeatureImportance};
pub use lime::{FeatureSelection, LimeConfig, LimeExplanation, LimeTabularExplainer};
pub use narrative::{interpret_local_attribution, DEFAULT_THRESHOLD};
pub use tree_shap::{ShapValues, TreeExplainer};
