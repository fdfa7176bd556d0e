//! Inference module
//!
//! Provides batch scoring with a persisted bundle:
//! - Scaler and stacked model saved and loaded together as JSON
//! - Strict schema check against the training feature columns
//! - Predicted class and positive-class probability appended to each row

mod batch;
mod bundle;

pub use batch::{
    prediction_output_path, BatchOutput, BatchPredictor, PREDICTED_COLUMN, PROBABILITY_COLUMN,
};
pub use bundle::InferenceBundle;
