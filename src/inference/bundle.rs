//! Fitted scaler and model persisted together for batch scoring

use crate::ensemble::XgbLogisticStack;
use crate::error::{Result, StackwiseError};
use crate::preprocessing::StandardScaler;
use crate::training::Classifier;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Everything needed to score new rows the way the training rows were scored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceBundle {
    /// Feature columns in training order
    pub feature_names: Vec<String>,
    pub id_column: String,
    /// Training target column; ignored when present in scored files
    pub target_column: Option<String>,
    pub scaler: StandardScaler,
    pub model: XgbLogisticStack,
    /// Probability at or above which the predicted class is 1
    pub threshold: f64,
    pub created_at: DateTime<Utc>,
    pub version: String,
}

impl InferenceBundle {
    pub fn new(
        feature_names: Vec<String>,
        id_column: impl Into<String>,
        scaler: StandardScaler,
        model: XgbLogisticStack,
    ) -> Result<Self> {
        if !scaler.is_fitted() || !model.is_fitted() {
            return Err(StackwiseError::ModelNotFitted);
        }
        if scaler.n_features() != Some(feature_names.len()) {
            return Err(StackwiseError::ShapeError {
                expected: format!("{} scaler features", feature_names.len()),
                actual: format!("{:?} scaler features", scaler.n_features()),
            });
        }
        Ok(Self {
            feature_names,
            id_column: id_column.into(),
            target_column: None,
            scaler,
            model,
            threshold: 0.5,
            created_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    /// Positive-class probability for raw (unscaled) feature rows
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scaled = self.scaler.transform(x)?;
        self.model.predict_proba(&scaled)
    }

    /// Class labels from probabilities using the bundle threshold
    pub fn classify(&self, proba: &Array1<f64>) -> Array1<i64> {
        proba.mapv(|p| if p >= self.threshold { 1 } else { 0 })
    }

    /// Save the bundle as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "saved inference bundle");
        Ok(())
    }

    /// Load a bundle saved with [`InferenceBundle::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            StackwiseError::DataError(format!("cannot read bundle {}: {}", path.display(), e))
        })?;
        let bundle: Self = serde_json::from_str(&json)?;
        Ok(bundle)
    }
}
