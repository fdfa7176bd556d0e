//! Pipeline configuration

use crate::error::{Result, StackwiseError};
use crate::training::XGBoostConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File names of the artifacts written by a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactNames {
    pub shap_summary: String,
    pub shap_local: String,
    pub lime_report: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            shap_summary: "shap_summary_plot.png".to_string(),
            shap_local: "shap_local_case.png".to_string(),
            lime_report: "lime_local_explanation.html".to_string(),
        }
    }
}

/// Configuration for a full train / explain / predict run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Training dataset
    pub data_path: PathBuf,

    /// Identifier column, excluded from modeling
    pub id_column: String,

    /// Binary target column
    pub target_column: String,

    /// Fraction of rows held out for evaluation
    pub test_size: f64,

    /// Seed shared by the split, the base learner and LIME sampling
    pub random_state: u64,

    /// Folds used to build out-of-fold meta features
    pub cv_folds: usize,

    /// Base learner hyperparameters. An unset `random_state` follows the pipeline seed.
    pub xgboost: XGBoostConfig,

    /// Meta learner iteration cap
    pub meta_max_iter: usize,

    /// Minimum |SHAP| for a feature to be described in the narrative
    pub shap_threshold: f64,

    /// Row of the test partition that is explained locally
    pub instance_index: usize,

    /// Number of features reported by LIME
    pub lime_num_features: usize,

    /// Perturbation samples drawn by LIME
    pub lime_num_samples: usize,

    /// Directory receiving plots and reports
    pub output_dir: PathBuf,

    pub artifacts: ArtifactNames,

    /// Disable PNG rendering (headless runs and tests)
    pub render_plots: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("dataset.csv"),
            id_column: "id".to_string(),
            target_column: "target_variable".to_string(),
            test_size: 0.2,
            random_state: 42,
            cv_folds: 5,
            xgboost: XGBoostConfig {
                random_state: None,
                ..XGBoostConfig::default()
            },
            meta_max_iter: 300,
            shap_threshold: 0.05,
            instance_index: 0,
            lime_num_features: 10,
            lime_num_samples: 5000,
            output_dir: PathBuf::from("."),
            artifacts: ArtifactNames::default(),
            render_plots: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            StackwiseError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = column.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self.xgboost.random_state = None;
        self
    }

    pub fn with_xgboost(mut self, xgboost: XGBoostConfig) -> Self {
        self.xgboost = xgboost;
        self
    }

    pub fn with_lime_samples(mut self, n: usize) -> Self {
        self.lime_num_samples = n;
        self
    }

    pub fn with_render_plots(mut self, render: bool) -> Self {
        self.render_plots = render;
        self
    }

    /// Base learner settings with the pipeline seed applied unless one was set explicitly
    pub fn base_learner_config(&self) -> XGBoostConfig {
        let mut xgboost = self.xgboost.clone();
        if xgboost.random_state.is_none() {
            xgboost.random_state = Some(self.random_state);
        }
        xgboost
    }

    /// Path of an artifact inside the output directory
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(StackwiseError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        if self.shap_threshold < 0.0 {
            return Err(StackwiseError::InvalidParameter {
                name: "shap_threshold".to_string(),
                value: self.shap_threshold.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        if self.cv_folds < 2 {
            return Err(StackwiseError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: self.cv_folds.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if self.lime_num_features == 0 {
            return Err(StackwiseError::InvalidParameter {
                name: "lime_num_features".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
