//! Batch scoring of tabular files

use super::bundle::InferenceBundle;
use crate::error::{Result, StackwiseError};
use crate::preprocessing::columns_to_array2;
use crate::utils::{DataLoader, DataSaver};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Column holding the predicted class
pub const PREDICTED_COLUMN: &str = "predicted_target";
/// Column holding the positive-class probability
pub const PROBABILITY_COLUMN: &str = "probability_of_1";

/// Output path for scored rows: `<stem>_predictions.csv` next to the input.
///
/// `data/foo.csv` → `data/foo_predictions.csv`, `a.csv.csv` → `a.csv_predictions.csv`,
/// `foo` → `foo_predictions.csv`.
pub fn prediction_output_path(input: impl AsRef<Path>) -> PathBuf {
    let input = input.as_ref();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = if stem.is_empty() {
        "predictions.csv".to_string()
    } else {
        format!("{}_predictions.csv", stem)
    };
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

/// Scored rows and where they were written
#[derive(Debug, Clone)]
pub struct BatchOutput {
    /// Input rows with the prediction columns appended
    pub frame: DataFrame,
    pub output_path: PathBuf,
}

impl BatchOutput {
    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    /// First `n` rows of the identifier and prediction columns
    pub fn preview(&self, id_column: &str, n: usize) -> Result<DataFrame> {
        Ok(self
            .frame
            .select([id_column, PREDICTED_COLUMN, PROBABILITY_COLUMN])?
            .head(Some(n)))
    }
}

/// Applies an [`InferenceBundle`] to new files
pub struct BatchPredictor<'a> {
    bundle: &'a InferenceBundle,
    loader: DataLoader,
}

impl<'a> BatchPredictor<'a> {
    pub fn new(bundle: &'a InferenceBundle) -> Self {
        Self {
            bundle,
            loader: DataLoader::new(),
        }
    }

    /// Check the identifier column and feature schema, returning the features in training order.
    ///
    /// The target column is ignored when present. Any other column that is not a training
    /// feature, or a training feature that is absent, is a schema error.
    fn feature_matrix(&self, df: &DataFrame) -> Result<ndarray::Array2<f64>> {
        let bundle = self.bundle;
        if df.column(&bundle.id_column).is_err() {
            return Err(StackwiseError::ValidationError(format!(
                "the input file must contain an '{}' column",
                bundle.id_column
            )));
        }

        let columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect();

        let missing: Vec<&str> = bundle
            .feature_names
            .iter()
            .filter(|f| !columns.contains(f))
            .map(String::as_str)
            .collect();
        let unexpected: Vec<&str> = columns
            .iter()
            .filter(|c| {
                **c != bundle.id_column
                    && bundle.target_column.as_deref() != Some(c.as_str())
                    && !bundle.feature_names.contains(c)
            })
            .map(String::as_str)
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() {
            let mut problems = Vec::new();
            if !missing.is_empty() {
                problems.push(format!("missing feature columns: {}", missing.join(", ")));
            }
            if !unexpected.is_empty() {
                problems.push(format!("unexpected columns: {}", unexpected.join(", ")));
            }
            return Err(StackwiseError::SchemaError(problems.join("; ")));
        }

        columns_to_array2(df, &bundle.feature_names)
    }

    /// Score an in-memory frame, returning it with the prediction columns appended
    pub fn predict_frame(&self, df: &DataFrame) -> Result<DataFrame> {
        let x = self.feature_matrix(df)?;
        let proba = self.bundle.predict_proba(&x)?;
        let classes = self.bundle.classify(&proba);

        let mut out = df.clone();
        out.with_column(Series::new(PREDICTED_COLUMN.into(), classes.to_vec()))?;
        out.with_column(Series::new(PROBABILITY_COLUMN.into(), proba.to_vec()))?;
        Ok(out)
    }

    /// Load `input`, score every row and write `<stem>_predictions.csv` next to it
    pub fn predict_file(&self, input: impl AsRef<Path>) -> Result<BatchOutput> {
        let input = input.as_ref();
        let start = Instant::now();

        let df = self.loader.load_csv(input)?;
        debug!(rows = df.height(), cols = df.width(), "loaded batch input");

        let frame = self.predict_frame(&df)?;
        let output_path = prediction_output_path(input);
        DataSaver::save_csv(&frame, &output_path)?;

        info!(
            rows = frame.height(),
            output = %output_path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch predictions written"
        );

        Ok(BatchOutput { frame, output_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{StackingClassifier, StackingConfig};
    use crate::preprocessing::StandardScaler;
    use crate::training::{Classifier, LogisticRegression, XGBoostClassifier, XGBoostConfig};
    use ndarray::{Array1, Array2};

    fn bundle() -> InferenceBundle {
        let x = Array2::from_shape_fn((40, 2), |(r, c)| (r as f64) * (c as f64 + 1.0));
        let y = Array1::from_iter((0..40).map(|r| if r >= 20 { 1.0 } else { 0.0 }));
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();
        let mut model = StackingClassifier::new(
            StackingConfig::default(),
            XGBoostClassifier::new(XGBoostConfig {
                n_estimators: 10,
                max_depth: 2,
                ..Default::default()
            }),
            LogisticRegression::new(),
        );
        model.fit(&scaled, &y).unwrap();
        InferenceBundle::new(vec!["a".into(), "b".into()], "id", scaler, model)
            .unwrap()
            .with_target_column("target_variable")
    }

    #[test]
    fn test_output_path_derivation() {
        assert_eq!(prediction_output_path("foo.csv"), PathBuf::from("foo_predictions.csv"));
        assert_eq!(
            prediction_output_path("datacsv.csv"),
            PathBuf::from("datacsv_predictions.csv")
        );
        assert_eq!(
            prediction_output_path("a.csv.csv"),
            PathBuf::from("a.csv_predictions.csv")
        );
        assert_eq!(prediction_output_path("foo.txt"), PathBuf::from("foo_predictions.csv"));
        assert_eq!(prediction_output_path("foo"), PathBuf::from("foo_predictions.csv"));
        assert_eq!(
            prediction_output_path("data/new.csv"),
            Path::new("data").join("new_predictions.csv")
        );
    }

    #[test]
    fn test_missing_id_column() {
        let bundle = bundle();
        let df = df!("a" => &[1.0], "b" => &[2.0]).unwrap();
        let err = BatchPredictor::new(&bundle).predict_frame(&df).unwrap_err();
        assert!(matches!(err, StackwiseError::ValidationError(ref m) if m.contains("'id'")));
    }

    #[test]
    fn test_columns_reordered_and_target_ignored() {
        let bundle = bundle();
        let df = df!(
            "b" => &[2.0, 60.0],
            "target_variable" => &[0i64, 1],
            "id" => &[1i64, 2],
            "a" => &[1.0, 30.0]
        )
        .unwrap();
        let out = BatchPredictor::new(&bundle).predict_frame(&df).unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(out.width(), 6);
    }

    #[test]
    fn test_schema_mismatch() {
        let bundle = bundle();
        let df = df!("id" => &[1i64], "a" => &[1.0], "c" => &[3.0]).unwrap();
        let err = BatchPredictor::new(&bundle).predict_frame(&df).unwrap_err();
        match err {
            StackwiseError::SchemaError(msg) => {
                assert!(msg.contains("missing feature columns: b"));
                assert!(msg.contains("unexpected columns: c"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bundle_roundtrip_predicts_identically() {
        let bundle = bundle();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        bundle.save(&path).unwrap();
        let loaded = InferenceBundle::load(&path).unwrap();

        let x = Array2::from_shape_fn((5, 2), |(r, c)| (r * 7 + c) as f64);
        let a = bundle.predict_proba(&x).unwrap();
        let b = loaded.predict_proba(&x).unwrap();
        for (p, q) in a.iter().zip(b.iter()) {
            assert!((p - q).abs() < 1e-12);
        }
        assert_eq!(loaded.feature_names, bundle.feature_names);
    }
}
