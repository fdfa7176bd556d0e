//! Integration test: Batch scoring contract of the inference bundle

use ndarray::{Array1, Array2};
use polars::prelude::*;
use stackwise::ensemble::{StackingClassifier, StackingConfig};
use stackwise::error::StackwiseError;
use stackwise::inference::{
    prediction_output_path, BatchPredictor, InferenceBundle, PREDICTED_COLUMN, PROBABILITY_COLUMN,
};
use stackwise::preprocessing::StandardScaler;
use stackwise::training::{Classifier, LogisticRegression, XGBoostClassifier, XGBoostConfig};
use stackwise::utils::DataSaver;
use std::path::{Path, PathBuf};

fn fitted_bundle() -> InferenceBundle {
    let n = 80;
    let x = Array2::from_shape_fn((n, 3), |(r, c)| ((r * (c + 3)) % 13) as f64 + c as f64);
    let y = Array1::from_iter(x.rows().into_iter().map(|row| {
        if row[0] + 0.5 * row[1] > 10.0 { 1.0 } else { 0.0 }
    }));

    let mut scaler = StandardScaler::new();
    let scaled = scaler.fit_transform(&x).unwrap();
    let mut model = StackingClassifier::new(
        StackingConfig::default(),
        XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 15,
            max_depth: 3,
            ..Default::default()
        }),
        LogisticRegression::new(),
    );
    model.fit(&scaled, &y).unwrap();

    InferenceBundle::new(
        vec!["f1".to_string(), "f2".to_string(), "f3".to_string()],
        "id",
        scaler,
        model,
    )
    .unwrap()
}

fn new_rows(n: usize) -> DataFrame {
    df!(
        "id" => (0..n as i64).collect::<Vec<_>>(),
        "f1" => (0..n).map(|i| (i % 13) as f64).collect::<Vec<_>>(),
        "f2" => (0..n).map(|i| ((i * 5) % 13) as f64 + 1.0).collect::<Vec<_>>(),
        "f3" => (0..n).map(|i| ((i * 3) % 7) as f64 + 2.0).collect::<Vec<_>>()
    )
    .unwrap()
}

#[test]
fn test_output_rows_probabilities_and_classes() {
    let bundle = fitted_bundle();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("incoming.csv");
    DataSaver::save_csv(&new_rows(25), &input).unwrap();

    let output = BatchPredictor::new(&bundle).predict_file(&input).unwrap();
    assert_eq!(output.n_rows(), 25);

    let written = std::fs::read_to_string(dir.path().join("incoming_predictions.csv")).unwrap();
    let header = written.lines().next().unwrap();
    assert_eq!(header, "id,f1,f2,f3,predicted_target,probability_of_1");
    assert_eq!(written.lines().count(), 26);

    let classes = output.frame.column(PREDICTED_COLUMN).unwrap().i64().unwrap().clone();
    let proba = output.frame.column(PROBABILITY_COLUMN).unwrap().f64().unwrap().clone();
    for (c, p) in classes.into_no_null_iter().zip(proba.into_no_null_iter()) {
        assert!((0.0..=1.0).contains(&p));
        assert!(c == 0 || c == 1);
        assert_eq!(c == 1, p >= 0.5);
    }

    let preview = output.preview("id", 5).unwrap();
    assert_eq!(preview.height(), 5);
    assert_eq!(preview.width(), 3);
}

#[test]
fn test_missing_id_fails_without_writing() {
    let bundle = fitted_bundle();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("no_id.csv");
    let df = new_rows(5).drop("id").unwrap();
    DataSaver::save_csv(&df, &input).unwrap();

    let err = BatchPredictor::new(&bundle).predict_file(&input).unwrap_err();
    match err {
        StackwiseError::ValidationError(msg) => {
            assert_eq!(msg, "the input file must contain an 'id' column")
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!dir.path().join("no_id_predictions.csv").exists());
}

#[test]
fn test_extra_column_rejected() {
    let bundle = fitted_bundle();
    let mut df = new_rows(4);
    df.with_column(Series::new("f4".into(), vec![0.0; 4])).unwrap();
    let err = BatchPredictor::new(&bundle).predict_frame(&df).unwrap_err();
    assert!(matches!(err, StackwiseError::SchemaError(ref m) if m.contains("f4")));
}

#[test]
fn test_reordered_columns_score_identically() {
    let bundle = fitted_bundle();
    let df = new_rows(10);
    let shuffled = df.select(["f3", "id", "f1", "f2"]).unwrap();

    let predictor = BatchPredictor::new(&bundle);
    let a = predictor.predict_frame(&df).unwrap();
    let b = predictor.predict_frame(&shuffled).unwrap();
    let pa: Vec<f64> = a.column(PROBABILITY_COLUMN).unwrap().f64().unwrap().into_no_null_iter().collect();
    let pb: Vec<f64> = b.column(PROBABILITY_COLUMN).unwrap().f64().unwrap().into_no_null_iter().collect();
    assert_eq!(pa, pb);
}

#[test]
fn test_output_name_from_stem() {
    assert_eq!(prediction_output_path("foo.csv"), PathBuf::from("foo_predictions.csv"));
    assert_eq!(prediction_output_path("datacsv.csv"), PathBuf::from("datacsv_predictions.csv"));
    assert_eq!(
        prediction_output_path(Path::new("in").join("batch.csv")),
        Path::new("in").join("batch_predictions.csv")
    );
}

#[test]
fn test_bundle_json_roundtrip() {
    let bundle = fitted_bundle();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.json");
    bundle.save(&path).unwrap();
    let loaded = InferenceBundle::load(&path).unwrap();

    let df = new_rows(12);
    let a = BatchPredictor::new(&bundle).predict_frame(&df).unwrap();
    let b = BatchPredictor::new(&loaded).predict_frame(&df).unwrap();
    let pa = a.column(PROBABILITY_COLUMN).unwrap().f64().unwrap().clone();
    let pb = b.column(PROBABILITY_COLUMN).unwrap().f64().unwrap().clone();
    for (p, q) in pa.into_no_null_iter().zip(pb.into_no_null_iter()) {
        assert!((p - q).abs() < 1e-12);
    }
}
