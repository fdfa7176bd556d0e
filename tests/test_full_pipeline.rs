//! Integration test: Full pipeline (load → split → scale → stack → explain → score)

use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use stackwise::config::PipelineConfig;
use stackwise::inference::{BatchPredictor, InferenceBundle, PREDICTED_COLUMN, PROBABILITY_COLUMN};
use stackwise::pipeline::Pipeline;
use stackwise::training::XGBoostConfig;
use stackwise::utils::DataSaver;

fn create_dataset(n: usize, seed: u64) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut ids = Vec::with_capacity(n);
    let mut age = Vec::with_capacity(n);
    let mut income = Vec::with_capacity(n);
    let mut score = Vec::with_capacity(n);
    let mut target = Vec::with_capacity(n);

    for i in 0..n {
        let a: f64 = rng.gen_range(18.0..80.0);
        let inc: f64 = rng.gen_range(20_000.0..150_000.0);
        let s: f64 = rng.gen_range(0.0..1.0);
        let logit = 0.08 * (a - 45.0) + 0.00004 * (inc - 80_000.0) + 2.0 * (s - 0.5);
        let noise: f64 = rng.gen_range(-0.5..0.5);
        ids.push(i as i64 + 1);
        age.push(a);
        income.push(inc);
        score.push(s);
        target.push(if logit + noise > 0.0 { 1i64 } else { 0 });
    }

    df!(
        "id" => ids,
        "age" => age,
        "income" => income,
        "score" => score,
        "target_variable" => target
    )
    .unwrap()
}

fn fast_config(dir: &std::path::Path, data: &std::path::Path) -> PipelineConfig {
    PipelineConfig::default()
        .with_data_path(data)
        .with_output_dir(dir)
        .with_render_plots(false)
        .with_lime_samples(500)
        .with_xgboost(XGBoostConfig {
            n_estimators: 20,
            max_depth: 3,
            ..Default::default()
        })
}

#[test]
fn test_full_pipeline_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("dataset.csv");
    DataSaver::save_csv(&create_dataset(200, 1), &data).unwrap();

    let report = Pipeline::new(fast_config(dir.path(), &data)).run().unwrap();

    assert_eq!(report.n_train, 160);
    assert_eq!(report.n_test, 40);
    assert_eq!(report.feature_names, vec!["age", "income", "score"]);

    let total: f64 = report.feature_importances.iter().map(|f| f.score).sum();
    assert!((total - 1.0).abs() < 1e-9);
    for pair in report.feature_importances.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    assert!(report.classification_report.accuracy > 0.6);
    assert_eq!(report.classification_report.classes.len(), 2);

    assert_eq!(report.global_shap.values.dim(), (160, 3));
    assert!(report.local.probability >= 0.0 && report.local.probability <= 1.0);
    for sentence in &report.local.sentences {
        assert!(sentence.starts_with("Feature '"));
    }
    assert!(report.local.lime.weights.len() <= 3);

    let html = std::fs::read_to_string(dir.path().join("lime_local_explanation.html")).unwrap();
    assert!(html.contains(&format!("instance {}", report.local.instance_id)));
    assert!(!dir.path().join("shap_summary_plot.png").exists());
}

#[test]
fn test_pipeline_renders_shap_plots() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("dataset.csv");
    DataSaver::save_csv(&create_dataset(120, 5), &data).unwrap();

    let config = fast_config(dir.path(), &data).with_render_plots(true);
    let report = Pipeline::new(config).run().unwrap();

    for name in ["shap_summary_plot.png", "shap_local_case.png", "lime_local_explanation.html"] {
        let path = dir.path().join(name);
        assert!(report.artifacts.contains(&path), "{name} not reported");
        assert!(std::fs::metadata(&path).unwrap().len() > 0, "{name} is empty");
    }
}

#[test]
fn test_pipeline_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("dataset.csv");
    DataSaver::save_csv(&create_dataset(150, 2), &data).unwrap();
    let config = fast_config(dir.path(), &data);

    let a = Pipeline::new(config.clone()).run().unwrap();
    let b = Pipeline::new(config).run().unwrap();

    assert_eq!(a.local.instance_id, b.local.instance_id);
    assert_eq!(a.local.sentences, b.local.sentences);
    assert_eq!(a.local.shap_values, b.local.shap_values);
    assert_eq!(a.local.lime.weights, b.local.lime.weights);
    for (x, y) in a.feature_importances.iter().zip(b.feature_importances.iter()) {
        assert_eq!(x.feature, y.feature);
        assert_eq!(x.score, y.score);
    }
}

#[test]
fn test_pipeline_then_batch_predict() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("dataset.csv");
    DataSaver::save_csv(&create_dataset(150, 3), &data).unwrap();
    let report = Pipeline::new(fast_config(dir.path(), &data)).run().unwrap();

    let bundle_path = dir.path().join("bundle.json");
    report.bundle.save(&bundle_path).unwrap();
    let bundle = InferenceBundle::load(&bundle_path).unwrap();

    let new_data = dir.path().join("new_data.csv");
    let fresh = create_dataset(30, 99).drop("target_variable").unwrap();
    DataSaver::save_csv(&fresh, &new_data).unwrap();

    let output = BatchPredictor::new(&bundle).predict_file(&new_data).unwrap();
    assert_eq!(output.n_rows(), 30);
    assert_eq!(output.output_path, dir.path().join("new_data_predictions.csv"));
    assert!(output.output_path.exists());

    let classes = output.frame.column(PREDICTED_COLUMN).unwrap().i64().unwrap().clone();
    let proba = output.frame.column(PROBABILITY_COLUMN).unwrap().f64().unwrap().clone();
    for (c, p) in classes.into_no_null_iter().zip(proba.into_no_null_iter()) {
        assert!((0.0..=1.0).contains(&p));
        assert_eq!(c, if p >= 0.5 { 1 } else { 0 });
    }
}

#[test]
fn test_pipeline_rejects_non_binary_target() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("dataset.csv");
    let mut df = create_dataset(50, 4);
    df.with_column(Series::new("target_variable".into(), vec![2i64; 50]))
        .unwrap();
    DataSaver::save_csv(&df, &data).unwrap();

    let err = Pipeline::new(fast_config(dir.path(), &data)).run().unwrap_err();
    assert!(err.to_string().contains("binary"));
}
