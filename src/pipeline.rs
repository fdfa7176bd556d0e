//! End-to-end train / evaluate / explain run
//!
//! [`Pipeline::run`] drives the stages in order: load the table, split and scale it, fit the
//! stacked classifier, evaluate it on the held-out rows, rank feature importances, explain
//! the model globally and one test row locally, and package the fitted scaler and model
//! into an [`InferenceBundle`] for batch scoring.

use crate::config::PipelineConfig;
use crate::ensemble::{StackingClassifier, StackingConfig, XgbLogisticStack};
use crate::error::{Result, StackwiseError};
use crate::explainability::{
    interpret_local_attribution, rank_feature_importances, FeatureImportance, LimeConfig,
    LimeExplanation, LimeTabularExplainer, ShapValues, TreeExplainer,
};
use crate::export::LimeHtmlReport;
use crate::inference::InferenceBundle;
use crate::preprocessing::{train_test_split, Dataset, StandardScaler, TrainTestSplit};
use crate::training::{ClassificationReport, Classifier, LogisticRegression, XGBoostClassifier};
use crate::utils::DataLoader;
use crate::visualization::{force_plot, summary_plot, SummaryPlotOptions};
use ndarray::Array2;
use polars::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Local explanation of the selected test row
#[derive(Debug, Clone)]
pub struct LocalExplanation {
    /// Position of the row inside the test partition
    pub test_index: usize,
    /// Identifier value of the row
    pub instance_id: String,
    /// The unscaled input row, identifier and target included
    pub row: DataFrame,
    /// Positive-class probability from the stacked model
    pub probability: f64,
    /// SHAP values of the base learner, one per feature, in log-odds
    pub shap_values: Vec<f64>,
    pub expected_value: f64,
    /// Sentences for the features whose |SHAP| reaches the threshold
    pub sentences: Vec<String>,
    pub lime: LimeExplanation,
}

/// Everything produced by a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub feature_names: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
    pub classification_report: ClassificationReport,
    /// Base learner importances, highest first
    pub feature_importances: Vec<FeatureImportance>,
    /// SHAP values of every training row
    pub global_shap: ShapValues,
    pub local: LocalExplanation,
    /// Files written during the run
    pub artifacts: Vec<PathBuf>,
    pub bundle: InferenceBundle,
    pub elapsed_secs: f64,
}

/// Train, evaluate and explain a stacked classifier
pub struct Pipeline {
    config: PipelineConfig,
    loader: DataLoader,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            loader: DataLoader::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load `config.data_path` and run every stage on it
    pub fn run(&self) -> Result<PipelineReport> {
        let df = self.loader.load_auto(&self.config.data_path)?;
        info!(
            path = %self.config.data_path.display(),
            rows = df.height(),
            cols = df.width(),
            "loaded training data"
        );
        self.run_on_frame(df)
    }

    /// Run every stage on an already loaded table
    pub fn run_on_frame(&self, df: DataFrame) -> Result<PipelineReport> {
        let config = &self.config;
        config.validate()?;
        let start = Instant::now();

        let dataset = Dataset::from_frame(df, &config.id_column, &config.target_column)?;
        let feature_names = dataset.feature_names().to_vec();
        let x = dataset.features()?;
        let y = dataset.target()?;

        let split = train_test_split(&x, &y, config.test_size, config.random_state)?;
        info!(
            train = split.x_train.nrows(),
            test = split.x_test.nrows(),
            features = feature_names.len(),
            "split dataset"
        );

        let mut scaler = StandardScaler::new();
        let x_train = scaler.fit_transform(&split.x_train)?;
        let x_test = scaler.transform(&split.x_test)?;

        let model = self.fit_model(&x_train, &split)?;

        let y_pred = model.predict(&x_test)?;
        let classification_report = ClassificationReport::compute(&split.y_test, &y_pred)?;
        info!(accuracy = classification_report.accuracy, "evaluated on test partition");

        let importances = model
            .base_estimator()
            .feature_importances()
            .ok_or(StackwiseError::ModelNotFitted)?;
        let feature_importances = rank_feature_importances(&feature_names, &importances.to_vec())?;

        let mut artifacts = Vec::new();
        std::fs::create_dir_all(&config.output_dir)?;

        let explainer = TreeExplainer::new(model.base_estimator())?;
        let shap_start = Instant::now();
        let global_shap = explainer.shap_values(&x_train)?;
        debug!(
            rows = x_train.nrows(),
            elapsed_ms = shap_start.elapsed().as_millis() as u64,
            "computed training shap values"
        );

        if config.render_plots {
            let path = config.artifact_path(&config.artifacts.shap_summary);
            summary_plot(
                &path,
                &global_shap,
                &x_train,
                &feature_names,
                &SummaryPlotOptions::default(),
            )?;
            info!(path = %path.display(), "saved shap summary plot");
            artifacts.push(path);
        }

        let local = self.explain_test_row(
            &dataset,
            &split,
            &model,
            &explainer,
            &x_train,
            &x_test,
            &feature_names,
            &mut artifacts,
        )?;

        let bundle = InferenceBundle::new(feature_names.clone(), &config.id_column, scaler, model)?
            .with_target_column(&config.target_column);

        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(elapsed_secs, artifacts = artifacts.len(), "pipeline finished");

        Ok(PipelineReport {
            feature_names,
            n_train: split.x_train.nrows(),
            n_test: split.x_test.nrows(),
            classification_report,
            feature_importances,
            global_shap,
            local,
            artifacts,
            bundle,
            elapsed_secs,
        })
    }

    fn fit_model(&self, x_train: &Array2<f64>, split: &TrainTestSplit) -> Result<XgbLogisticStack> {
        let config = &self.config;
        let mut model = StackingClassifier::new(
            StackingConfig {
                n_folds: config.cv_folds,
            },
            XGBoostClassifier::new(config.base_learner_config()),
            LogisticRegression::new().with_max_iter(config.meta_max_iter),
        );

        let start = Instant::now();
        model.fit(x_train, &split.y_train)?;
        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            folds = config.cv_folds,
            "fitted stacking classifier"
        );
        Ok(model)
    }

    #[allow(clippy::too_many_arguments)]
    fn explain_test_row(
        &self,
        dataset: &Dataset,
        split: &TrainTestSplit,
        model: &XgbLogisticStack,
        explainer: &TreeExplainer<'_>,
        x_train: &Array2<f64>,
        x_test: &Array2<f64>,
        feature_names: &[String],
        artifacts: &mut Vec<PathBuf>,
    ) -> Result<LocalExplanation> {
        let config = &self.config;
        let test_index = config.instance_index;
        if test_index >= x_test.nrows() {
            return Err(StackwiseError::InvalidParameter {
                name: "instance_index".to_string(),
                value: test_index.to_string(),
                reason: format!("test partition has {} rows", x_test.nrows()),
            });
        }

        let row = dataset.row(split.indices.test[test_index])?;
        let instance_id = cell_to_string(&row, dataset.id_column())?;
        let instance = x_test.slice(ndarray::s![test_index..test_index + 1, ..]).to_owned();

        let shap = explainer.shap_values(&instance)?;
        let shap_values = shap.values.row(0).to_vec();
        let probability = model.predict_proba(&instance)?[0];

        if config.render_plots {
            let path = config.artifact_path(&config.artifacts.shap_local);
            force_plot(
                &path,
                shap.expected_value,
                &shap_values,
                &instance.row(0).to_vec(),
                feature_names,
            )?;
            info!(path = %path.display(), "saved shap force plot");
            artifacts.push(path);
        }

        let sentences =
            interpret_local_attribution(&shap_values, feature_names, config.shap_threshold)?;
        if sentences.is_empty() {
            warn!(
                threshold = config.shap_threshold,
                "no feature reached the attribution threshold"
            );
        }

        let lime_explainer = LimeTabularExplainer::new(
            x_train,
            feature_names.to_vec(),
            LimeConfig {
                num_samples: config.lime_num_samples,
                num_features: config.lime_num_features,
                random_state: config.random_state,
                ..Default::default()
            },
        )?;
        let start = Instant::now();
        let lime = lime_explainer.explain_instance(instance.row(0), |rows| model.predict_proba(rows))?;
        debug!(
            samples = config.lime_num_samples,
            score = lime.score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fitted lime surrogate"
        );

        let path = config.artifact_path(&config.artifacts.lime_report);
        LimeHtmlReport::new(lime.clone())
            .with_instance_id(instance_id.clone())
            .save(&path)?;
        info!(path = %path.display(), "saved lime report");
        artifacts.push(path);

        Ok(LocalExplanation {
            test_index,
            instance_id,
            row,
            probability,
            shap_values,
            expected_value: shap.expected_value,
            sentences,
            lime,
        })
    }
}

/// First value of `column` rendered without quoting
fn cell_to_string(df: &DataFrame, column: &str) -> Result<String> {
    let value = df.column(column)?.get(0)?;
    Ok(match value {
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    })
}
