//! Stacking ensemble method

use crate::error::{Result, StackwiseError};
use crate::training::{
    validate_binary_target, Classifier, LogisticRegression, StratifiedKFold, XGBoostClassifier,
};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for stacking ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackingConfig {
    /// Number of stratified cross-validation folds for out-of-fold predictions
    pub n_folds: usize,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self { n_folds: 5 }
    }
}

/// Stacking classifier with one base learner and one meta learner.
///
/// The meta learner is trained on out-of-fold positive-class probabilities of the base
/// learner, then the base learner is refit on all rows. At prediction time the refit base
/// learner feeds the meta learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackingClassifier<B, M> {
    config: StackingConfig,
    base: B,
    meta: M,
    fitted: bool,
}

/// Boosted trees stacked under a logistic regression
pub type XgbLogisticStack = StackingClassifier<XGBoostClassifier, LogisticRegression>;

impl<B, M> StackingClassifier<B, M>
where
    B: Classifier + Clone,
    M: Classifier + Clone,
{
    /// Create an unfitted stack from a base learner template and a meta learner
    pub fn new(config: StackingConfig, base: B, meta: M) -> Self {
        Self {
            config,
            base,
            meta,
            fitted: false,
        }
    }

    pub fn config(&self) -> &StackingConfig {
        &self.config
    }

    /// Base learner refit on the full training set
    pub fn base_estimator(&self) -> &B {
        &self.base
    }

    pub fn meta_estimator(&self) -> &M {
        &self.meta
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Out-of-fold positive-class probabilities of the base learner, one per row
    pub fn cross_val_predict(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Array1<f64>> {
        let splits = StratifiedKFold::new(self.config.n_folds).split(y)?;
        let mut oof = Array1::<f64>::zeros(x.nrows());

        for split in &splits {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_val = x.select(Axis(0), &split.test_indices);

            let mut model = self.base.clone();
            model.fit(&x_train, &y_train)?;
            let proba = model.predict_proba(&x_val)?;

            for (local_idx, &global_idx) in split.test_indices.iter().enumerate() {
                oof[global_idx] = proba[local_idx];
            }
            debug!(
                fold = split.fold_idx,
                train = split.train_indices.len(),
                test = split.test_indices.len(),
                "fitted {} fold",
                model.name()
            );
        }

        Ok(oof)
    }

    fn meta_features(proba: Array1<f64>) -> Array2<f64> {
        proba.insert_axis(Axis(1))
    }
}

impl<B, M> Classifier for StackingClassifier<B, M>
where
    B: Classifier + Clone,
    M: Classifier + Clone,
{
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_binary_target(x, y)?;

        let oof = self.cross_val_predict(x, y)?;
        self.meta.fit(&Self::meta_features(oof), y)?;
        self.base.fit(x, y)?;
        self.fitted = true;

        debug!(
            base = self.base.name(),
            meta = self.meta.name(),
            rows = x.nrows(),
            "stacking ensemble fitted"
        );
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(StackwiseError::ModelNotFitted);
        }
        let base_proba = self.base.predict_proba(x)?;
        self.meta.predict_proba(&Self::meta_features(base_proba))
    }

    fn name(&self) -> &'static str {
        "stacking"
    }
}
