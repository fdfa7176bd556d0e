//! Classifier trait and evaluation report

use crate::error::{Result, StackwiseError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A binary classifier over dense f64 features.
///
/// `predict_proba` returns the probability of the positive class for every row.
pub trait Classifier: Send + Sync {
    /// Fit on a feature matrix and a 0/1 target vector
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Positive-class probability per row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard labels, 1.0 where the positive-class probability is at least 0.5
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Short identifier used in logs
    fn name(&self) -> &'static str;
}

/// Shared checks for `Classifier::fit` implementations
pub(crate) fn validate_binary_target(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(StackwiseError::ValidationError(
            "cannot fit on an empty matrix".to_string(),
        ));
    }
    if x.nrows() != y.len() {
        return Err(StackwiseError::ShapeError {
            expected: format!("{} target values", x.nrows()),
            actual: format!("{} target values", y.len()),
        });
    }
    if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(StackwiseError::ValidationError(format!(
            "target must be binary (0/1), found {}",
            bad
        )));
    }
    Ok(())
}

/// Precision, recall, F1 and support for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class and averaged metrics for a set of predictions.
///
/// `Display` renders a fixed-width table with two decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Compute the report from true and predicted 0/1 labels.
    ///
    /// Classes are the union of labels seen in either vector. Undefined ratios are 0.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(StackwiseError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(StackwiseError::ValidationError(
                "cannot evaluate an empty prediction set".to_string(),
            ));
        }

        let mut labels: Vec<i64> = y_true
            .iter()
            .chain(y_pred.iter())
            .map(|v| v.round() as i64)
            .collect();
        labels.sort_unstable();
        labels.dedup();

        let classes: Vec<ClassMetrics> = labels
            .iter()
            .map(|&label| {
                let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
                for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
                    let t = t.round() as i64 == label;
                    let p = p.round() as i64 == label;
                    match (t, p) {
                        (true, true) => tp += 1,
                        (false, true) => fp += 1,
                        (true, false) => fn_ += 1,
                        (false, false) => {}
                    }
                }
                let precision = ratio(tp, tp + fp);
                let recall = ratio(tp, tp + fn_);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: label.to_string(),
                    precision,
                    recall,
                    f1_score,
                    support: tp + fn_,
                }
            })
            .collect();

        let total = y_true.len();
        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| (*t - *p).abs() < 0.5)
            .count();

        let n_classes = classes.len() as f64;
        let macro_avg = ClassMetrics {
            label: "macro avg".to_string(),
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n_classes,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n_classes,
            f1_score: classes.iter().map(|c| c.f1_score).sum::<f64>() / n_classes,
            support: total,
        };

        let weighted = |f: fn(&ClassMetrics) -> f64| {
            classes
                .iter()
                .map(|c| f(c) * c.support as f64)
                .sum::<f64>()
                / total as f64
        };
        let weighted_avg = ClassMetrics {
            label: "weighted avg".to_string(),
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1_score: weighted(|c| c.f1_score),
            support: total,
        };

        Ok(Self {
            classes,
            accuracy: correct as f64 / total as f64,
            macro_avg,
            weighted_avg,
        })
    }

    /// Metrics for one class label, e.g. `"1"`
    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        write!(f, "{:>width$} ", "", width = width)?;
        for header in ["precision", "recall", "f1-score", "support"] {
            write!(f, " {:>9}", header)?;
        }
        writeln!(f)?;
        writeln!(f)?;

        let row = |f: &mut fmt::Formatter<'_>, m: &ClassMetrics| -> fmt::Result {
            writeln!(
                f,
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.label,
                m.precision,
                m.recall,
                m.f1_score,
                m.support,
                width = width
            )
        };

        for class in &self.classes {
            row(f, class)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.macro_avg.support,
            width = width
        )?;
        row(f, &self.macro_avg)?;
        row(f, &self.weighted_avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_report_values() {
        let y_true = array![0.0, 0.0, 1.0, 1.0, 1.0];
        let y_pred = array![0.0, 1.0, 1.0, 1.0, 0.0];
        let report = ClassificationReport::compute(&y_true, &y_pred).unwrap();

        assert!((report.accuracy - 0.6).abs() < 1e-12);

        let zero = report.class("0").unwrap();
        assert!((zero.precision - 0.5).abs() < 1e-12);
        assert!((zero.recall - 0.5).abs() < 1e-12);
        assert_eq!(zero.support, 2);

        let one = report.class("1").unwrap();
        assert!((one.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((one.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(one.support, 3);

        assert_eq!(report.weighted_avg.support, 5);
        let expected_weighted = (0.5 * 2.0 + (2.0 / 3.0) * 3.0) / 5.0;
        assert!((report.weighted_avg.precision - expected_weighted).abs() < 1e-12);
    }

    #[test]
    fn test_undefined_precision_is_zero() {
        let y_true = array![0.0, 1.0];
        let y_pred = array![0.0, 0.0];
        let report = ClassificationReport::compute(&y_true, &y_pred).unwrap();
        assert_eq!(report.class("1").unwrap().precision, 0.0);
        assert_eq!(report.class("1").unwrap().f1_score, 0.0);
    }

    #[test]
    fn test_display_layout() {
        let y_true = array![0.0, 1.0, 1.0, 0.0];
        let y_pred = array![0.0, 1.0, 0.0, 0.0];
        let text = ClassificationReport::compute(&y_true, &y_pred)
            .unwrap()
            .to_string();

        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].trim_start().starts_with("precision"));
        assert!(lines[2].trim_start().starts_with("0 "));
        assert!(text.contains("accuracy"));
        assert!(text.contains("macro avg"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("0.75"));
    }

    #[test]
    fn test_length_mismatch() {
        let err = ClassificationReport::compute(&array![0.0], &array![0.0, 1.0]).unwrap_err();
        assert!(matches!(err, StackwiseError::ShapeError { .. }));
    }
}
