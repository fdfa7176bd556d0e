//! Linear model implementations

use super::models::{validate_binary_target, Classifier};
use crate::error::{Result, StackwiseError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
/// Retries once with a small diagonal ridge if the matrix is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    cholesky_solve_inner(a, b).or_else(|| {
        let mut a_reg = a.clone();
        let ridge = (1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64)
            .max(1e-12);
        for k in 0..n {
            a_reg[[k, k]] += ridge;
        }
        cholesky_solve_inner(&a_reg, b)
    })
}

fn cholesky_solve_inner(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();

    // A = L * L^T
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// L2-regularized logistic regression for binary classification.
///
/// Minimizes `C * Σ log_loss + ½‖w‖²` with Newton-Raphson steps. The intercept is not
/// penalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Inverse regularization strength
    pub c: f64,
    /// Maximum Newton iterations
    pub max_iter: usize,
    /// Convergence tolerance on the step size
    pub tol: f64,
    /// Iterations used by the last fit
    pub n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            max_iter: 100,
            tol: 1e-6,
            n_iter: 0,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    fn sigmoid(v: f64) -> f64 {
        1.0 / (1.0 + (-v).exp())
    }

    /// Linear score `x·w + b` per row
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (coefficients, intercept) = match (&self.coefficients, self.intercept) {
            (Some(c), Some(b)) => (c, b),
            _ => return Err(StackwiseError::ModelNotFitted),
        };
        if x.ncols() != coefficients.len() {
            return Err(StackwiseError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(coefficients) + intercept)
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_binary_target(x, y)?;
        if self.c <= 0.0 {
            return Err(StackwiseError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let n_params = n_features + 1;

        // Design matrix with a leading intercept column
        let design = Array2::from_shape_fn((n_samples, n_params), |(r, c)| {
            if c == 0 {
                1.0
            } else {
                x[[r, c - 1]]
            }
        });

        let penalty = 1.0 / self.c;
        let mut beta = Array1::<f64>::zeros(n_params);
        self.n_iter = 0;

        for iter in 0..self.max_iter {
            self.n_iter = iter + 1;
            let probs = design.dot(&beta).mapv(Self::sigmoid);
            let weights = probs.mapv(|p| (p * (1.0 - p)).max(1e-10));

            let mut gradient = design.t().dot(&(&probs - y));
            for j in 1..n_params {
                gradient[j] += penalty * beta[j];
            }

            let weighted = &design * &weights.clone().insert_axis(Axis(1));
            let mut hessian = design.t().dot(&weighted);
            for j in 1..n_params {
                hessian[[j, j]] += penalty;
            }

            let step = cholesky_solve(&hessian, &gradient).ok_or_else(|| {
                StackwiseError::TrainingError(
                    "logistic regression hessian is singular".to_string(),
                )
            })?;
            beta = beta - &step;

            if step.iter().map(|v| v.abs()).fold(0.0, f64::max) < self.tol {
                break;
            }
        }

        self.intercept = Some(beta[0]);
        self.coefficients = Some(beta.slice(ndarray::s![1..]).to_owned());
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(Self::sigmoid))
    }

    fn name(&self) -> &'static str {
        "logistic_regression"
    }
}

/// Ridge Regression (L2-regularized linear regression) with optional sample weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// L2 regularization strength
    pub alpha: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let weights = Array1::ones(x.nrows());
        self.fit_weighted(x, y, &weights)
    }

    /// Weighted least squares with an unpenalized intercept
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: &Array1<f64>,
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() || n_samples != sample_weight.len() {
            return Err(StackwiseError::ShapeError {
                expected: format!("{} targets and weights", n_samples),
                actual: format!("{} targets, {} weights", y.len(), sample_weight.len()),
            });
        }
        let w_sum = sample_weight.sum();
        if n_samples == 0 || w_sum <= 0.0 {
            return Err(StackwiseError::ValidationError(
                "ridge regression needs rows with positive weight".to_string(),
            ));
        }

        let x_mean = x.t().dot(sample_weight) / w_sum;
        let y_mean = y.dot(sample_weight) / w_sum;
        let x_c = x - &x_mean.clone().insert_axis(Axis(0));
        let y_c = y - y_mean;

        let xw = &x_c * &sample_weight.clone().insert_axis(Axis(1));
        let mut xtx = xw.t().dot(&x_c);
        for i in 0..n_features {
            xtx[[i, i]] += self.alpha;
        }
        let xty = xw.t().dot(&y_c);

        let coefficients = cholesky_solve(&xtx, &xty)
            .ok_or_else(|| StackwiseError::TrainingError("Singular matrix".to_string()))?;

        self.intercept = Some(y_mean - coefficients.dot(&x_mean));
        self.coefficients = Some(coefficients);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match (&self.coefficients, self.intercept) {
            (Some(coefficients), Some(intercept)) => Ok(x.dot(coefficients) + intercept),
            _ => Err(StackwiseError::ModelNotFitted),
        }
    }

    /// Weighted coefficient of determination
    pub fn score_weighted(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: &Array1<f64>,
    ) -> Result<f64> {
        let p = self.predict(x)?;
        let w_sum = sample_weight.sum();
        let ym = if w_sum > 0.0 { y.dot(sample_weight) / w_sum } else { 0.0 };
        let ss_res: f64 = (&p - y).mapv(|v| v * v).dot(sample_weight);
        let ss_tot: f64 = y.mapv(|v| (v - ym).powi(2)).dot(sample_weight);
        Ok(if ss_tot == 0.0 { 1.0 } else { 1.0 - ss_res / ss_tot })
    }
}
