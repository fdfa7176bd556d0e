//! Z-score feature scaling

use crate::error::{Result, StackwiseError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Standard scaling (z-score normalization): (x - mean) / std
///
/// Uses the population standard deviation. Constant columns get a scale of 1.0
/// so they map to zero instead of dividing by zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            mean: None,
            scale: None,
        }
    }

    /// Fit per-column mean and scale
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(StackwiseError::ValidationError(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| StackwiseError::ValidationError("empty matrix".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });

        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(self)
    }

    /// Apply the fitted transform
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = self.params()?;
        self.check_width(x)?;
        Ok((x - mean) / scale)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Map scaled values back to the original units
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = self.params()?;
        self.check_width(x)?;
        Ok(x * scale + mean)
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    pub fn n_features(&self) -> Option<usize> {
        self.mean.as_ref().map(|m| m.len())
    }

    /// Per-feature means learned during fit
    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    /// Per-feature scales learned during fit
    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.scale.as_ref()
    }

    fn params(&self) -> Result<(&Array1<f64>, &Array1<f64>)> {
        match (&self.mean, &self.scale) {
            (Some(mean), Some(scale)) => Ok((mean, scale)),
            _ => Err(StackwiseError::ModelNotFitted),
        }
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        let expected = self.n_features().unwrap_or(0);
        if x.ncols() != expected {
            return Err(StackwiseError::ShapeError {
                expected: format!("{} features", expected),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0], [5.0, 50.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        for col in scaled.columns() {
            let mean = col.mean().unwrap();
            let var = col.var(0.0);
            assert!(mean.abs() < 1e-10);
            assert!((var - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_constant_column() {
        let x = array![[3.0], [3.0], [3.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();
        assert!(scaled.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_inverse_transform() {
        let x = array![[1.0, -2.0], [2.0, 0.5], [7.0, 3.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();
        let restored = scaler.inverse_transform(&scaled).unwrap();

        for (o, r) in x.iter().zip(restored.iter()) {
            assert!((o - r).abs() < 1e-10);
        }
    }

    #[test]
    fn test_transform_before_fit() {
        let scaler = StandardScaler::new();
        let err = scaler.transform(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, StackwiseError::ModelNotFitted));
    }

    #[test]
    fn test_width_mismatch() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let err = scaler.transform(&array![[1.0]]).unwrap_err();
        assert!(matches!(err, StackwiseError::ShapeError { .. }));
    }
}
