//! LIME-style local surrogate explanations for tabular data
//!
//! Features are discretized into training quartiles. Around the explained row, new
//! samples are drawn bin by bin using training bin frequencies, turned back into
//! continuous values, and scored by the model. A weighted ridge regression over the
//! "same bin as the instance" indicators gives the local explanation.

use crate::error::{Result, StackwiseError};
use crate::training::RidgeRegression;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How features are chosen for the surrogate model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureSelection {
    /// Forward selection for up to 6 features, highest weights otherwise
    Auto,
    /// Greedily add the feature that most improves the weighted R²
    Forward,
    /// Features with the largest ridge coefficient times instance value
    HighestWeights,
    /// Every feature
    None,
}

/// Configuration for the tabular explainer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimeConfig {
    pub num_samples: usize,
    pub num_features: usize,
    /// Defaults to `0.75 * sqrt(n_features)`
    pub kernel_width: Option<f64>,
    pub feature_selection: FeatureSelection,
    pub random_state: u64,
}

impl Default for LimeConfig {
    fn default() -> Self {
        Self {
            num_samples: 5000,
            num_features: 10,
            kernel_width: None,
            feature_selection: FeatureSelection::Auto,
            random_state: 42,
        }
    }
}

/// Result of explaining one row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimeExplanation {
    /// Surrogate intercept
    pub intercept: f64,
    /// Surrogate prediction for the explained row
    pub local_prediction: f64,
    /// Model probability for the explained row
    pub model_prediction: f64,
    /// Weighted R² of the surrogate on the perturbed samples
    pub score: f64,
    /// Bin conditions with their surrogate weights, largest |weight| first
    pub weights: Vec<(String, f64)>,
    /// Feature names with the explained row's values
    pub instance: Vec<(String, f64)>,
}

/// Quartile bins of one feature and the training statistics inside each bin
#[derive(Debug, Clone)]
struct FeatureBins {
    boundaries: Vec<f64>,
    /// Bins present in training data, ascending
    values: Vec<usize>,
    frequencies: Vec<f64>,
    means: Vec<f64>,
    stds: Vec<f64>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl FeatureBins {
    fn fit(column: ArrayView1<f64>) -> Result<Self> {
        let mut sorted: Vec<f64> = column.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mut boundaries: Vec<f64> = [25.0, 50.0, 75.0]
            .iter()
            .map(|&q| percentile(&sorted, q))
            .collect();
        boundaries.dedup();

        let n_bins = boundaries.len() + 1;
        let mut members: Vec<Vec<f64>> = vec![Vec::new(); n_bins];
        for &v in column.iter() {
            members[bin_of(&boundaries, v)].push(v);
        }

        let first = sorted.first().copied().ok_or_else(|| {
            StackwiseError::ValidationError("cannot discretize an empty column".to_string())
        })?;
        let last = sorted.last().copied().unwrap_or(first);

        let mut mins = vec![first];
        mins.extend(boundaries.iter().copied());
        let mut maxs = boundaries.clone();
        maxs.push(last);

        let total = column.len() as f64;
        let mut values = Vec::new();
        let mut frequencies = Vec::new();
        let mut means = vec![0.0; n_bins];
        let mut stds = vec![0.0; n_bins];

        for (bin, selection) in members.iter().enumerate() {
            if selection.is_empty() {
                means[bin] = (mins[bin] + maxs[bin]) / 2.0;
                continue;
            }
            let n = selection.len() as f64;
            let mean = selection.iter().sum::<f64>() / n;
            let var = selection.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            means[bin] = mean;
            stds[bin] = var.sqrt() + 1e-11;
            values.push(bin);
            frequencies.push(n / total);
        }

        Ok(Self {
            boundaries,
            values,
            frequencies,
            means,
            stds,
            mins,
            maxs,
        })
    }

    fn discretize(&self, value: f64) -> usize {
        bin_of(&self.boundaries, value)
    }

    /// Continuous value inside `bin`, drawn from a normal around the bin mean truncated to the bin bounds
    fn undiscretize(&self, bin: usize, rng: &mut ChaCha8Rng) -> f64 {
        let (mean, std, lo, hi) = (self.means[bin], self.stds[bin], self.mins[bin], self.maxs[bin]);
        let normal = match Normal::new(mean, std) {
            Ok(n) if std > 1e-10 => n,
            _ => return mean,
        };
        for _ in 0..64 {
            let v = normal.sample(rng);
            if v >= lo && v <= hi {
                return v;
            }
        }
        mean.clamp(lo, hi)
    }

    fn bin_name(&self, name: &str, bin: usize) -> String {
        let q = &self.boundaries;
        if bin == 0 {
            format!("{} <= {:.2}", name, q[0])
        } else if bin == q.len() {
            format!("{} > {:.2}", name, q[q.len() - 1])
        } else {
            format!("{:.2} < {} <= {:.2}", q[bin - 1], name, q[bin])
        }
    }
}

/// Index of the first boundary not below `value`
fn bin_of(boundaries: &[f64], value: f64) -> usize {
    boundaries.iter().take_while(|&&b| b < value).count()
}

/// Percentile with linear interpolation between closest ranks
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Explains individual predictions with a locally weighted linear surrogate
#[derive(Debug, Clone)]
pub struct LimeTabularExplainer {
    config: LimeConfig,
    feature_names: Vec<String>,
    bins: Vec<FeatureBins>,
}

impl LimeTabularExplainer {
    /// Learn quartile bins and bin statistics from the training matrix
    pub fn new(training_data: &Array2<f64>, feature_names: Vec<String>, config: LimeConfig) -> Result<Self> {
        if training_data.ncols() != feature_names.len() {
            return Err(StackwiseError::ShapeError {
                expected: format!("{} feature columns", feature_names.len()),
                actual: format!("{} feature columns", training_data.ncols()),
            });
        }
        if training_data.nrows() == 0 {
            return Err(StackwiseError::ValidationError(
                "explainer needs at least one training row".to_string(),
            ));
        }
        if config.num_samples < 2 {
            return Err(StackwiseError::InvalidParameter {
                name: "num_samples".to_string(),
                value: config.num_samples.to_string(),
                reason: "at least 2 samples are required".to_string(),
            });
        }

        let bins = training_data
            .axis_iter(Axis(1))
            .map(FeatureBins::fit)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            feature_names,
            bins,
        })
    }

    pub fn config(&self) -> &LimeConfig {
        &self.config
    }

    fn kernel_width(&self) -> f64 {
        self.config
            .kernel_width
            .unwrap_or_else(|| 0.75 * (self.feature_names.len() as f64).sqrt())
    }

    /// Perturbed neighbourhood of `row`: binary "same bin" indicators and continuous samples.
    /// The first sample is the row itself.
    fn sample_neighbourhood(&self, row: ArrayView1<f64>) -> Result<(Array2<f64>, Array2<f64>)> {
        let n_samples = self.config.num_samples;
        let n_features = self.bins.len();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);

        let mut binary = Array2::<f64>::zeros((n_samples, n_features));
        let mut inverse = Array2::<f64>::zeros((n_samples, n_features));

        for (j, bins) in self.bins.iter().enumerate() {
            let instance_bin = bins.discretize(row[j]);
            let choice = WeightedIndex::new(&bins.frequencies)
                .map_err(|e| StackwiseError::ValidationError(format!("feature {}: {}", j, e)))?;

            let drawn: Vec<usize> = (0..n_samples)
                .map(|_| bins.values[choice.sample(&mut rng)])
                .collect();

            binary[[0, j]] = 1.0;
            inverse[[0, j]] = row[j];
            for (i, &bin) in drawn.iter().enumerate().skip(1) {
                binary[[i, j]] = if bin == instance_bin { 1.0 } else { 0.0 };
                inverse[[i, j]] = bins.undiscretize(bin, &mut rng);
            }
        }

        Ok((binary, inverse))
    }

    /// Explain the positive-class probability of `row`.
    ///
    /// `predict_fn` maps a matrix of rows to positive-class probabilities.
    pub fn explain_instance<F>(&self, row: ArrayView1<f64>, predict_fn: F) -> Result<LimeExplanation>
    where
        F: Fn(&Array2<f64>) -> Result<Array1<f64>>,
    {
        if row.len() != self.bins.len() {
            return Err(StackwiseError::ShapeError {
                expected: format!("{} features", self.bins.len()),
                actual: format!("{} features", row.len()),
            });
        }

        let (binary, inverse) = self.sample_neighbourhood(row)?;
        let labels = predict_fn(&inverse)?;
        if labels.len() != binary.nrows() {
            return Err(StackwiseError::ShapeError {
                expected: format!("{} predictions", binary.nrows()),
                actual: format!("{} predictions", labels.len()),
            });
        }

        let width = self.kernel_width();
        let first = binary.row(0);
        let weights: Array1<f64> = binary
            .rows()
            .into_iter()
            .map(|r| {
                let d2: f64 = r.iter().zip(first.iter()).map(|(a, b)| (a - b).powi(2)).sum();
                (-d2 / (width * width)).exp().sqrt()
            })
            .collect();

        let used = self.select_features(&binary, &labels, &weights)?;
        let design = binary.select(Axis(1), &used);

        let mut surrogate = RidgeRegression::new(1.0);
        surrogate.fit_weighted(&design, &labels, &weights)?;
        let score = surrogate.score_weighted(&design, &labels, &weights)?;
        let local_prediction = surrogate
            .predict(&design.slice(ndarray::s![0..1, ..]).to_owned())?[0];

        let coefficients = surrogate
            .coefficients
            .clone()
            .ok_or(StackwiseError::ModelNotFitted)?;

        let mut explained: Vec<(String, f64)> = used
            .iter()
            .zip(coefficients.iter())
            .map(|(&j, &w)| {
                let bin = self.bins[j].discretize(row[j]);
                (self.bins[j].bin_name(&self.feature_names[j], bin), w)
            })
            .collect();
        explained.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            samples = binary.nrows(),
            features = used.len(),
            score,
            "fitted local surrogate"
        );

        Ok(LimeExplanation {
            intercept: surrogate.intercept.unwrap_or(0.0),
            local_prediction,
            model_prediction: labels[0],
            score,
            weights: explained,
            instance: self
                .feature_names
                .iter()
                .cloned()
                .zip(row.iter().copied())
                .collect(),
        })
    }

    fn select_features(
        &self,
        data: &Array2<f64>,
        labels: &Array1<f64>,
        weights: &Array1<f64>,
    ) -> Result<Vec<usize>> {
        let n_features = data.ncols();
        let k = self.config.num_features.min(n_features);
        let method = match self.config.feature_selection {
            FeatureSelection::Auto if k <= 6 => FeatureSelection::Forward,
            FeatureSelection::Auto => FeatureSelection::HighestWeights,
            other => other,
        };

        match method {
            FeatureSelection::Forward => {
                let mut used: Vec<usize> = Vec::with_capacity(k);
                for _ in 0..k {
                    let mut best: Option<(usize, f64)> = None;
                    for feature in (0..n_features).filter(|f| !used.contains(f)) {
                        let mut candidate = used.clone();
                        candidate.push(feature);
                        let design = data.select(Axis(1), &candidate);
                        let mut model = RidgeRegression::new(0.0);
                        model.fit_weighted(&design, labels, weights)?;
                        let score = model.score_weighted(&design, labels, weights)?;
                        if best.map_or(true, |(_, s)| score > s) {
                            best = Some((feature, score));
                        }
                    }
                    if let Some((feature, _)) = best {
                        used.push(feature);
                    }
                }
                Ok(used)
            }
            FeatureSelection::HighestWeights => {
                let mut model = RidgeRegression::new(0.01);
                model.fit_weighted(data, labels, weights)?;
                let coefficients = model.coefficients.ok_or(StackwiseError::ModelNotFitted)?;
                let first = data.row(0);
                let mut ranked: Vec<(usize, f64)> = coefficients
                    .iter()
                    .zip(first.iter())
                    .map(|(c, v)| c * v)
                    .enumerate()
                    .collect();
                ranked.sort_by(|a, b| {
                    b.1.abs()
                        .partial_cmp(&a.1.abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                Ok(ranked.into_iter().take(k).map(|(j, _)| j).collect())
            }
            _ => Ok((0..n_features).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training() -> (Array2<f64>, Vec<String>) {
        let x = Array2::from_shape_fn((200, 3), |(r, c)| ((r * (2 * c + 1)) % 37) as f64 / 3.0);
        (x, vec!["a".into(), "b".into(), "c".into()])
    }

    /// Probability driven almost entirely by feature `a`
    fn predict(x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(x.column(0).mapv(|v| 1.0 / (1.0 + (-(v - 6.0)).exp())))
    }

    fn config(samples: usize) -> LimeConfig {
        LimeConfig {
            num_samples: samples,
            ..Default::default()
        }
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&sorted, 25.0) - 1.75).abs() < 1e-12);
        assert!((percentile(&sorted, 50.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_bin_names() {
        let column = ndarray::array![1.0, 2.0, 3.0, 4.0, 5.0];
        let bins = FeatureBins::fit(column.view()).unwrap();
        assert_eq!(bins.boundaries, vec![2.0, 3.0, 4.0]);
        assert_eq!(bins.bin_name("x", 0), "x <= 2.00");
        assert_eq!(bins.bin_name("x", 1), "2.00 < x <= 3.00");
        assert_eq!(bins.bin_name("x", 3), "x > 4.00");
        assert_eq!(bins.discretize(2.0), 0);
        assert_eq!(bins.discretize(2.5), 1);
    }

    #[test]
    fn test_undiscretized_values_stay_in_bin() {
        let (x, _) = training();
        let bins = FeatureBins::fit(x.column(0)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for &bin in &bins.values {
            for _ in 0..50 {
                let v = bins.undiscretize(bin, &mut rng);
                assert!(v >= bins.mins[bin] && v <= bins.maxs[bin]);
            }
        }
    }

    #[test]
    fn test_dominant_feature_ranked_first() {
        let (x, names) = training();
        let explainer = LimeTabularExplainer::new(&x, names, config(1000)).unwrap();
        let row = x.row(5);
        let explanation = explainer.explain_instance(row, predict).unwrap();

        assert_eq!(explanation.weights.len(), 3);
        assert!(explanation.weights[0].0.contains('a'));
        assert!((explanation.model_prediction - predict(&row.to_owned().insert_axis(Axis(0))).unwrap()[0]).abs() < 1e-12);
        assert!(explanation.score > 0.0);
    }

    #[test]
    fn test_same_seed_same_explanation() {
        let (x, names) = training();
        let explainer = LimeTabularExplainer::new(&x, names, config(500)).unwrap();
        let a = explainer.explain_instance(x.row(3), predict).unwrap();
        let b = explainer.explain_instance(x.row(3), predict).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.intercept, b.intercept);
    }

    #[test]
    fn test_num_features_limits_output() {
        let (x, names) = training();
        let explainer = LimeTabularExplainer::new(
            &x,
            names,
            LimeConfig {
                num_samples: 300,
                num_features: 2,
                ..Default::default()
            },
        )
        .unwrap();
        let explanation = explainer.explain_instance(x.row(0), predict).unwrap();
        assert_eq!(explanation.weights.len(), 2);
    }

    #[test]
    fn test_row_width_checked() {
        let (x, names) = training();
        let explainer = LimeTabularExplainer::new(&x, names, config(100)).unwrap();
        let short = ndarray::array![1.0, 2.0];
        assert!(explainer.explain_instance(short.view(), predict).is_err());
    }
}
