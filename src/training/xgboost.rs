//! XGBoost-style gradient boosting with second-order approximation
//!
//! Key properties:
//! - Uses both gradient (first derivative) and hessian (second derivative) of the logistic loss
//! - Regularized leaf weights: w* = -G / (H + lambda), shrunk by the learning rate
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Every node keeps its cover (hessian sum) so the ensemble can be explained with TreeSHAP

use super::models::{validate_binary_target, Classifier};
use crate::error::{Result, StackwiseError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    /// Left unset when absent from a config file so an enclosing seed can apply
    #[serde(default)]
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

/// How per-feature importance is aggregated over all splits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportanceType {
    /// Average gain of the splits that use the feature
    Gain,
    /// Total gain of the splits that use the feature
    TotalGain,
    /// Number of splits that use the feature
    Weight,
}

/// A node of a boosted tree. Leaf weights already include the learning rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        weight: f64,
        cover: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        cover: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    /// Raw contribution of this tree for one sample. Samples with `x <= threshold` go left.
    pub fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            TreeNode::Leaf { weight, .. } => *weight,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    /// Hessian sum of the training samples that reached this node
    pub fn cover(&self) -> f64 {
        match self {
            TreeNode::Leaf { cover, .. } | TreeNode::Split { cover, .. } => *cover,
        }
    }

    /// Number of edges on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Cover-weighted mean leaf value, i.e. the tree's expected output over the training data
    pub fn expected_value(&self) -> f64 {
        match self {
            TreeNode::Leaf { weight, .. } => *weight,
            TreeNode::Split {
                cover, left, right, ..
            } => {
                if *cover <= 0.0 {
                    return 0.5 * (left.expected_value() + right.expected_value());
                }
                (left.cover() * left.expected_value() + right.cover() * right.expected_value())
                    / cover
            }
        }
    }

    fn accumulate_importance(&self, gains: &mut [f64], counts: &mut [f64]) {
        if let TreeNode::Split {
            feature,
            gain,
            left,
            right,
            ..
        } = self
        {
            if *feature < gains.len() {
                gains[*feature] += *gain;
                counts[*feature] += 1.0;
            }
            left.accumulate_importance(gains, counts);
            right.accumulate_importance(gains, counts);
        }
    }
}

/// Build an XGBoost tree using exact greedy split finding
fn build_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> TreeNode {
    let n = indices.len();

    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let leaf = TreeNode::Leaf {
        weight: config.learning_rate
            * compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha),
        cover: h_sum,
    };

    if depth >= config.max_depth || n < 2 || h_sum < config.min_child_weight {
        return leaf;
    }

    let best_split = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split_for_feature(x, grad, hess, indices, f, config))
        .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return leaf;
            }

            let left = build_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            TreeNode::Split {
                feature,
                threshold,
                gain,
                cover: h_sum,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => leaf,
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    if alpha > 0.0 {
        let g_adj = if g_sum > alpha {
            g_sum - alpha
        } else if g_sum < -alpha {
            g_sum + alpha
        } else {
            return 0.0;
        };
        -g_adj / (h_sum + lambda)
    } else {
        -g_sum / (h_sum + lambda)
    }
}

/// Best (feature, threshold, gain) for one feature using the exact greedy method
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| {
        x[[a, feature]]
            .partial_cmp(&x[[b, feature]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let g_total: f64 = sorted_indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| hess[i]).sum();

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(f64, f64)> = None;
    let lambda = config.reg_lambda;

    // The last position would put every sample on the left
    for pos in 0..sorted_indices.len().saturating_sub(1) {
        let idx = sorted_indices[pos];
        let next_idx = sorted_indices[pos + 1];
        g_left += grad[idx];
        h_left += hess[idx];

        // Identical values cannot be separated
        if (x[[idx, feature]] - x[[next_idx, feature]]).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;

        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - (g_total * g_total) / (h_total + lambda));

        if best.map_or(true, |(best_gain, _)| gain > best_gain) {
            let threshold = (x[[idx, feature]] + x[[next_idx, feature]]) / 2.0;
            best = Some((gain, threshold));
        }
    }

    best.map(|(gain, threshold)| (feature, threshold, gain))
}

/// XGBoost classifier (logistic loss with second-order approximation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    trees: Vec<TreeNode>,
    base_score: f64,
    n_features: usize,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    /// Fitted trees in boosting order
    pub fn trees(&self) -> &[TreeNode] {
        &self.trees
    }

    /// Initial prediction in log-odds space
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features > 0
    }

    /// Raw log-odds for each row
    pub fn margin(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(StackwiseError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(StackwiseError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let raw: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|row| {
                self.trees
                    .iter()
                    .fold(self.base_score, |acc, tree| acc + tree.predict(row))
            })
            .collect();
        Ok(Array1::from_vec(raw))
    }

    /// Per-feature importances normalized to sum to one
    pub fn feature_importances_by(&self, kind: ImportanceType) -> Option<Array1<f64>> {
        if !self.is_fitted() {
            return None;
        }

        let mut gains = vec![0.0f64; self.n_features];
        let mut counts = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            tree.accumulate_importance(&mut gains, &mut counts);
        }

        let mut scores: Vec<f64> = match kind {
            ImportanceType::Gain => gains
                .iter()
                .zip(counts.iter())
                .map(|(&g, &c)| if c > 0.0 { g / c } else { 0.0 })
                .collect(),
            ImportanceType::TotalGain => gains,
            ImportanceType::Weight => counts,
        };

        let total: f64 = scores.iter().sum();
        if total > 0.0 {
            for s in scores.iter_mut() {
                *s /= total;
            }
        }
        Some(Array1::from_vec(scores))
    }

    /// Gain importances, the default reported for the base learner
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances_by(ImportanceType::Gain)
    }
}

impl Classifier for XGBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_binary_target(x, y)?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;

        // Base score in log-odds space
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.base_score = (p / (1.0 - p)).ln();
        let mut raw_preds = Array1::from_elem(n_samples, self.base_score);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            // Logistic loss: grad = p - y, hess = p * (1 - p)
            let probs: Array1<f64> = raw_preds.mapv(Self::sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = build_tree(x, &grad, &hess, &row_indices, &col_indices, 0, &self.config);

            for (i, row) in x.rows().into_iter().enumerate() {
                raw_preds[i] += tree.predict(row);
            }

            self.trees.push(tree);
        }

        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.margin(x)?.mapv(Self::sigmoid))
    }

    fn name(&self) -> &'static str {
        "xgboost"
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil().max(1.0) as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((50, 2), (0..100).map(|i| i as f64 * 0.1).collect())
            .unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| if r[0] + r[1] > 5.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_xgboost_classifier() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 50,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();
        let correct = preds
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count();
        let acc = correct as f64 / y.len() as f64;
        assert!(acc >= 0.8, "XGBoost classifier accuracy = {}", acc);
        assert!(model.trees().iter().all(|tree| tree.depth() <= 4));
    }

    #[test]
    fn test_xgboost_predict_proba() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(Default::default());
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), x.nrows());
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_deterministic_with_seed() {
        let (x, y) = classification_data();
        let config = XGBoostConfig {
            n_estimators: 20,
            subsample: 0.7,
            colsample_bytree: 0.5,
            ..Default::default()
        };
        let mut a = XGBoostClassifier::new(config.clone());
        let mut b = XGBoostClassifier::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.margin(&x).unwrap(), b.margin(&x).unwrap());
    }

    #[test]
    fn test_gain_importances_sum_to_one() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 10,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        for kind in [ImportanceType::Gain, ImportanceType::TotalGain, ImportanceType::Weight] {
            let importances = model.feature_importances_by(kind).unwrap();
            assert_eq!(importances.len(), 2);
            let sum: f64 = importances.sum();
            assert!((sum - 1.0).abs() < 1e-9, "{:?} importances sum to {}", kind, sum);
        }
    }

    #[test]
    fn test_cover_is_consistent() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 3,
            max_depth: 3,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        fn check(node: &TreeNode) {
            if let TreeNode::Split { cover, left, right, .. } = node {
                assert!((cover - left.cover() - right.cover()).abs() < 1e-9);
                check(left);
                check(right);
            }
        }
        for tree in model.trees() {
            check(tree);
        }
    }

    #[test]
    fn test_predict_before_fit() {
        let model = XGBoostClassifier::new(Default::default());
        let x = Array2::zeros((2, 2));
        assert!(matches!(model.predict_proba(&x), Err(StackwiseError::ModelNotFitted)));
    }
}
