//! Exact path-dependent TreeSHAP for boosted trees
//!
//! Follows Lundberg et al., "Consistent Individualized Feature Attribution for Tree
//! Ensembles" (Algorithm 2). Each tree is walked once per row while a path of
//! `(feature, zero_fraction, one_fraction, weight)` elements tracks the share of all
//! feature subsets that reach the current node. Node covers provide the fraction of
//! training data flowing down each branch.

use crate::error::{Result, StackwiseError};
use crate::training::{TreeNode, XGBoostClassifier};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// SHAP values for a batch of rows, in log-odds space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapValues {
    /// One row per explained sample, one column per feature
    pub values: Array2<f64>,
    /// Model output when no feature is known
    pub expected_value: f64,
}

impl ShapValues {
    /// Attribution vector for one explained row
    pub fn row(&self, index: usize) -> Option<Array1<f64>> {
        (index < self.values.nrows()).then(|| self.values.row(index).to_owned())
    }

    /// Mean absolute SHAP value per feature
    pub fn mean_abs(&self) -> Array1<f64> {
        let n = self.values.nrows().max(1) as f64;
        self.values
            .columns()
            .into_iter()
            .map(|c| c.iter().map(|v| v.abs()).sum::<f64>() / n)
            .collect()
    }

    /// Model output reconstructed from attributions: expected value plus the row sum
    pub fn output(&self, index: usize) -> Option<f64> {
        self.row(index).map(|r| self.expected_value + r.sum())
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// TreeSHAP explainer over a fitted gradient boosted classifier
pub struct TreeExplainer<'a> {
    model: &'a XGBoostClassifier,
    expected_value: f64,
}

impl<'a> TreeExplainer<'a> {
    pub fn new(model: &'a XGBoostClassifier) -> Result<Self> {
        if !model.is_fitted() {
            return Err(StackwiseError::ModelNotFitted);
        }
        let expected_value = model
            .trees()
            .iter()
            .fold(model.base_score(), |acc, tree| acc + tree.expected_value());
        Ok(Self {
            model,
            expected_value,
        })
    }

    /// Base margin plus the cover-weighted mean output of every tree
    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    /// SHAP values for every row of `x`. Rows are explained in parallel.
    pub fn shap_values(&self, x: &Array2<f64>) -> Result<ShapValues> {
        let n_features = self.model.n_features();
        if x.ncols() != n_features {
            return Err(StackwiseError::ShapeError {
                expected: format!("{} features", n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let rows: Vec<Vec<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.explain_row(x.row(i)))
            .collect();

        let values = Array2::from_shape_fn((x.nrows(), n_features), |(r, c)| rows[r][c]);
        Ok(ShapValues {
            values,
            expected_value: self.expected_value,
        })
    }

    fn explain_row(&self, sample: ArrayView1<f64>) -> Vec<f64> {
        let mut phi = vec![0.0; self.model.n_features()];
        for tree in self.model.trees() {
            recurse(tree, &[], 1.0, 1.0, None, sample, &mut phi);
        }
        phi
    }
}

fn recurse(
    node: &TreeNode,
    parent_path: &[PathElement],
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
    sample: ArrayView1<f64>,
    phi: &mut [f64],
) {
    let mut path = parent_path.to_vec();
    extend_path(&mut path, zero_fraction, one_fraction, feature);

    match node {
        TreeNode::Leaf { weight, .. } => {
            for i in 1..path.len() {
                let w = unwound_path_sum(&path, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    phi[f] += w * (el.one_fraction - el.zero_fraction) * weight;
                }
            }
        }
        TreeNode::Split {
            feature: split,
            threshold,
            cover,
            left,
            right,
            ..
        } => {
            let (hot, cold) = if sample[*split] <= *threshold {
                (left.as_ref(), right.as_ref())
            } else {
                (right.as_ref(), left.as_ref())
            };

            let (hot_zero, cold_zero) = if *cover > 0.0 {
                (hot.cover() / cover, cold.cover() / cover)
            } else {
                (0.5, 0.5)
            };

            // A feature seen higher up is unwound so it appears once on the path
            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            if let Some(k) = path.iter().position(|e| e.feature == Some(*split)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind_path(&mut path, k);
            }

            recurse(
                hot,
                &path,
                hot_zero * incoming_zero,
                incoming_one,
                Some(*split),
                sample,
                phi,
            );
            recurse(
                cold,
                &path,
                cold_zero * incoming_zero,
                0.0,
                Some(*split),
                sample,
                phi,
            );
        }
    }
}

fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / denom;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    if one_fraction != 0.0 {
        for i in (0..depth).rev() {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * (depth - i) as f64 / denom;
        }
    } else if zero_fraction != 0.0 {
        for i in (0..depth).rev() {
            total += path[i].pweight / zero_fraction / ((depth - i) as f64 / denom);
        }
    }

    total
}
