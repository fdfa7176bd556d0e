//! Ranked feature importance

use crate::error::{Result, StackwiseError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Importance score of a single feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub score: f64,
}

impl fmt::Display for FeatureImportance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.4}", self.feature, self.score)
    }
}

/// Pair feature names with scores and sort by descending score.
///
/// The sort is stable, so tied features keep their column order.
pub fn rank_feature_importances(names: &[String], scores: &[f64]) -> Result<Vec<FeatureImportance>> {
    if names.len() != scores.len() {
        return Err(StackwiseError::ShapeError {
            expected: format!("{} importance scores", names.len()),
            actual: format!("{} importance scores", scores.len()),
        });
    }

    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(scores.iter())
        .map(|(name, &score)| FeatureImportance {
            feature: name.clone(),
            score,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sorted_descending() {
        let ranked =
            rank_feature_importances(&names(&["a", "b", "c"]), &[0.2, 0.5, 0.3]).unwrap();
        let order: Vec<&str> = ranked.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_ties_keep_column_order() {
        let ranked =
            rank_feature_importances(&names(&["x", "y", "z"]), &[0.1, 0.1, 0.8]).unwrap();
        let order: Vec<&str> = ranked.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(order, vec!["z", "x", "y"]);
    }

    #[test]
    fn test_display_four_decimals() {
        let item = FeatureImportance {
            feature: "income".to_string(),
            score: 0.123456,
        };
        assert_eq!(item.to_string(), "income: 0.1235");
    }

    #[test]
    fn test_length_mismatch() {
        assert!(rank_feature_importances(&names(&["a"]), &[0.1, 0.2]).is_err());
    }
}
