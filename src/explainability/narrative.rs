//! Plain-language summaries of local attributions

use crate::error::{Result, StackwiseError};

/// Default minimum |attribution| for a feature to be mentioned
pub const DEFAULT_THRESHOLD: f64 = 0.05;

/// Describe each feature whose |attribution| is at least `threshold`, in feature order.
///
/// Positive values increase the predicted outcome, negative values decrease it.
/// Features below the threshold are left out.
pub fn interpret_local_attribution(
    values: &[f64],
    names: &[String],
    threshold: f64,
) -> Result<Vec<String>> {
    if values.len() != names.len() {
        return Err(StackwiseError::ShapeError {
            expected: format!("{} attribution values", names.len()),
            actual: format!("{} attribution values", values.len()),
        });
    }

    Ok(names
        .iter()
        .zip(values.iter())
        .filter(|(_, v)| v.abs() >= threshold)
        .map(|(name, &v)| {
            let direction = if v > 0.0 { "increases" } else { "decreases" };
            format!(
                "Feature '{}' {} the predicted outcome with an impact of {:.3}.",
                name,
                direction,
                v.abs()
            )
        })
        .collect())
}
