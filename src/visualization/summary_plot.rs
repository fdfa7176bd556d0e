//! Beeswarm summary of SHAP values across many rows

use super::plot_err;
use crate::error::{Result, StackwiseError};
use crate::explainability::ShapValues;
use ndarray::Array2;
use plotters::prelude::*;
use std::path::Path;
use tracing::debug;

/// Layout of the summary plot
#[derive(Debug, Clone)]
pub struct SummaryPlotOptions {
    pub width: u32,
    pub height_per_feature: u32,
    /// Most important features shown
    pub max_display: usize,
    pub title: String,
}

impl Default for SummaryPlotOptions {
    fn default() -> Self {
        Self {
            width: 900,
            height_per_feature: 36,
            max_display: 20,
            title: "SHAP summary".to_string(),
        }
    }
}

/// Feature indices by descending mean |SHAP|, at most `max_display`
pub fn feature_order(shap: &ShapValues, max_display: usize) -> Vec<usize> {
    let importance = shap.mean_abs();
    let mut order: Vec<usize> = (0..importance.len()).collect();
    order.sort_by(|&a, &b| {
        importance[b]
            .partial_cmp(&importance[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(max_display);
    order
}

/// Vertical offsets that spread points sharing similar x values into a swarm.
///
/// Points are bucketed along x; the k-th point of a bucket is placed at alternating
/// offsets `+s, -s, +2s, -2s, ...` scaled to stay within `±max_offset`.
pub fn beeswarm_offsets(xs: &[f64], n_buckets: usize, max_offset: f64) -> Vec<f64> {
    if xs.is_empty() {
        return Vec::new();
    }
    let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = (hi - lo).max(1e-12);
    let n_buckets = n_buckets.max(1);

    let bucket_of = |x: f64| (((x - lo) / span) * (n_buckets - 1) as f64).round() as usize;

    let mut counts = vec![0usize; n_buckets];
    for &x in xs {
        counts[bucket_of(x)] += 1;
    }
    let crowd = counts.iter().copied().max().unwrap_or(1).max(1) as f64;
    let step = max_offset / (crowd / 2.0).ceil().max(1.0);

    let mut seen = vec![0usize; n_buckets];
    xs.iter()
        .map(|&x| {
            let b = bucket_of(x);
            let k = seen[b];
            seen[b] += 1;
            let level = ((k + 1) / 2) as f64;
            let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
            sign * level * step
        })
        .collect()
}

/// Position of `value` between the 5th and 95th percentile of `column`, clipped to [0, 1]
pub fn normalized_feature_value(value: f64, column: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = column.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.is_empty() {
        return 0.5;
    }
    let at = |q: f64| sorted[((sorted.len() - 1) as f64 * q).round() as usize];
    let (lo, hi) = (at(0.05), at(0.95));
    if hi - lo <= 1e-12 {
        return 0.5;
    }
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Blue for low feature values through purple to red for high values
pub fn value_color(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let (low, high) = ((0u8, 139u8, 251u8), (255u8, 0u8, 82u8));
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(mix(low.0, high.0), mix(low.1, high.1), mix(low.2, high.2))
}

/// Write a beeswarm PNG: one row per feature, one dot per explained sample, dots coloured by
/// the sample's feature value.
pub fn summary_plot(
    path: impl AsRef<Path>,
    shap: &ShapValues,
    features: &Array2<f64>,
    feature_names: &[String],
    options: &SummaryPlotOptions,
) -> Result<()> {
    let path = path.as_ref();
    if features.dim() != shap.values.dim() || feature_names.len() != shap.values.ncols() {
        return Err(StackwiseError::ShapeError {
            expected: format!(
                "{:?} feature matrix and {} names",
                shap.values.dim(),
                shap.values.ncols()
            ),
            actual: format!("{:?} and {} names", features.dim(), feature_names.len()),
        });
    }

    let order = feature_order(shap, options.max_display);
    let n_rows = order.len();
    let height = 120 + options.height_per_feature * n_rows.max(1) as u32;

    let max_abs = shap
        .values
        .iter()
        .map(|v| v.abs())
        .fold(0.0f64, f64::max)
        .max(1e-6)
        * 1.05;

    let root = BitMapBackend::new(path, (options.width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    // Row 0 is drawn at the top, so the most important feature gets the highest y
    let labels: Vec<String> = order.iter().rev().map(|&j| feature_names[j].clone()).collect();

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 20))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(180)
        .build_cartesian_2d(
            -max_abs..max_abs,
            -0.6f64..(n_rows as f64 - 0.4),
        )
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n_rows.max(1))
        .x_desc("SHAP value (impact on model output)")
        .y_label_formatter(&|y: &f64| {
            let i = y.round();
            if (y - i).abs() < 1e-6 && i >= 0.0 && (i as usize) < labels.len() {
                labels[i as usize].clone()
            } else {
                String::new()
            }
        })
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            vec![(0.0, -0.6), (0.0, n_rows as f64 - 0.4)],
            BLACK.mix(0.4),
        ))
        .map_err(plot_err)?;

    for (rank, &j) in order.iter().enumerate() {
        let y = (n_rows - 1 - rank) as f64;
        let xs: Vec<f64> = shap.values.column(j).to_vec();
        let column: Vec<f64> = features.column(j).to_vec();
        let offsets = beeswarm_offsets(&xs, 100, 0.35);

        chart
            .draw_series(xs.iter().zip(offsets.iter()).zip(column.iter()).map(
                |((&x, &dy), &v)| {
                    let color = value_color(normalized_feature_value(v, &column));
                    Circle::new((x, y + dy), 3, color.filled())
                },
            ))
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    debug!(path = %path.display(), features = n_rows, "wrote shap summary plot");
    Ok(())
}
