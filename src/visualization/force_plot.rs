//! Force plot of a single row's SHAP values

use super::plot_err;
use crate::error::{Result, StackwiseError};
use plotters::prelude::*;
use std::path::Path;
use tracing::debug;

const PUSH_UP: RGBColor = RGBColor(255, 0, 82);
const PUSH_DOWN: RGBColor = RGBColor(0, 139, 251);

/// One feature's block on the force axis
#[derive(Debug, Clone, PartialEq)]
pub struct ForceSegment {
    pub feature: usize,
    pub start: f64,
    pub end: f64,
    /// Contribution raises the output
    pub positive: bool,
}

/// Lay contributions out around the model output `base + Σ values`.
///
/// Positive contributions are stacked to the left of the output and negative ones to the
/// right, the largest next to the output in both directions. Zero contributions are skipped.
pub fn force_segments(base_value: f64, values: &[f64]) -> Vec<ForceSegment> {
    let output = base_value + values.iter().sum::<f64>();

    let mut positive: Vec<usize> = (0..values.len()).filter(|&j| values[j] > 0.0).collect();
    let mut negative: Vec<usize> = (0..values.len()).filter(|&j| values[j] < 0.0).collect();
    let by_magnitude = |a: &usize, b: &usize| {
        values[*b]
            .abs()
            .partial_cmp(&values[*a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    };
    positive.sort_by(by_magnitude);
    negative.sort_by(by_magnitude);

    let mut segments = Vec::with_capacity(positive.len() + negative.len());

    let mut edge = output;
    for j in positive {
        segments.push(ForceSegment {
            feature: j,
            start: edge - values[j],
            end: edge,
            positive: true,
        });
        edge -= values[j];
    }

    let mut edge = output;
    for j in negative {
        segments.push(ForceSegment {
            feature: j,
            start: edge,
            end: edge - values[j],
            positive: false,
        });
        edge -= values[j];
    }

    segments
}

/// Write a force plot PNG for one row.
///
/// The axis spans every segment plus the base value; blocks larger than 3% of the span are
/// labelled `name = value`.
pub fn force_plot(
    path: impl AsRef<Path>,
    base_value: f64,
    shap_row: &[f64],
    feature_values: &[f64],
    feature_names: &[String],
) -> Result<()> {
    let path = path.as_ref();
    if shap_row.len() != feature_names.len() || feature_values.len() != feature_names.len() {
        return Err(StackwiseError::ShapeError {
            expected: format!("{} values per feature", feature_names.len()),
            actual: format!(
                "{} shap values, {} feature values",
                shap_row.len(),
                feature_values.len()
            ),
        });
    }

    let output = base_value + shap_row.iter().sum::<f64>();
    let segments = force_segments(base_value, shap_row);

    let lo = segments
        .iter()
        .map(|s| s.start)
        .chain([base_value, output])
        .fold(f64::INFINITY, f64::min);
    let hi = segments
        .iter()
        .map(|s| s.end)
        .chain([base_value, output])
        .fold(f64::NEG_INFINITY, f64::max);
    let pad = ((hi - lo) * 0.08).max(0.05);
    let span = (hi - lo).max(1e-9);

    let root = BitMapBackend::new(path, (1200, 320)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("base value {:.3}   f(x) = {:.3}", base_value, output),
            ("sans-serif", 18),
        )
        .margin(20)
        .x_label_area_size(40)
        .build_cartesian_2d((lo - pad)..(hi + pad), 0.0f64..1.0)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .disable_y_axis()
        .x_desc("model output (log-odds)")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(segments.iter().map(|s| {
            let color = if s.positive { PUSH_UP } else { PUSH_DOWN };
            Rectangle::new([(s.start, 0.55), (s.end, 0.75)], color.mix(0.85).filled())
        }))
        .map_err(plot_err)?;

    chart
        .draw_series(segments.iter().map(|s| {
            Rectangle::new([(s.start, 0.55), (s.end, 0.75)], WHITE.stroke_width(1))
        }))
        .map_err(plot_err)?;

    for (x, label) in [(base_value, "base value"), (output, "f(x)")] {
        chart
            .draw_series(LineSeries::new(vec![(x, 0.45), (x, 0.85)], BLACK.stroke_width(2)))
            .map_err(plot_err)?;
        chart
            .draw_series(std::iter::once(Text::new(
                label.to_string(),
                (x, 0.92),
                ("sans-serif", 14).into_font(),
            )))
            .map_err(plot_err)?;
    }

    let labelled = segments
        .iter()
        .filter(|s| (s.end - s.start).abs() / span >= 0.03)
        .enumerate()
        .map(|(i, s)| {
            let y = if i % 2 == 0 { 0.40 } else { 0.25 };
            let color = if s.positive { PUSH_UP } else { PUSH_DOWN };
            Text::new(
                format!(
                    "{} = {:.3}",
                    feature_names[s.feature], feature_values[s.feature]
                ),
                ((s.start + s.end) / 2.0, y),
                ("sans-serif", 13).into_font().color(&color),
            )
        });
    chart.draw_series(labelled).map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    debug!(path = %path.display(), segments = segments.len(), "wrote shap force plot");
    Ok(())
}
