//! Visualization module: SHAP summary and force plots rendered to PNG.

mod force_plot;
mod summary_plot;

pub use force_plot::{force_plot, force_segments, ForceSegment};
pub use summary_plot::{
    beeswarm_offsets, feature_order, normalized_feature_value, summary_plot, value_color,
    SummaryPlotOptions,
};

use crate::error::StackwiseError;

pub(crate) fn plot_err<E: std::fmt::Display>(err: E) -> StackwiseError {
    StackwiseError::PlotError(err.to_string())
}
