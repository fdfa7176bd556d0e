//! Report export module
//!
//! Renders explanation results to shareable documents:
//! - LIME local explanation as a self-contained HTML page

mod lime_html;

pub use lime_html::LimeHtmlReport;
