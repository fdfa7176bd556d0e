//! stackwise CLI Module
//!
//! Command-line interface for training, explaining and batch scoring.

use clap::{Args, Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::inference::{BatchOutput, BatchPredictor, InferenceBundle};
use crate::pipeline::{Pipeline, PipelineReport};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

/// Print a multi-line block indented under the current section
fn indented(block: &str) {
    for line in block.lines() {
        println!("  {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "stackwise")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stacked gradient-boosting classifier with SHAP and LIME explanations")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train, evaluate and explain the model, then score a file
    Run(RunArgs),

    /// Score a file with a saved inference bundle
    Predict {
        /// Bundle written by `run --save-bundle`
        #[arg(short, long)]
        bundle: PathBuf,

        /// CSV file to score
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Show data information
    Info {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,
    },
}

/// Options of the `run` command. Flags override values from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Training data file [default: dataset.csv]
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Binary target column [default: target_variable]
    #[arg(short, long)]
    pub target: Option<String>,

    /// Identifier column [default: id]
    #[arg(long)]
    pub id: Option<String>,

    /// CSV file to score after training; prompted for when absent
    #[arg(short, long)]
    pub predict: Option<PathBuf>,

    /// Directory for plots and reports [default: .]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// JSON pipeline configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the fitted scaler and model to this JSON file
    #[arg(long)]
    pub save_bundle: Option<PathBuf>,

    /// Stop after the explanations without scoring a file
    #[arg(long)]
    pub skip_predict: bool,

    /// Do not render PNG plots
    #[arg(long)]
    pub no_plots: bool,
}

impl RunArgs {
    /// Configuration file values (or defaults) overridden by the given flags
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(data) = &self.data {
            config.data_path = data.clone();
        }
        if let Some(target) = &self.target {
            config.target_column = target.clone();
        }
        if let Some(id) = &self.id {
            config.id_column = id.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.no_plots {
            config.render_plots = false;
        }
        config.validate()?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(args: &RunArgs) -> anyhow::Result<()> {
    let config = args.pipeline_config()?;

    section("Train");
    println!("  {}", kv("Data   ", &config.data_path.display().to_string()));
    println!("  {}", kv("Target ", &config.target_column));
    println!();

    step_run("Training stacked model and computing explanations");
    let start = Instant::now();
    let report = Pipeline::new(config.clone()).run()?;
    step_done(&format!(
        "{} train / {} test rows in {:?}",
        report.n_train,
        report.n_test,
        start.elapsed()
    ));

    print_report(&report);

    if let Some(path) = &args.save_bundle {
        report.bundle.save(path)?;
        step_ok(&format!("bundle saved → {}", path.display()));
    }

    if args.skip_predict {
        println!();
        return Ok(());
    }

    let input = match &args.predict {
        Some(path) => path.clone(),
        None => prompt_prediction_file()?,
    };
    score_file(&report.bundle, &input)?;

    println!();
    Ok(())
}

pub fn cmd_predict(bundle_path: &Path, data_path: &Path) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading bundle");
    let bundle = InferenceBundle::load(bundle_path)?;
    step_done(&format!(
        "{} features, v{}",
        bundle.feature_names.len(),
        bundle.version
    ));

    score_file(&bundle, data_path)?;
    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = DataLoader::new().load_auto(data_path)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}

// ─── Output ────────────────────────────────────────────────────────────────────

fn print_report(report: &PipelineReport) {
    section("Classification Report");
    indented(&report.classification_report.to_string());

    section("Feature Importance");
    for importance in &report.feature_importances {
        println!("  {}", importance);
    }

    let local = &report.local;
    section(&format!("Explained Row  ·  test #{}  ·  id {}", local.test_index, local.instance_id));
    indented(&local.row.to_string());
    println!();
    println!("  {}", kv("P(class 1)    ", &format!("{:.4}", local.probability)));
    println!("  {}", kv("SHAP base     ", &format!("{:.4}", local.expected_value)));

    section("SHAP Interpretation");
    if local.sentences.is_empty() {
        println!("  {}", dim("no feature passed the attribution threshold"));
    }
    for sentence in &local.sentences {
        println!("  {}", sentence);
    }

    section("LIME Surrogate");
    println!("  {}", kv("Local fit R²  ", &format!("{:.4}", local.lime.score)));
    for (condition, weight) in &local.lime.weights {
        let value = format!("{:+.4}", weight);
        let value = if *weight >= 0.0 { value.truecolor(255, 127, 14) } else { value.truecolor(31, 119, 180) };
        println!("  {:<32} {}", condition, value);
    }

    section("Artifacts");
    for path in &report.artifacts {
        step_ok(&path.display().to_string());
    }
}

fn score_file(bundle: &InferenceBundle, input: &Path) -> anyhow::Result<BatchOutput> {
    section("Batch Predictions");

    step_run(&format!("Scoring {}", input.display()));
    let start = Instant::now();
    let output = BatchPredictor::new(bundle).predict_file(input)?;
    step_done(&format!("{} rows in {:?}", output.n_rows(), start.elapsed()));
    step_ok(&format!("saved → {}", output.output_path.display()));

    println!();
    let preview: DataFrame = output.preview(&bundle.id_column, 5)?;
    indented(&preview.to_string());
    Ok(output)
}

fn prompt_prediction_file() -> anyhow::Result<PathBuf> {
    use dialoguer::{theme::ColorfulTheme, Input};

    let theme = ColorfulTheme {
        prompt_prefix: dialoguer::console::style("  ?".to_string()).for_stderr().color256(111),
        prompt_style: dialoguer::console::Style::new().for_stderr().white().bold(),
        ..ColorfulTheme::default()
    };

    println!();
    let name: String = Input::with_theme(&theme)
        .with_prompt("CSV file to score (e.g. new_data.csv)")
        .interact_text()?;
    Ok(PathBuf::from(name.trim()))
}
