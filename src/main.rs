//! stackwise - Main Entry Point
//!
//! Trains the stacked classifier, writes its explanations and scores new files.

use clap::Parser;
use stackwise::cli::{cmd_info, cmd_predict, cmd_run, Cli, Commands, RunArgs};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stackwise=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run(args)) => {
            cmd_run(&args)?;
        }
        Some(Commands::Predict { bundle, data }) => {
            cmd_predict(&bundle, &data)?;
        }
        Some(Commands::Info { data }) => {
            cmd_info(&data)?;
        }
        None => {
            // Default: full run with default settings
            cmd_run(&RunArgs::default())?;
        }
    }

    Ok(())
}
