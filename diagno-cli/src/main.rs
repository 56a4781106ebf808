//! Diagno CLI: train symptom models and query predictions from the terminal.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Diagno: symptom-based disease prediction
#[derive(Parser, Debug)]
#[command(name = "diagno", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Synthesize a dataset, train a model and make it current
    Train {
        /// Rows generated per disease
        #[arg(long)]
        samples: Option<usize>,
        /// Synthesis seed (random when omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Skip extended-symptom augmentation
        #[arg(long)]
        no_extended: bool,
    },
    /// Predict diseases from symptoms
    Predict {
        /// Symptom keys or names, e.g. `fever "body ache"`
        #[arg(required = true)]
        symptoms: Vec<String>,
    },
    /// List the symptoms the current model knows
    Symptoms {
        /// Show display names instead of keys
        #[arg(long)]
        formatted: bool,
    },
    /// List diseases with description and severity
    Diseases,
    /// Show metadata for one disease
    Info {
        /// Disease name
        disease: String,
    },
    /// Show metrics of the current model
    Metrics {
        /// Include the confusion matrix and per-class report
        #[arg(long)]
        detailed: bool,
    },
    /// Show holdout accuracy
    Accuracy,
    /// Export the current run's synthesized dataset as CSV
    Dataset {
        /// Destination file
        #[arg(long)]
        out: PathBuf,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Write a default `.diagno/config.toml` into the workspace
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "diagno", "diagno")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "diagno.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let config = diagno_core::load_config(Some(&workspace), cli.config.as_deref(), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    commands::handle_command(cli.command, config, &workspace).await
}
