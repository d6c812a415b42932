//! `store-forecast` command line entry point

mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sales_forecast::output::{read_predictions, write_accuracy_report};
use sales_forecast::{pipeline, AccuracyEvaluator, PipelineConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "store-forecast")]
#[command(about = "Per-store, per-product daily sales forecasting", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit every entity and write predictions, components, accuracy and failures
    Forecast {
        /// FeatureTable CSV
        #[arg(short, long)]
        features: Option<PathBuf>,

        /// Directory for output artifacts
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Days to forecast past each entity's last observation
        #[arg(long)]
        horizon: Option<usize>,

        /// Threads for the entity loop
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Recompute the accuracy report from an existing predictions file
    Accuracy {
        /// Predictions CSV
        #[arg(short, long)]
        predictions: PathBuf,

        /// Report path (defaults to the configured output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.json_logs);

    let mut config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Forecast {
            features,
            output_dir,
            horizon,
            workers,
        } => {
            if let Some(path) = features {
                config.features_path = path;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(days) = horizon {
                config.horizon_days = days;
            }
            if let Some(n) = workers {
                config.workers = n;
            }

            let summary = pipeline::run(&config).context("forecast run failed")?;
            println!(
                "{} entities: {} forecast, {} failed; {} prediction rows written to {}",
                summary.entities,
                summary.succeeded,
                summary.failed,
                summary.prediction_rows,
                config.output_dir.display()
            );
            if let Some(accuracy) = summary.accuracy {
                print!("{}", accuracy);
            }
        }
        Commands::Accuracy {
            predictions,
            output,
        } => {
            let records = read_predictions(&predictions)
                .with_context(|| format!("reading {}", predictions.display()))?;
            let summary = AccuracyEvaluator::evaluate(&records)?;

            let target = output.unwrap_or_else(|| config.accuracy_path());
            if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            write_accuracy_report(&target, &summary)?;
            info!(path = %target.display(), "accuracy report written");
            print!("{}", summary);
        }
    }

    Ok(())
}
