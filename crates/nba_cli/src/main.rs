//! NBA Longevity command line
//!
//! Usage:
//!   nba-longevity train --feature-space extended --model-type depthwise
//!   nba-longevity predict --input data/processed/test.csv
//!   nba-longevity features

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nba_longevity_cli::{
    feature_registry_yaml, init_logging, run_inference, run_training, Backend, InfraConfig,
    PredictOptions, TrainOptions,
};
use nba_longevity_core::FeatureSpace;
use nba_longevity_trainer::{BoosterKind, TrainingParams};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "nba-longevity")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Predict whether an NBA rookie plays at least five seasons", long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/infra.yaml under the repository root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at DEBUG on the console
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model and write it with its validation metrics
    Train {
        #[arg(long, value_enum, default_value_t = Backend::Frame)]
        backend: Backend,

        /// Labelled CSV, split into train and validation rows (defaults to paths.raw_data)
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(long, default_value = "extended")]
        feature_space: String,

        /// depthwise or oblivious
        #[arg(long, default_value = "depthwise")]
        model_type: String,

        #[arg(long)]
        rounds: Option<usize>,

        #[arg(long)]
        learning_rate: Option<f64>,

        #[arg(long)]
        max_depth: Option<usize>,

        #[arg(long, default_value = "0.2")]
        valid_fraction: f64,
    },
    /// Score a CSV with a trained model
    Predict {
        #[arg(long, value_enum, default_value_t = Backend::Frame)]
        backend: Backend,

        /// CSV to score (defaults to paths.test_data)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Model directory (defaults to <artifacts_dir>/model)
        #[arg(short, long)]
        model_dir: Option<PathBuf>,

        /// Predictions CSV (defaults to <artifacts_dir>/predictions.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the registered feature spaces
    Features,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Features = cli.command {
        print!("{}", feature_registry_yaml()?);
        return Ok(());
    }

    let config = InfraConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let span = init_logging(&config, cli.verbose)?;
    let _guard = span.enter();

    info!(version = env!("CARGO_PKG_VERSION"), "NBA longevity pipeline");

    let result = run(cli.command, &config);
    if let Err(err) = &result {
        error!("{err:#}");
    }
    result
}

fn run(command: Command, config: &InfraConfig) -> Result<()> {
    match command {
        Command::Train {
            backend,
            input,
            feature_space,
            model_type,
            rounds,
            learning_rate,
            max_depth,
            valid_fraction,
        } => {
            let kind: BoosterKind = model_type.parse()?;
            let mut params = TrainingParams::for_kind(kind);
            if let Some(rounds) = rounds {
                params.num_rounds = rounds;
            }
            if let Some(learning_rate) = learning_rate {
                params.learning_rate = learning_rate;
            }
            if let Some(max_depth) = max_depth {
                params.max_depth = max_depth;
            }

            let options = TrainOptions {
                backend,
                input,
                feature_space: FeatureSpace::from_name(&feature_space)?,
                params,
                valid_fraction,
            };
            let report = run_training(config, &options)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Predict {
            backend,
            input,
            model_dir,
            output,
        } => {
            let options = PredictOptions {
                backend,
                input,
                model_dir,
                output,
            };
            let report = run_inference(config, &options)?;
            println!("Wrote {} predictions to {}", report.rows, report.output.display());
            if let Some(metrics) = report.metrics {
                println!("AUC: {:.4}  F1: {:.4}", metrics.auc, metrics.f1);
            }
        }
        Command::Features => {}
    }
    Ok(())
}
