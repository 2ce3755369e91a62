//! Logging initialization
//!
//! One console layer at the configured level and one plain file layer
//! at DEBUG under the logs directory. Called once from `main`.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{InfraConfig, LogFormat};

/// File sink name inside `paths.logs_dir`
pub const LOG_FILE_NAME: &str = "nba_longevity.log";

/// Console filter: `RUST_LOG` wins, then `--verbose`, then the config level.
pub fn console_filter(config: &InfraConfig, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose {
            "debug"
        } else {
            config.runtime.log_level.directive()
        };
        EnvFilter::new(level)
    })
}

fn open_log_file(config: &InfraConfig) -> Result<File> {
    let path = config.paths.logs_dir.join(LOG_FILE_NAME);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Install the global subscriber and return the root span carrying the
/// project context. Enter it for the lifetime of the command.
pub fn init_logging(config: &InfraConfig, verbose: bool) -> Result<tracing::Span> {
    let filter = console_filter(config, verbose);

    let console = match config.runtime.log_format {
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
    .with_filter(filter);

    let file = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(open_log_file(config)?))
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(tracing::info_span!(
        "nba_longevity",
        project = %config.project.name,
        environment = ?config.project.environment,
    ))
}
