//! NBA Longevity CLI - configuration, logging and pipeline wiring
//!
//! Everything the `nba-longevity` binary does lives here so the
//! pipelines can be driven from integration tests without a process.

pub mod config;
pub mod logging;
pub mod pipeline;

pub use config::{InfraConfig, LogFormat, LogLevel};
pub use logging::{init_logging, LOG_FILE_NAME};
pub use pipeline::{
    run_inference, run_training, Backend, InferenceReport, PredictOptions, TrainOptions,
    TrainingReport, METRICS_FILE, MODEL_DIR, PREDICTIONS_FILE, PROBA_COLUMN,
};

use nba_longevity_core::FeatureSpaceKind;
use std::collections::BTreeMap;

/// Registered feature spaces rendered as YAML.
pub fn feature_registry_yaml() -> anyhow::Result<String> {
    let registry: BTreeMap<&str, &[&str]> = FeatureSpaceKind::ALL
        .iter()
        .map(|kind| (kind.name(), kind.columns()))
        .collect();
    Ok(serde_yaml::to_string(&registry)?)
}
