//! Error types for the longevity pipeline core

use thiserror::Error;

/// Errors raised by dataset loaders and pipeline stages.
///
/// Every variant is fatal for the pipeline run; stages never retry.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The dataset source could not be read or parsed
    #[error("failed to load dataset from {origin}: {reason}")]
    Load { origin: String, reason: String },

    /// Required columns are absent at a given stage
    #[error("schema mismatch in {stage}: missing columns [{}]", .missing.join(", "))]
    SchemaMismatch {
        stage: &'static str,
        missing: Vec<String>,
    },

    /// A column expected to be numeric holds text
    #[error("type mismatch in {stage}: column {column} holds non-numeric value {value:?}")]
    TypeMismatch {
        stage: &'static str,
        column: String,
        value: String,
    },

    /// An unrecognised selector reached the pipeline (feature space, model type, backend)
    #[error("unsupported {kind}: {value:?}")]
    UnsupportedConfig { kind: &'static str, value: String },

    /// Invalid parameter value
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Trainer adapter failure
    #[error("training failed: {0}")]
    Training(String),

    /// Predictor adapter failure
    #[error("prediction failed: {0}")]
    Prediction(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader/writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Columnar engine error
    #[error("frame engine error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Schema mismatch with the missing names sorted for stable messages.
    pub fn schema_mismatch<I, S>(stage: &'static str, missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut missing: Vec<String> = missing.into_iter().map(Into::into).collect();
        missing.sort();
        missing.dedup();
        Self::SchemaMismatch { stage, missing }
    }

    /// Names of the missing columns if this is a schema mismatch.
    pub fn missing_columns(&self) -> Option<&[String]> {
        match self {
            Self::SchemaMismatch { missing, .. } => Some(missing),
            _ => None,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
