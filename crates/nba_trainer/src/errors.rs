use nba_longevity_core::PipelineError;
use thiserror::Error;

/// Errors returned by the boosted-tree trainer and predictor.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("invalid training parameter: {0}")]
    InvalidParameter(String),

    #[error(
        "feature columns differ from the model: missing [{}], unexpected [{}]",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    FeatureMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("model hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<TrainerError> for PipelineError {
    fn from(err: TrainerError) -> Self {
        match err {
            TrainerError::FeatureMismatch {
                missing,
                unexpected,
            } => PipelineError::schema_mismatch("prediction", missing.into_iter().chain(unexpected)),
            TrainerError::InvalidParameter(reason) => PipelineError::InvalidParameter(reason),
            TrainerError::Io(err) => PipelineError::Io(err),
            TrainerError::Serialization(err) => PipelineError::Serialization(err),
            mismatch @ TrainerError::HashMismatch { .. } => PipelineError::Load {
                origin: "model".to_string(),
                reason: mismatch.to_string(),
            },
            other => PipelineError::Training(other.to_string()),
        }
    }
}
