//! NBA Longevity trainer - deterministic boosted trees
//!
//! Provides the [`Trainer`](nba_longevity_core::Trainer) and
//! [`Predictor`](nba_longevity_core::Predictor) adapters: second-order
//! gradient boosting with depth-wise or oblivious trees, hash-verified
//! model persistence and the classification metrics used to evaluate
//! a model on its validation rows.

pub mod cart;
pub mod errors;
pub mod matrix;
pub mod metrics;
pub mod model;
pub mod oblivious;
pub mod predictor;
pub mod trainer;

pub use errors::TrainerError;
pub use metrics::{ClassificationMetrics, ConfusionMatrix, DEFAULT_THRESHOLD};
pub use model::{BoostedModel, BoostedTree, BoosterKind, ModelMetadata, HASH_FILE, MODEL_FILE};
pub use predictor::GbdtPredictor;
pub use trainer::{GbdtTrainer, TrainingParams};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
