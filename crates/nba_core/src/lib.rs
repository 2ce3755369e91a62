//! NBA Longevity core - engine-agnostic feature pipeline
//!
//! Loads raw player statistics, cleans them, derives business metrics,
//! projects onto a declared feature space and splits the result for
//! training. Stages talk to each other only through the [`Dataset`]
//! trait, so the same code runs over the `polars` frame backend and the
//! partitioned backend.

pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod feature_engineering;
pub mod feature_selection;
pub mod feature_spaces;
pub mod frame;
pub mod observer;
pub mod partitioned;
pub mod ports;
pub mod preprocessing;
pub mod record;
pub mod schema;
pub mod split;

pub use dataset::{column_union, BoxedDataset, Dataset, RecordSet};
pub use deterministic::LcgRng;
pub use errors::{PipelineError, Result};
pub use feature_engineering::{FeatureEngineeringStage, DERIVATIONS, EPSILON};
pub use feature_selection::FeatureSelectionStage;
pub use feature_spaces::{
    FeatureSpace, FeatureSpaceKind, FEATURE_SPACE_EXTENDED, FEATURE_SPACE_MINIMAL,
};
pub use frame::{CsvFrameLoader, FrameDataset};
pub use observer::{ObserverHandle, RecordingObserver, StageObserver, StageReport, TracingObserver};
pub use partitioned::{PartitionedCsvLoader, PartitionedDataset};
pub use ports::{DatasetLoader, FeatureEngineer, FeatureSelector, Predictor, Preprocessor, Trainer};
pub use preprocessing::PreprocessingStage;
pub use record::{Record, Value};
pub use schema::{DERIVED_COLUMNS, ID_COLUMN, MINUTES_COLUMN, NUMERIC_COLUMNS, TARGET_COLUMN};
pub use split::StratifiedSplit;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
