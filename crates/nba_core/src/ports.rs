//! Domain ports
//!
//! Stages consume and return [`Dataset`]s; trainers and predictors
//! consume materialized, feature-selected rows. No port exposes the
//! engine behind a dataset.

use crate::dataset::{BoxedDataset, Dataset};
use crate::errors::Result;
use crate::record::Record;

/// Loads raw rows from an external source.
pub trait DatasetLoader {
    fn load(&self) -> Result<BoxedDataset>;
}

/// Type coercion, imputation and degenerate-row filtering.
pub trait Preprocessor {
    fn preprocess(&self, dataset: &dyn Dataset) -> Result<BoxedDataset>;
}

/// Appends derived columns, never removes or renames existing ones.
pub trait FeatureEngineer {
    fn add_features(&self, dataset: &dyn Dataset) -> Result<BoxedDataset>;
}

/// Projects onto a feature space plus the target column.
pub trait FeatureSelector {
    fn select_features(&self, dataset: &dyn Dataset) -> Result<BoxedDataset>;
}

/// Fits a model on feature-selected rows.
pub trait Trainer {
    type Params;
    type Model;

    fn train(
        &self,
        train_rows: &[Record],
        valid_rows: &[Record],
        feature_columns: &[String],
        target_column: &str,
        params: &Self::Params,
    ) -> Result<Self::Model>;
}

/// Scores feature-selected rows with a fitted model.
pub trait Predictor {
    /// Probability of the positive class for each row, in `[0, 1]`.
    fn predict_proba(&self, rows: &[Record], feature_columns: &[String]) -> Result<Vec<f64>>;
}
