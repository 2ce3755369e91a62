//! Scoring adapter for trained ensembles

use nba_longevity_core::{PipelineError, Predictor, Record};
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info};

use crate::errors::TrainerError;
use crate::matrix::FeatureMatrix;
use crate::model::BoostedModel;

/// Canonical [`Predictor`] adapter
#[derive(Debug, Clone)]
pub struct GbdtPredictor {
    model: BoostedModel,
}

impl GbdtPredictor {
    pub fn new(model: BoostedModel) -> Self {
        Self { model }
    }

    /// Load and verify a model directory.
    pub fn load(dir: &Path) -> Result<Self, TrainerError> {
        BoostedModel::load(dir).map(Self::new)
    }

    pub fn model(&self) -> &BoostedModel {
        &self.model
    }

    /// Fails unless `feature_columns` names exactly the model's features.
    /// Order does not matter: values are read by name in model order.
    pub fn check_columns(&self, feature_columns: &[String]) -> Result<(), TrainerError> {
        let expected = self.model.feature_columns();
        let missing: Vec<String> = expected
            .iter()
            .filter(|c| !feature_columns.contains(*c))
            .cloned()
            .collect();
        let unexpected: Vec<String> = feature_columns
            .iter()
            .filter(|c| !expected.contains(*c))
            .cloned()
            .collect();

        if missing.is_empty() && unexpected.is_empty() {
            Ok(())
        } else {
            Err(TrainerError::FeatureMismatch {
                missing,
                unexpected,
            })
        }
    }

    pub fn score(&self, rows: &[Record], feature_columns: &[String]) -> Result<Vec<f64>, TrainerError> {
        self.check_columns(feature_columns)?;
        let matrix = FeatureMatrix::from_records(rows, self.model.feature_columns())?;

        let proba: Vec<f64> = (0..matrix.n_rows())
            .into_par_iter()
            .map(|row| self.model.predict_proba(matrix.row(row)))
            .collect();

        debug!(rows = proba.len(), "rows scored");
        Ok(proba)
    }
}

impl Predictor for GbdtPredictor {
    fn predict_proba(&self, rows: &[Record], feature_columns: &[String]) -> nba_longevity_core::Result<Vec<f64>> {
        info!(rows = rows.len(), kind = %self.model.kind, "Scoring rows");
        self.score(rows, feature_columns).map_err(|err| match err {
            mismatch @ TrainerError::FeatureMismatch { .. } => PipelineError::from(mismatch),
            other => PipelineError::Prediction(other.to_string()),
        })
    }
}
