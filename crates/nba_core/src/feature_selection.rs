//! Feature selection stage: projection onto a feature space plus target
//!
//! This is the single gate that keeps the training and inference column
//! sets aligned: every requested column is checked before anything is
//! projected. Scoring unlabelled rows uses [`FeatureSelectionStage::features_only`],
//! which leaves the target out.

use tracing::{debug, error, info};

use crate::dataset::{column_union, BoxedDataset, Dataset, RecordSet};
use crate::errors::{PipelineError, Result};
use crate::feature_spaces::FeatureSpace;
use crate::observer::{notify, ObserverHandle, StageReport};
use crate::ports::FeatureSelector;
use crate::record::Record;

const STAGE: &str = "feature_selection";

/// Canonical feature selection adapter
#[derive(Clone)]
pub struct FeatureSelectionStage {
    feature_space: FeatureSpace,
    include_target: bool,
    observer: Option<ObserverHandle>,
}

impl Default for FeatureSelectionStage {
    fn default() -> Self {
        Self::new(FeatureSpace::default())
    }
}

impl FeatureSelectionStage {
    pub fn new(feature_space: FeatureSpace) -> Self {
        info!(
            space = feature_space.name(),
            features = feature_space.len(),
            "Feature selection configured"
        );
        debug!(columns = ?feature_space.columns(), "selected feature space");
        Self {
            feature_space,
            include_target: true,
            observer: None,
        }
    }

    /// Selection stage over the default (extended) space unless one is given.
    pub fn with_space(feature_space: Option<FeatureSpace>) -> Self {
        Self::new(feature_space.unwrap_or_default())
    }

    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Project the feature columns only; the target need not exist.
    pub fn features_only(mut self) -> Self {
        self.include_target = false;
        self
    }

    pub fn feature_space(&self) -> &FeatureSpace {
        &self.feature_space
    }

    /// Output columns in order.
    pub fn output_columns(&self) -> Vec<String> {
        if self.include_target {
            self.feature_space.selected_columns()
        } else {
            self.feature_space.columns().to_vec()
        }
    }
}

impl FeatureSelector for FeatureSelectionStage {
    fn select_features(&self, dataset: &dyn Dataset) -> Result<BoxedDataset> {
        info!("Starting feature selection");

        let rows = dataset.collect_rows();
        let selected = self.output_columns();
        if rows.is_empty() {
            debug!("no rows to select from");
            notify(
                self.observer.as_ref(),
                StageReport {
                    stage: STAGE,
                    rows_in: 0,
                    rows_out: 0,
                    columns_out: selected.len(),
                },
            );
            return Ok(RecordSet::new(rows).boxed());
        }
        let present = column_union(&rows);

        let missing: Vec<&String> = selected
            .iter()
            .filter(|column| !present.contains(*column))
            .collect();
        if !missing.is_empty() {
            error!(?missing, space = self.feature_space.name(), "columns missing for selection");
            return Err(PipelineError::schema_mismatch(
                STAGE,
                missing.into_iter().cloned(),
            ));
        }

        let projected: Vec<Record> = rows.iter().map(|row| row.project(&selected)).collect();

        info!(
            rows = projected.len(),
            features = self.feature_space.len(),
            with_target = self.include_target,
            "Selected feature columns"
        );
        notify(
            self.observer.as_ref(),
            StageReport {
                stage: STAGE,
                rows_in: rows.len(),
                rows_out: projected.len(),
                columns_out: selected.len(),
            },
        );

        Ok(RecordSet::new(projected).boxed())
    }
}
