//! Feature engineering stage: derived business metrics
//!
//! Every derivation is row-local and deterministic. The stage appends
//! columns and never filters, removes or renames anything.

use tracing::{debug, info};

use crate::dataset::{BoxedDataset, Dataset, RecordSet};
use crate::errors::{PipelineError, Result};
use crate::observer::{notify, ObserverHandle, StageReport};
use crate::ports::FeatureEngineer;
use crate::record::{Record, Value};

const STAGE: &str = "feature_engineering";

/// Added to every denominator
pub const EPSILON: f64 = 1e-6;

/// How a derived column is computed from two raw columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    /// `lhs / (rhs + EPSILON)`
    Ratio,
    /// `lhs + rhs`
    Sum,
}

/// One derived column definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivation {
    pub name: &'static str,
    pub lhs: &'static str,
    pub rhs: &'static str,
    pub combine: Combine,
}

impl Derivation {
    const fn ratio(name: &'static str, lhs: &'static str, rhs: &'static str) -> Self {
        Self { name, lhs, rhs, combine: Combine::Ratio }
    }

    const fn sum(name: &'static str, lhs: &'static str, rhs: &'static str) -> Self {
        Self { name, lhs, rhs, combine: Combine::Sum }
    }

    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self.combine {
            Combine::Ratio => lhs / (rhs + EPSILON),
            Combine::Sum => lhs + rhs,
        }
    }
}

/// Usage, efficiency and collective-impact metrics, in output order
pub const DERIVATIONS: [Derivation; 7] = [
    Derivation::ratio("PointsPerMinute", "PointsPerGame", "MinutesPerGame"),
    Derivation::ratio("FieldGoalEfficiency", "FieldGoalsMade", "FieldGoalsAttempted"),
    Derivation::ratio("ThreePointRate", "ThreePointersAttempted", "FieldGoalsAttempted"),
    Derivation::ratio("FreeThrowRate", "FreeThrowsAttempted", "MinutesPerGame"),
    Derivation::ratio("AssistToTurnoverRatio", "Assists", "Turnovers"),
    Derivation::ratio("ReboundRate", "TotalRebounds", "MinutesPerGame"),
    Derivation::sum("DefensiveImpact", "Steals", "Blocks"),
];

/// Raw columns the derivations read, deduplicated, in first-use order
pub fn required_columns() -> Vec<&'static str> {
    let mut required = Vec::new();
    for derivation in &DERIVATIONS {
        for column in [derivation.lhs, derivation.rhs] {
            if !required.contains(&column) {
                required.push(column);
            }
        }
    }
    required
}

/// Canonical feature engineering adapter
#[derive(Clone, Default)]
pub struct FeatureEngineeringStage {
    observer: Option<ObserverHandle>,
}

impl FeatureEngineeringStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Append the derived columns to one row.
    pub fn derive(&self, row: &mut Record) -> Result<()> {
        let missing: Vec<&str> = required_columns()
            .into_iter()
            .filter(|column| !row.contains(column))
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::schema_mismatch(STAGE, missing));
        }

        for derivation in &DERIVATIONS {
            let lhs = operand(row, derivation.lhs)?;
            let rhs = operand(row, derivation.rhs)?;
            let value = match (lhs, rhs) {
                (Some(lhs), Some(rhs)) => Value::Number(derivation.apply(lhs, rhs)),
                _ => Value::Missing,
            };
            row.insert(derivation.name, value);
        }
        Ok(())
    }
}

/// Numeric operand; missing propagates, text is a type error.
fn operand(row: &Record, column: &str) -> Result<Option<f64>> {
    match row.get(column) {
        Some(Value::Number(n)) => Ok(Some(*n)),
        Some(Value::Text(text)) => Err(PipelineError::TypeMismatch {
            stage: STAGE,
            column: column.to_string(),
            value: text.clone(),
        }),
        Some(Value::Missing) | None => Ok(None),
    }
}

impl FeatureEngineer for FeatureEngineeringStage {
    fn add_features(&self, dataset: &dyn Dataset) -> Result<BoxedDataset> {
        info!("Starting feature engineering");

        let rows: Vec<Record> = dataset
            .rows()
            .map(|mut row| {
                self.derive(&mut row)?;
                Ok(row)
            })
            .collect::<Result<_>>()?;

        debug!(
            derived = ?DERIVATIONS.iter().map(|d| d.name).collect::<Vec<_>>(),
            "derived columns appended"
        );
        info!(rows = rows.len(), "Feature engineering finished");

        notify(
            self.observer.as_ref(),
            StageReport {
                stage: STAGE,
                rows_in: rows.len(),
                rows_out: rows.len(),
                columns_out: rows.first().map_or(0, Record::len),
            },
        );

        Ok(RecordSet::new(rows).boxed())
    }
}
