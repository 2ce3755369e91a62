//! Preprocessing stage: numeric coercion, median imputation and
//! degenerate-row filtering.
//!
//! Order is fixed: coerce, impute over every row, then drop rows with a
//! missing target and rows with non-positive minutes. Medians therefore
//! reflect the broadest available sample.
//!
//! In scoring mode ([`PreprocessingStage::for_scoring`]) the target is
//! optional and no row is dropped: every input row gets a prediction.

use tracing::{debug, info, warn};

use crate::dataset::{column_union, BoxedDataset, Dataset, RecordSet};
use crate::errors::{PipelineError, Result};
use crate::observer::{notify, ObserverHandle, StageReport};
use crate::ports::Preprocessor;
use crate::record::{Record, Value};
use crate::schema::{MINUTES_COLUMN, NUMERIC_COLUMNS, TARGET_COLUMN};

const STAGE: &str = "preprocessing";

/// Fill value used when a numeric column has no observed value at all
pub const EMPTY_COLUMN_FILL: f64 = 0.0;

/// Canonical preprocessing adapter
#[derive(Clone)]
pub struct PreprocessingStage {
    numeric_columns: Vec<String>,
    target_column: String,
    minutes_column: String,
    drop_degenerate: bool,
    observer: Option<ObserverHandle>,
}

impl Default for PreprocessingStage {
    fn default() -> Self {
        Self {
            numeric_columns: NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect(),
            target_column: TARGET_COLUMN.to_string(),
            minutes_column: MINUTES_COLUMN.to_string(),
            drop_degenerate: true,
            observer: None,
        }
    }
}

impl PreprocessingStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coerce and impute only. The target column may be absent or blank
    /// and rows are never filtered.
    pub fn for_scoring() -> Self {
        Self {
            drop_degenerate: false,
            ..Self::default()
        }
    }

    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Median of the non-missing values of each numeric column.
    pub fn column_medians(&self, rows: &[Record]) -> Vec<(String, f64)> {
        self.numeric_columns
            .iter()
            .map(|column| {
                let mut observed: Vec<f64> = rows.iter().filter_map(|r| r.number(column)).collect();
                let fill = median(&mut observed).unwrap_or_else(|| {
                    warn!(column = column.as_str(), "no observed values, filling with {EMPTY_COLUMN_FILL}");
                    EMPTY_COLUMN_FILL
                });
                (column.clone(), fill)
            })
            .collect()
    }

    fn check_schema(&self, rows: &[Record]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let present = column_union(rows);
        let target = self.drop_degenerate.then_some(&self.target_column);
        let missing: Vec<&String> = self
            .numeric_columns
            .iter()
            .chain(target)
            .filter(|column| !present.contains(*column))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::schema_mismatch(
                STAGE,
                missing.into_iter().cloned(),
            ))
        }
    }

    fn coerce(&self, row: &mut Record) {
        for column in &self.numeric_columns {
            let coerced = row.get(column).map_or(Value::Missing, Value::coerce_numeric);
            row.insert(column.clone(), coerced);
        }
        let target = row
            .get(&self.target_column)
            .map_or(Value::Missing, Value::coerce_numeric);
        let target = match target {
            Value::Number(label) => Value::Number(label.trunc()),
            other => other,
        };
        row.insert(self.target_column.clone(), target);
    }

    fn keep_minutes(&self, row: &Record) -> bool {
        row.number(&self.minutes_column)
            .is_some_and(|minutes| minutes > 0.0)
    }

    fn keep(&self, row: &Record) -> bool {
        row.number(&self.target_column).is_some() && self.keep_minutes(row)
    }
}

impl Preprocessor for PreprocessingStage {
    fn preprocess(&self, dataset: &dyn Dataset) -> Result<BoxedDataset> {
        info!("Starting preprocessing");

        let mut rows = dataset.collect_rows();
        let rows_in = rows.len();
        self.check_schema(&rows)?;

        for row in &mut rows {
            self.coerce(row);
        }

        let medians = self.column_medians(&rows);
        debug!(?medians, "imputation medians");

        let mut imputed = 0usize;
        for row in &mut rows {
            for (column, fill) in &medians {
                if row.get(column).is_some_and(Value::is_missing) {
                    row.insert(column.clone(), *fill);
                    imputed += 1;
                }
            }
        }

        let mut missing_target = 0usize;
        let mut non_positive_minutes = 0usize;
        if self.drop_degenerate {
            rows.retain(|row| {
                let keep = self.keep(row);
                if !keep {
                    if row.number(&self.target_column).is_none() {
                        missing_target += 1;
                    } else {
                        non_positive_minutes += 1;
                    }
                }
                keep
            });
        } else {
            missing_target = rows
                .iter()
                .filter(|row| row.number(&self.target_column).is_none())
                .count();
            non_positive_minutes = rows.iter().filter(|row| !self.keep_minutes(row)).count();
            if non_positive_minutes > 0 {
                warn!(non_positive_minutes, "scoring rows with non-positive minutes");
            }
        }

        info!(
            rows_in,
            rows_out = rows.len(),
            imputed,
            missing_target,
            non_positive_minutes,
            "Preprocessing finished"
        );

        let columns_out = rows.first().map_or(0, Record::len);
        notify(
            self.observer.as_ref(),
            StageReport {
                stage: STAGE,
                rows_in,
                rows_out: rows.len(),
                columns_out,
            },
        );

        Ok(RecordSet::new(rows).boxed())
    }
}

/// Median of `values`, averaging the two middle values for even counts.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_row(name: &str, minutes: Value, points: Value, target: Value) -> Record {
        let mut row = Record::new().with("PlayerName", name);
        for column in NUMERIC_COLUMNS {
            row.insert(column, 1.0);
        }
        row.insert(MINUTES_COLUMN, minutes);
        row.insert("PointsPerGame", points);
        row.insert(TARGET_COLUMN, target);
        row
    }

    fn run(rows: Vec<Record>) -> Result<Vec<Record>> {
        let input = RecordSet::new(rows);
        Ok(PreprocessingStage::new().preprocess(&input)?.collect_rows())
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_unparseable_values_are_imputed_with_median() -> Result<()> {
        let rows = vec![
            raw_row("a", Value::Number(10.0), Value::Number(4.0), Value::Number(1.0)),
            raw_row("b", Value::Number(20.0), "bad".into(), Value::Number(0.0)),
            raw_row("c", Value::Number(30.0), Value::Number(8.0), Value::Number(1.0)),
            raw_row("d", Value::Number(40.0), Value::Missing, Value::Number(0.0)),
        ];

        let out = run(rows)?;
        assert_eq!(out.len(), 4);
        assert_eq!(out[1].number("PointsPerGame"), Some(6.0));
        assert_eq!(out[3].number("PointsPerGame"), Some(6.0));
        Ok(())
    }

    #[test]
    fn test_drops_missing_target_and_non_positive_minutes() -> Result<()> {
        let rows = vec![
            raw_row("keep", Value::Number(12.0), Value::Number(4.0), Value::Number(1.0)),
            raw_row("no-target", Value::Number(12.0), Value::Number(4.0), Value::Missing),
            raw_row("garbage-target", Value::Number(12.0), Value::Number(4.0), "yes".into()),
            raw_row("zero", Value::Number(0.0), Value::Number(4.0), Value::Number(0.0)),
            raw_row("negative", Value::Number(-3.0), Value::Number(4.0), Value::Number(0.0)),
        ];

        let out = run(rows)?;
        let names: Vec<String> = out
            .iter()
            .filter_map(|r| r.get("PlayerName").map(|v| v.to_string()))
            .collect();
        assert_eq!(names, vec!["keep"]);
        Ok(())
    }

    #[test]
    fn test_imputation_uses_rows_that_are_later_dropped() -> Result<()> {
        // The dropped rows still contribute to the minutes median.
        let rows = vec![
            raw_row("missing-minutes", Value::Missing, Value::Number(1.0), Value::Number(1.0)),
            raw_row("no-target", Value::Number(50.0), Value::Number(1.0), Value::Missing),
            raw_row("zero", Value::Number(0.0), Value::Number(1.0), Value::Number(0.0)),
            raw_row("kept", Value::Number(10.0), Value::Number(1.0), Value::Number(1.0)),
        ];

        let out = run(rows)?;
        // median(50, 0, 10) = 10
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].number(MINUTES_COLUMN), Some(10.0));
        Ok(())
    }

    #[test]
    fn test_target_is_cast_to_integer_and_columns_preserved() -> Result<()> {
        let rows = vec![raw_row("a", Value::Number(10.0), Value::Number(2.0), "1.0".into())];
        let input_columns: Vec<String> = rows[0].columns().map(str::to_string).collect();

        let out = run(rows)?;
        assert_eq!(out[0].number(TARGET_COLUMN), Some(1.0));
        assert_eq!(out[0].columns().collect::<Vec<_>>(), input_columns);
        Ok(())
    }

    #[test]
    fn test_missing_numeric_column_is_schema_mismatch() {
        let row = Record::new()
            .with(MINUTES_COLUMN, 10.0)
            .with(TARGET_COLUMN, 1.0);
        let err = run(vec![row]).unwrap_err();
        let missing = err.missing_columns().unwrap_or_default();
        assert_eq!(missing.len(), NUMERIC_COLUMNS.len() - 1);
        assert!(!missing.contains(&MINUTES_COLUMN.to_string()));
    }

    #[test]
    fn test_no_missing_numeric_values_after_preprocessing() -> Result<()> {
        let rows = vec![
            raw_row("a", Value::Number(10.0), Value::Missing, Value::Number(1.0)),
            raw_row("b", Value::Number(15.0), Value::Missing, Value::Number(0.0)),
        ];
        let out = run(rows)?;
        for row in &out {
            for column in NUMERIC_COLUMNS {
                assert!(row.number(column).is_some(), "{column} left missing");
            }
        }
        // No observed points at all: documented fallback fill.
        assert_eq!(out[0].number("PointsPerGame"), Some(EMPTY_COLUMN_FILL));
        Ok(())
    }

    #[test]
    fn test_scoring_mode_keeps_every_row() -> Result<()> {
        let rows = vec![
            raw_row("labelled", Value::Number(12.0), Value::Number(4.0), Value::Number(1.0)),
            raw_row("blank", Value::Number(12.0), Value::Missing, Value::Missing),
            raw_row("zero", Value::Number(0.0), Value::Number(6.0), Value::Missing),
        ];
        let out = PreprocessingStage::for_scoring()
            .preprocess(&RecordSet::new(rows))?
            .collect_rows();

        assert_eq!(out.len(), 3);
        assert_eq!(out[1].number("PointsPerGame"), Some(5.0));
        assert_eq!(out[0].number(TARGET_COLUMN), Some(1.0));
        assert_eq!(out[1].number(TARGET_COLUMN), None);
        Ok(())
    }

    #[test]
    fn test_scoring_mode_accepts_a_file_without_target() -> Result<()> {
        let mut row = Record::new().with("PlayerName", "a");
        for column in NUMERIC_COLUMNS {
            row.insert(column, 2.0);
        }
        let out = PreprocessingStage::for_scoring()
            .preprocess(&RecordSet::new(vec![row]))?
            .collect_rows();
        assert_eq!(out.len(), 1);

        let mut row = Record::new();
        for column in NUMERIC_COLUMNS {
            row.insert(column, 2.0);
        }
        assert!(run(vec![row]).is_err());
        Ok(())
    }
}
