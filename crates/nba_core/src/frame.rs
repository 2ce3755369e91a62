//! In-process columnar backend over a `polars` DataFrame

use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::dataset::{column_union, BoxedDataset, Dataset, Rows};
use crate::errors::{PipelineError, Result};
use crate::ports::DatasetLoader;
use crate::record::{Record, Value};

/// Rows read on demand from an eager DataFrame
#[derive(Debug, Clone)]
pub struct FrameDataset {
    columns: Vec<Series>,
    height: usize,
}

impl FrameDataset {
    pub fn new(frame: DataFrame) -> Self {
        let columns = frame
            .get_columns()
            .iter()
            .map(|column| column.as_materialized_series().clone())
            .collect();
        Self {
            columns,
            height: frame.height(),
        }
    }

    /// Build a frame from records. Columns holding only numbers or
    /// missing values become `f64`; anything else becomes a string column.
    pub fn from_records(rows: &[Record]) -> Result<Self> {
        let names = column_union(rows);
        let mut columns = Vec::with_capacity(names.len());

        for name in &names {
            let cells: Vec<Option<&Value>> = rows.iter().map(|row| row.get(name)).collect();
            let numeric = cells
                .iter()
                .all(|cell| !matches!(cell, Some(Value::Text(_))));

            let series = if numeric {
                let values: Vec<Option<f64>> = cells
                    .iter()
                    .map(|cell| cell.and_then(|v| v.as_f64()))
                    .collect();
                Series::new(name.as_str().into(), values)
            } else {
                let values: Vec<Option<String>> = cells
                    .iter()
                    .map(|cell| match cell {
                        Some(Value::Missing) | None => None,
                        Some(value) => Some(value.to_string()),
                    })
                    .collect();
                Series::new(name.as_str().into(), values)
            };
            columns.push(series.into_column());
        }

        let frame = DataFrame::new(columns)?;
        Ok(Self::new(frame))
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|s| s.name().to_string()).collect()
    }

    fn record_at(&self, index: usize) -> Record {
        let mut record = Record::with_capacity(self.columns.len());
        for series in &self.columns {
            let value = series.get(index).map(cell_value).unwrap_or(Value::Missing);
            record.insert(series.name().to_string(), value);
        }
        record
    }
}

impl Dataset for FrameDataset {
    fn rows(&self) -> Rows<'_> {
        Box::new((0..self.height).map(move |index| self.record_at(index)))
    }

    fn row_count(&self) -> usize {
        self.height
    }
}

fn cell_value(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Missing,
        AnyValue::Boolean(flag) => Value::Number(if flag { 1.0 } else { 0.0 }),
        AnyValue::String(text) => Value::parse_cell(text),
        AnyValue::StringOwned(text) => Value::parse_cell(text.as_str()),
        other => match other.extract::<f64>() {
            Some(number) if number.is_finite() => Value::Number(number),
            Some(_) => Value::Missing,
            None => Value::Text(other.to_string()),
        },
    }
}

/// Loads a CSV file with a header row into a [`FrameDataset`]
#[derive(Debug, Clone)]
pub struct CsvFrameLoader {
    path: PathBuf,
    infer_schema_length: usize,
}

impl CsvFrameLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            infer_schema_length: 1000,
        }
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_frame(&self) -> PolarsResult<DataFrame> {
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .try_into_reader_with_file_path(Some(self.path.clone()))?
            .finish()
    }
}

impl DatasetLoader for CsvFrameLoader {
    fn load(&self) -> Result<BoxedDataset> {
        info!("Loading CSV dataset from path: {}", self.path.display());

        let frame = self.read_frame().map_err(|err| PipelineError::Load {
            origin: self.path.display().to_string(),
            reason: err.to_string(),
        })?;

        info!(
            rows = frame.height(),
            cols = frame.width(),
            "CSV loaded into frame"
        );
        debug!(columns = ?frame.get_column_names(), "frame schema");

        Ok(Box::new(FrameDataset::new(frame)))
    }
}
