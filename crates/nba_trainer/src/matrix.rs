//! Dense feature matrix built from feature-selected records

use nba_longevity_core::{Record, Value};

use crate::errors::TrainerError;

/// Row-major `f64` matrix. Missing cells are stored as `NaN` and always
/// route to the right child of a split.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    values: Vec<f64>,
    n_rows: usize,
    n_features: usize,
}

impl FeatureMatrix {
    pub fn from_records(rows: &[Record], columns: &[String]) -> Result<Self, TrainerError> {
        let mut values = Vec::with_capacity(rows.len() * columns.len());
        for (index, row) in rows.iter().enumerate() {
            for column in columns {
                let cell = match row.get(column) {
                    Some(Value::Number(n)) => *n,
                    Some(Value::Missing) => f64::NAN,
                    Some(Value::Text(text)) => {
                        return Err(TrainerError::Dataset(format!(
                            "row {index}: column {column} holds text {text:?}"
                        )))
                    }
                    None => {
                        return Err(TrainerError::Dataset(format!(
                            "row {index}: column {column} is absent"
                        )))
                    }
                };
                values.push(cell);
            }
        }
        Ok(Self {
            values,
            n_rows: rows.len(),
            n_features: columns.len(),
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn row(&self, index: usize) -> &[f64] {
        let start = index * self.n_features;
        &self.values[start..start + self.n_features]
    }

    pub fn get(&self, row: usize, feature: usize) -> f64 {
        self.values[row * self.n_features + feature]
    }
}

/// Binary labels from the target column; anything but 0 or 1 is rejected.
pub fn labels(rows: &[Record], target_column: &str) -> Result<Vec<f64>, TrainerError> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| match row.number(target_column) {
            Some(label) if label == 0.0 || label == 1.0 => Ok(label),
            Some(label) => Err(TrainerError::Dataset(format!(
                "row {index}: {target_column} = {label} is not a binary label"
            ))),
            None => Err(TrainerError::Dataset(format!(
                "row {index}: {target_column} is missing"
            ))),
        })
        .collect()
}
