//! Stratified train/validation split
//!
//! The validation set has `ceil(valid_fraction * n)` rows, allocated
//! across classes by largest remainder so that every class keeps its
//! share up to rounding. Rows keep their original relative order inside
//! each subset.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::deterministic::LcgRng;
use crate::errors::{PipelineError, Result};
use crate::record::Record;
use crate::schema::TARGET_COLUMN;

pub const DEFAULT_VALID_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

/// Stratified split on a label column
#[derive(Debug, Clone)]
pub struct StratifiedSplit {
    pub valid_fraction: f64,
    pub seed: u64,
    pub target_column: String,
}

impl Default for StratifiedSplit {
    fn default() -> Self {
        Self {
            valid_fraction: DEFAULT_VALID_FRACTION,
            seed: DEFAULT_SEED,
            target_column: TARGET_COLUMN.to_string(),
        }
    }
}

impl StratifiedSplit {
    pub fn new(valid_fraction: f64, seed: u64) -> Self {
        Self {
            valid_fraction,
            seed,
            ..Self::default()
        }
    }

    /// Partition `rows` into `(train, valid)`.
    pub fn split(&self, rows: &[Record]) -> Result<(Vec<Record>, Vec<Record>)> {
        if !(self.valid_fraction > 0.0 && self.valid_fraction < 1.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "valid_fraction must be in (0, 1), got {}",
                self.valid_fraction
            )));
        }
        let total = rows.len();
        let n_valid = (self.valid_fraction * total as f64).ceil() as usize;
        if total < 2 || n_valid >= total {
            return Err(PipelineError::InvalidParameter(format!(
                "cannot split {total} rows with valid_fraction {}",
                self.valid_fraction
            )));
        }

        let classes = self.group_by_label(rows)?;
        let quotas = allocate(&classes, n_valid, total);

        let mut rng = LcgRng::new(self.seed);
        let mut in_valid = vec![false; total];
        for ((label, indices), quota) in classes.iter().zip(quotas) {
            let mut shuffled = indices.clone();
            rng.shuffle(&mut shuffled);
            for &index in shuffled.iter().take(quota) {
                in_valid[index] = true;
            }
            debug!(label = *label, rows = indices.len(), valid = quota, "class allocation");
        }

        let mut train = Vec::with_capacity(total - n_valid);
        let mut valid = Vec::with_capacity(n_valid);
        for (row, is_valid) in rows.iter().zip(in_valid) {
            if is_valid {
                valid.push(row.clone());
            } else {
                train.push(row.clone());
            }
        }

        info!(
            train = train.len(),
            valid = valid.len(),
            classes = classes.len(),
            seed = self.seed,
            "Stratified split done"
        );
        Ok((train, valid))
    }

    fn group_by_label(&self, rows: &[Record]) -> Result<BTreeMap<i64, Vec<usize>>> {
        let mut classes: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (index, row) in rows.iter().enumerate() {
            let label = row.number(&self.target_column).ok_or_else(|| {
                if row.contains(&self.target_column) {
                    PipelineError::InvalidParameter(format!(
                        "row {index} has no numeric {}",
                        self.target_column
                    ))
                } else {
                    PipelineError::schema_mismatch("split", [self.target_column.as_str()])
                }
            })?;
            classes.entry(label as i64).or_default().push(index);
        }
        Ok(classes)
    }
}

/// Largest-remainder allocation of `n_valid` slots over the classes.
fn allocate(classes: &BTreeMap<i64, Vec<usize>>, n_valid: usize, total: usize) -> Vec<usize> {
    let exact: Vec<f64> = classes
        .values()
        .map(|indices| n_valid as f64 * indices.len() as f64 / total as f64)
        .collect();
    let mut quotas: Vec<usize> = exact.iter().map(|q| q.floor() as usize).collect();

    let mut order: Vec<usize> = (0..exact.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });

    let mut remaining = n_valid - quotas.iter().sum::<usize>();
    for class in order {
        if remaining == 0 {
            break;
        }
        let size = classes.values().nth(class).map_or(0, Vec::len);
        if quotas[class] < size {
            quotas[class] += 1;
            remaining -= 1;
        }
    }
    quotas
}
