//! Engine-agnostic dataset abstraction
//!
//! A [`Dataset`] only knows how to hand out its rows. Loaders pick the
//! concrete backend ([`FrameDataset`](crate::frame::FrameDataset),
//! [`PartitionedDataset`](crate::partitioned::PartitionedDataset) or an
//! in-memory [`RecordSet`]) and nothing downstream branches on it.

use std::sync::Arc;

use crate::record::Record;

/// Iterator over the rows of a dataset
pub type Rows<'a> = Box<dyn Iterator<Item = Record> + 'a>;

/// A finite sequence of records.
///
/// Every call to [`Dataset::rows`] starts a fresh pass from the first row.
pub trait Dataset: Send + Sync {
    fn rows(&self) -> Rows<'_>;

    /// Materialize every row.
    fn collect_rows(&self) -> Vec<Record> {
        self.rows().collect()
    }

    /// Row count. Backends that know it without iterating override this.
    fn row_count(&self) -> usize {
        self.rows().count()
    }
}

/// Owned, type-erased dataset handed between stages
pub type BoxedDataset = Box<dyn Dataset>;

/// Materialized rows kept in memory.
///
/// Stages that need whole-column statistics collect their input and
/// re-wrap the result in a `RecordSet`.
#[derive(Debug, Clone)]
pub struct RecordSet {
    rows: Arc<[Record]>,
}

impl RecordSet {
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows: rows.into() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.rows
    }

    pub fn boxed(self) -> BoxedDataset {
        Box::new(self)
    }
}

impl Dataset for RecordSet {
    fn rows(&self) -> Rows<'_> {
        Box::new(self.rows.iter().cloned())
    }

    fn collect_rows(&self) -> Vec<Record> {
        self.rows.to_vec()
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl Default for RecordSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(rows: Vec<Record>) -> Self {
        Self::new(rows)
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Ordered union of the column names seen across `rows`.
pub fn column_union<'a, I>(rows: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for column in row.columns() {
            if !columns.iter().any(|known| known == column) {
                columns.push(column.to_string());
            }
        }
    }
    columns
}
