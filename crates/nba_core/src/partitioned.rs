//! Partitioned backend: rows held in independent partitions, streamed
//! one partition at a time.
//!
//! The loader parses partitions in parallel on the rayon pool. That
//! parallelism ends at load time; iteration is sequential and ordered.

use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::dataset::{BoxedDataset, Dataset, Rows};
use crate::errors::{PipelineError, Result};
use crate::ports::DatasetLoader;
use crate::record::{Record, Value};

/// Default number of rows per partition when splitting a single file
pub const DEFAULT_PARTITION_ROWS: usize = 256;

/// Dataset split into ordered partitions
#[derive(Debug, Clone, Default)]
pub struct PartitionedDataset {
    partitions: Vec<Arc<Vec<Record>>>,
}

impl PartitionedDataset {
    pub fn new(partitions: Vec<Vec<Record>>) -> Self {
        Self {
            partitions: partitions.into_iter().map(Arc::new).collect(),
        }
    }

    /// Spread `rows` over partitions of at most `partition_rows` rows.
    pub fn from_rows(rows: Vec<Record>, partition_rows: usize) -> Self {
        let size = partition_rows.max(1);
        let mut partitions = Vec::with_capacity(rows.len() / size + 1);
        let mut current = Vec::with_capacity(size);
        for row in rows {
            current.push(row);
            if current.len() == size {
                partitions.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
            }
        }
        if !current.is_empty() {
            partitions.push(current);
        }
        Self::new(partitions)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

impl Dataset for PartitionedDataset {
    fn rows(&self) -> Rows<'_> {
        Box::new(
            self.partitions
                .iter()
                .flat_map(|partition| partition.iter().cloned()),
        )
    }

    fn row_count(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }
}

/// Loads CSV data into a [`PartitionedDataset`].
///
/// A file path is chunked into partitions of `partition_rows` rows. A
/// directory path treats every `*.csv` file inside it (sorted by name)
/// as one partition; all part files must share the same header.
#[derive(Debug, Clone)]
pub struct PartitionedCsvLoader {
    path: PathBuf,
    partition_rows: usize,
}

impl PartitionedCsvLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            partition_rows: DEFAULT_PARTITION_ROWS,
        }
    }

    pub fn with_partition_rows(mut self, rows: usize) -> Self {
        self.partition_rows = rows.max(1);
        self
    }

    fn load_error(&self, reason: impl ToString) -> PipelineError {
        PipelineError::Load {
            origin: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    fn load_file(&self) -> Result<PartitionedDataset> {
        let (header, raw_rows) = read_raw(&self.path).map_err(|err| self.load_error(err))?;

        let partitions: Vec<Vec<Record>> = raw_rows
            .par_chunks(self.partition_rows)
            .map(|chunk| parse_partition(&header, chunk))
            .collect();

        Ok(PartitionedDataset::new(partitions))
    }

    fn load_directory(&self) -> Result<PartitionedDataset> {
        let mut parts: Vec<PathBuf> = fs::read_dir(&self.path)
            .map_err(|err| self.load_error(err))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
            .collect();
        parts.sort();

        if parts.is_empty() {
            return Err(self.load_error("directory holds no .csv part files"));
        }
        debug!(parts = parts.len(), "reading part files");

        let loaded: Vec<(Vec<String>, Vec<Record>)> = parts
            .par_iter()
            .map(|part| {
                let (header, raw_rows) = read_raw(part).map_err(|err| PipelineError::Load {
                    origin: part.display().to_string(),
                    reason: err.to_string(),
                })?;
                let records = parse_partition(&header, &raw_rows);
                Ok((header, records))
            })
            .collect::<Result<_>>()?;

        let expected = &loaded[0].0;
        if let Some((index, _)) = loaded
            .iter()
            .enumerate()
            .find(|(_, (header, _))| header != expected)
        {
            return Err(self.load_error(format!(
                "part file {} has a different header",
                parts[index].display()
            )));
        }

        Ok(PartitionedDataset::new(
            loaded.into_iter().map(|(_, records)| records).collect(),
        ))
    }
}

impl DatasetLoader for PartitionedCsvLoader {
    fn load(&self) -> Result<BoxedDataset> {
        info!("Loading partitioned CSV dataset from path: {}", self.path.display());

        let dataset = if self.path.is_dir() {
            self.load_directory()?
        } else {
            self.load_file()?
        };

        info!(
            rows = dataset.row_count(),
            partitions = dataset.partition_count(),
            "CSV loaded into partitions"
        );
        Ok(Box::new(dataset))
    }
}

fn read_raw(path: &Path) -> std::result::Result<(Vec<String>, Vec<csv::StringRecord>), csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let header = reader.headers()?.iter().map(str::to_string).collect();
    let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((header, rows))
}

fn parse_partition(header: &[String], rows: &[csv::StringRecord]) -> Vec<Record> {
    rows.iter()
        .map(|row| {
            header
                .iter()
                .enumerate()
                .map(|(index, column)| {
                    let value = row.get(index).map_or(Value::Missing, Value::parse_cell);
                    (column.clone(), value)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const BODY: &str = "PlayerName,GamesPlayed,MinutesPerGame,Target5Years\n\
                        Alpha,36,27.4,0\n\
                        Beta,35,NA,1\n\
                        Gamma,74,15.3,1\n";

    #[test]
    fn test_file_is_chunked_into_partitions() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(BODY.as_bytes())?;
        file.flush()?;

        let dataset = PartitionedCsvLoader::new(file.path())
            .with_partition_rows(2)
            .load()?;
        let rows = dataset.collect_rows();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].get("MinutesPerGame"), Some(&Value::Missing));
        assert_eq!(rows[2].get("PlayerName"), Some(&Value::Text("Gamma".into())));
        Ok(())
    }

    #[test]
    fn test_directory_parts_load_in_name_order() -> anyhow::Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("part-00001.csv"),
            "PlayerName,Assists\nSecond,2\n",
        )?;
        fs::write(
            dir.path().join("part-00000.csv"),
            "PlayerName,Assists\nFirst,1\n",
        )?;
        fs::write(dir.path().join("_SUCCESS"), "")?;

        let dataset = PartitionedCsvLoader::new(dir.path()).load()?;
        let names: Vec<String> = dataset
            .rows()
            .filter_map(|row| row.get("PlayerName").map(|v| v.to_string()))
            .collect();

        assert_eq!(names, vec!["First", "Second"]);
        Ok(())
    }

    #[test]
    fn test_mismatched_part_headers_fail() -> anyhow::Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.csv"), "PlayerName,Assists\nA,1\n")?;
        fs::write(dir.path().join("b.csv"), "PlayerName,Steals\nB,1\n")?;

        let result = PartitionedCsvLoader::new(dir.path()).load();
        assert!(matches!(result, Err(PipelineError::Load { .. })));
        Ok(())
    }

    #[test]
    fn test_from_rows_keeps_order_across_partitions() {
        let rows: Vec<Record> = (0..7)
            .map(|i| Record::new().with("i", i as f64))
            .collect();
        let dataset = PartitionedDataset::from_rows(rows.clone(), 3);

        assert_eq!(dataset.partition_count(), 3);
        assert_eq!(dataset.collect_rows(), rows);
    }
}
