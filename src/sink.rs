use crate::error::{CleanerError, Result};
use crate::types::Table;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// How a sink treats an existing destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    Overwrite,
    Append,
}

/// Proof of a completed write: where the table landed, how many rows, and a
/// checksum of the exact bytes produced.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SinkReceipt {
    pub destination: String,
    pub rows: usize,
    pub sha256: String,
}

/// Destination contract for a finished table. The write is all or nothing:
/// a sink either lands the complete table under the logical name or leaves
/// the destination untouched. Typed cells arrive rendered canonically
/// (ISO dates, plain decimals), so destinations may auto-detect column types
/// from the data itself.
pub trait TableSink {
    fn write(&mut self, table: &Table, name: &str, mode: SinkMode) -> Result<SinkReceipt>;
}

/// Render a table as an always-quoted CSV document, header row first.
pub fn encode_csv(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(table.schema.names())?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.render()))?;
    }
    writer.into_inner().map_err(|e| {
        CleanerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    })
}

fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Local CSV artifact sink. Bytes are staged to a hidden temp file in the
/// output directory and promoted with an atomic rename, so readers never see
/// a partially written artifact.
pub struct CsvFileSink {
    output_dir: PathBuf,
    /// Temp file path for staging
    temp_path: Option<PathBuf>,
    /// Final file path
    final_path: Option<PathBuf>,
    /// True once the final file has been promoted
    committed: bool,
}

impl CsvFileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        CsvFileSink {
            output_dir: output_dir.into(),
            temp_path: None,
            final_path: None,
            committed: false,
        }
    }

    fn stage(&mut self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let filename = format!("{}.csv", name);
        let final_path = self.output_dir.join(&filename);
        let temp_path = self.output_dir.join(format!(".{}.tmp", filename));

        debug!(
            "Staging CSV artifact: {} (temp: {})",
            final_path.display(),
            temp_path.display()
        );
        fs::write(&temp_path, bytes)?;

        self.temp_path = Some(temp_path);
        self.final_path = Some(final_path.clone());
        self.committed = false;
        Ok(final_path)
    }

    fn commit(&mut self) -> Result<()> {
        if let (Some(temp_path), Some(final_path)) = (&self.temp_path, &self.final_path) {
            fs::rename(temp_path, final_path)?;
            info!("Committed CSV artifact: {}", final_path.display());
            self.committed = true;
        }
        self.temp_path = None;
        Ok(())
    }

    pub fn rollback(&mut self) {
        if let Some(temp_path) = &self.temp_path {
            if temp_path.exists() {
                let _ = fs::remove_file(temp_path);
                warn!("Rolled back CSV temp file: {}", temp_path.display());
            }
        }
        self.temp_path = None;
        self.final_path = None;
        self.committed = false;
    }
}

impl TableSink for CsvFileSink {
    fn write(&mut self, table: &Table, name: &str, mode: SinkMode) -> Result<SinkReceipt> {
        if mode == SinkMode::Append {
            return Err(CleanerError::SinkFailure {
                table: name.to_string(),
                message: "append mode is not supported for CSV artifacts".to_string(),
            });
        }
        let bytes = encode_csv(table)?;
        let sha256 = checksum(&bytes);
        let destination = self.stage(name, &bytes)?;
        if let Err(err) = self.commit() {
            self.rollback();
            return Err(err);
        }
        Ok(SinkReceipt {
            destination: destination.display().to_string(),
            rows: table.len(),
            sha256,
        })
    }
}

impl Drop for CsvFileSink {
    fn drop(&mut self) {
        // Cleanup temp file if we didn't finish properly
        if let Some(temp_path) = &self.temp_path {
            if temp_path.exists() {
                let _ = fs::remove_file(temp_path);
                warn!("Cleaned up orphaned temp file: {}", temp_path.display());
            }
        }
    }
}

/// A table captured by [`MemorySink`], rendered the way a file sink would
/// render it.
#[derive(Debug, Clone)]
pub struct CapturedTable {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub tables: Vec<CapturedTable>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableSink for MemorySink {
    fn write(&mut self, table: &Table, name: &str, _mode: SinkMode) -> Result<SinkReceipt> {
        let bytes = encode_csv(table)?;
        self.tables.push(CapturedTable {
            name: name.to_string(),
            header: table.schema.names().iter().map(|s| s.to_string()).collect(),
            rows: table
                .rows
                .iter()
                .map(|row| row.iter().map(|cell| cell.render()).collect())
                .collect(),
        });
        Ok(SinkReceipt {
            destination: format!("memory:{}", name),
            rows: table.len(),
            sha256: checksum(&bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cell, Schema, Table};
    use std::collections::BTreeMap;

    fn sample_table() -> Table {
        let schema = Schema::new(
            vec!["a".to_string(), "b".to_string()],
            &BTreeMap::new(),
        );
        Table {
            schema,
            rows: vec![
                vec![Cell::Int(1), Cell::Text("x y".to_string())],
                vec![Cell::Float(2.5), Cell::Unset],
            ],
        }
    }

    #[test]
    fn test_encode_quotes_every_field() {
        let bytes = encode_csv(&sample_table()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "\"a\",\"b\"\n\"1\",\"x y\"\n\"2.5\",\"\"\n");
    }

    #[test]
    fn test_write_creates_artifact_and_no_temp_remains() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvFileSink::new(dir.path());
        let receipt = sink
            .write(&sample_table(), "week1 Exported Orders", SinkMode::Overwrite)
            .unwrap();

        let artifact = dir.path().join("week1 Exported Orders.csv");
        assert!(artifact.exists());
        assert_eq!(receipt.rows, 2);
        assert_eq!(receipt.destination, artifact.display().to_string());

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvFileSink::new(dir.path());
        let first = sink.write(&sample_table(), "t", SinkMode::Overwrite).unwrap();
        let bytes_first = fs::read(dir.path().join("t.csv")).unwrap();
        let second = sink.write(&sample_table(), "t", SinkMode::Overwrite).unwrap();
        let bytes_second = fs::read(dir.path().join("t.csv")).unwrap();
        assert_eq!(bytes_first, bytes_second);
        assert_eq!(first.sha256, second.sha256);
    }

    #[test]
    fn test_append_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvFileSink::new(dir.path());
        let result = sink.write(&sample_table(), "t", SinkMode::Append);
        assert!(matches!(result, Err(CleanerError::SinkFailure { .. })));
        assert!(!dir.path().join("t.csv").exists());
    }

    #[test]
    fn test_rollback_removes_staged_temp() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvFileSink::new(dir.path());
        sink.stage("t", b"partial").unwrap();
        assert!(dir.path().join(".t.csv.tmp").exists());
        sink.rollback();
        assert!(!dir.path().join(".t.csv.tmp").exists());
        assert!(!dir.path().join("t.csv").exists());
    }

    #[test]
    fn test_drop_cleans_up_orphaned_temp() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut sink = CsvFileSink::new(dir.path());
            sink.stage("t", b"partial").unwrap();
        }
        assert!(!dir.path().join(".t.csv.tmp").exists());
    }

    #[test]
    fn test_memory_sink_captures_rendered_rows() {
        let mut sink = MemorySink::new();
        let receipt = sink.write(&sample_table(), "t", SinkMode::Overwrite).unwrap();
        assert_eq!(receipt.destination, "memory:t");
        assert_eq!(sink.tables.len(), 1);
        assert_eq!(sink.tables[0].header, vec!["a", "b"]);
        assert_eq!(sink.tables[0].rows[0], vec!["1", "x y"]);
        assert_eq!(sink.tables[0].rows[1], vec!["2.5", ""]);
    }
}
