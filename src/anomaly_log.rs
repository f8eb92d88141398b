use crate::error::Result;
use crate::types::{Anomaly, Disposition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// One line of the anomaly audit trail: which table, which run, which row,
/// and what reconciliation did to it.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub table: String,
    pub run_id: Uuid,
    pub row: usize,
    pub raw_width: usize,
    pub expected_width: usize,
    pub disposition: Disposition,
    pub raw: String,
    pub logged_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn from_anomaly(
        table: &str,
        run_id: Uuid,
        expected_width: usize,
        anomaly: &Anomaly,
    ) -> Self {
        AuditRecord {
            table: table.to_string(),
            run_id,
            row: anomaly.ordinal,
            raw_width: anomaly.raw_width,
            expected_width,
            disposition: anomaly.disposition,
            raw: anomaly.raw.clone(),
            logged_at: Utc::now(),
        }
    }
}

/// Append records to the NDJSON audit file: one JSON object per line,
/// created on first use, never rewritten.
pub fn append_all(path: &Path, records: &[AuditRecord]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for record in records {
        let line = serde_json::to_string(record)?;
        writeln!(file, "{}", line)?;
    }
    Ok(())
}
