use crate::anomaly_log::{self, AuditRecord};
use crate::coerce;
use crate::error::{CleanerError, Result};
use crate::profiles::SourceProfile;
use crate::reconcile;
use crate::sink::{SinkMode, TableSink};
use crate::types::{CleaningMode, Disposition, Schema, Table};
use metrics::{counter, histogram};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Result of one complete cleaning run
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub table_name: String,
    pub profile: String,
    pub mode: CleaningMode,
    pub rows_read: usize,
    pub rows_emitted: usize,
    pub padded: usize,
    pub truncated: usize,
    pub errored: usize,
    pub coercion_failures: usize,
    pub rows_dropped: usize,
    pub artifact: Option<String>,
    pub warehouse_table: Option<String>,
}

impl RunReport {
    pub fn anomalies(&self) -> usize {
        self.padded + self.truncated + self.errored
    }

    /// The one human-readable summary every run prints, success or not.
    pub fn print_summary(&self) {
        println!(
            "📊 Summary for '{}' ({}, {} mode):",
            self.table_name, self.profile, self.mode
        );
        println!("   Rows read:         {}", self.rows_read);
        println!("   Rows emitted:      {}", self.rows_emitted);
        println!("   Padded:            {}", self.padded);
        println!("   Truncated:         {}", self.truncated);
        println!("   Errored:           {}", self.errored);
        println!("   Coercion failures: {}", self.coercion_failures);
        println!("   Rows dropped:      {}", self.rows_dropped);
        if let Some(artifact) = &self.artifact {
            println!("   Artifact:          {}", artifact);
        }
        if let Some(table) = &self.warehouse_table {
            println!("   Warehouse table:   {}", table);
        }
    }
}

/// Per-run parameters that do not belong to the profile: the logical table
/// name, the resolved failure policy, and where the audit trail goes.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub table_name: String,
    pub mode: CleaningMode,
    pub anomaly_log: Option<PathBuf>,
}

/// Open a source file and run the full cleaning pipeline on it.
pub fn clean_file(
    profile: &SourceProfile,
    input: &Path,
    options: &RunOptions,
    artifact: &mut dyn TableSink,
    warehouse: Option<&mut dyn TableSink>,
) -> Result<RunReport> {
    let file = File::open(input).map_err(|e| CleanerError::SourceUnavailable {
        path: input.display().to_string(),
        source: e,
    })?;
    clean_source(profile, file, options, artifact, warehouse)
}

/// Run the pipeline on an open source: reconcile rows to the profile's
/// width, audit and gate the anomalies, coerce column types, then hand the
/// finished table to the sinks.
#[instrument(
    skip(profile, input, options, artifact, warehouse),
    fields(profile = %profile.name, table = %options.table_name)
)]
pub fn clean_source<R: Read>(
    profile: &SourceProfile,
    input: R,
    options: &RunOptions,
    artifact: &mut dyn TableSink,
    warehouse: Option<&mut dyn TableSink>,
) -> Result<RunReport> {
    let run_id = Uuid::new_v4();
    info!(%run_id, "🚀 Starting clean of '{}' with profile '{}'", options.table_name, profile.name);
    println!(
        "🚀 Cleaning '{}' with profile '{}' ({} mode)",
        options.table_name, profile.name, options.mode
    );
    counter!("cleaner_runs_total", "profile" => profile.name.clone()).increment(1);
    let t_run = std::time::Instant::now();

    // Step 1: reconcile raw rows to the expected width
    let outcome = reconcile::reconcile(input, profile.expected_columns, &profile.renames)?;
    let padded = count_disposition(&outcome.anomalies, Disposition::Padded);
    let truncated = count_disposition(&outcome.anomalies, Disposition::Truncated);
    let errored = count_disposition(&outcome.anomalies, Disposition::Error);

    let mut report = RunReport {
        table_name: options.table_name.clone(),
        profile: profile.name.clone(),
        mode: options.mode,
        rows_read: outcome.rows_read,
        rows_emitted: outcome.rows.len(),
        padded,
        truncated,
        errored,
        coercion_failures: 0,
        rows_dropped: 0,
        artifact: None,
        warehouse_table: None,
    };

    info!(
        "✅ Reconciled {} rows ({} padded, {} truncated, {} errored)",
        report.rows_emitted, padded, truncated, errored
    );
    println!(
        "✅ Reconciled {} rows ({} padded, {} truncated, {} errored)",
        report.rows_emitted, padded, truncated, errored
    );
    histogram!("cleaner_rows_per_run", "profile" => profile.name.clone())
        .record(report.rows_emitted as f64);
    for anomaly in &outcome.anomalies {
        counter!(
            "cleaner_anomalies_total",
            "profile" => profile.name.clone(),
            "disposition" => anomaly.disposition.to_string()
        )
        .increment(1);
    }

    // Step 2: audit the anomalies before the failure gate so a strict abort
    // still leaves the trail behind
    if let Some(log_path) = &options.anomaly_log {
        let records: Vec<AuditRecord> = outcome
            .anomalies
            .iter()
            .map(|a| {
                AuditRecord::from_anomaly(&options.table_name, run_id, profile.expected_columns, a)
            })
            .collect();
        if let Err(e) = anomaly_log::append_all(log_path, &records) {
            warn!("Failed to write anomaly audit log: {}", e);
        }
    }

    // Step 3: failure policy
    if options.mode == CleaningMode::Strict && !outcome.anomalies.is_empty() {
        let anomalies = outcome.anomalies.len();
        let error_percent = if outcome.rows_read > 0 {
            anomalies as f64 / outcome.rows_read as f64 * 100.0
        } else {
            0.0
        };
        report.print_summary();
        let err = CleanerError::AggregateAnomalyExceeded {
            total_rows: outcome.rows_read,
            anomalies,
            max_allowed: 0,
            error_percent,
        };
        error!("❌ {}", err);
        println!("❌ {}", err);
        return Err(err);
    }
    if !outcome.anomalies.is_empty() {
        warn!(
            "⚠️ {} rows required repair, writing them through (lenient mode)",
            outcome.anomalies.len()
        );
    }

    // Step 4: coerce column types
    println!("🔧 Coercing column types...");
    let schema = Schema::new(outcome.header, &profile.rules);
    let mut table = Table::from_rows(schema, outcome.rows);
    let coercion = coerce::apply_rules(&mut table);
    report.coercion_failures = coercion.cell_failures;
    report.rows_dropped = coercion.rows_dropped;
    report.rows_emitted = table.len();
    if coercion.cell_failures > 0 {
        counter!("cleaner_coercion_failures_total", "profile" => profile.name.clone())
            .increment(coercion.cell_failures as u64);
    }
    info!(
        "✅ Coerced table: {} rows remain ({} cell failures, {} rows dropped)",
        table.len(),
        coercion.cell_failures,
        coercion.rows_dropped
    );

    // Step 5: write the local artifact
    let receipt = match artifact.write(&table, &options.table_name, SinkMode::Overwrite) {
        Ok(receipt) => receipt,
        Err(e) => {
            report.print_summary();
            error!("❌ Failed to write artifact for '{}': {}", options.table_name, e);
            return Err(e);
        }
    };
    info!(%run_id, "💾 Wrote artifact {} ({} rows, sha256 {})", receipt.destination, receipt.rows, receipt.sha256);
    println!("💾 Wrote artifact {}", receipt.destination);
    report.artifact = Some(receipt.destination.clone());

    // Step 6: optional warehouse load; the artifact stays either way
    if let Some(warehouse) = warehouse {
        println!("📡 Loading '{}' into the warehouse...", options.table_name);
        match warehouse.write(&table, &options.table_name, SinkMode::Overwrite) {
            Ok(receipt) => {
                info!("✅ Warehouse load complete: {}", receipt.destination);
                println!("✅ Warehouse load complete: {}", receipt.destination);
                report.warehouse_table = Some(receipt.destination);
            }
            Err(e) => {
                report.print_summary();
                error!("❌ Warehouse load failed: {} (artifact retained)", e);
                println!("❌ Warehouse load failed: {} (artifact retained)", e);
                return Err(e);
            }
        }
    }

    let run_secs = t_run.elapsed().as_secs_f64();
    histogram!("cleaner_run_duration_seconds", "profile" => profile.name.clone()).record(run_secs);

    report.print_summary();
    info!(%run_id, "✅ Finished '{}' in {:.2}s", options.table_name, run_secs);
    Ok(report)
}

fn count_disposition(anomalies: &[crate::types::Anomaly], disposition: Disposition) -> usize {
    anomalies
        .iter()
        .filter(|a| a.disposition == disposition)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, SinkReceipt};

    fn options(mode: CleaningMode) -> RunOptions {
        RunOptions {
            table_name: "test_table".to_string(),
            mode,
            anomaly_log: None,
        }
    }

    fn narrow_profile(mode: CleaningMode) -> SourceProfile {
        SourceProfile::new("test-profile", 3, mode)
    }

    struct FailingSink;

    impl TableSink for FailingSink {
        fn write(&mut self, _: &Table, name: &str, _: SinkMode) -> Result<SinkReceipt> {
            Err(CleanerError::SinkFailure {
                table: name.to_string(),
                message: "boom".to_string(),
            })
        }
    }

    #[test]
    fn test_lenient_run_writes_repaired_rows() {
        let input = "a,b,c\n1,2,3\n4,5\n6,7,8,9\n";
        let mut sink = MemorySink::new();
        let report = clean_source(
            &narrow_profile(CleaningMode::Lenient),
            input.as_bytes(),
            &options(CleaningMode::Lenient),
            &mut sink,
            None,
        )
        .unwrap();

        assert_eq!(report.rows_read, 3);
        assert_eq!(report.rows_emitted, 3);
        assert_eq!(report.padded, 1);
        assert_eq!(report.truncated, 1);
        assert_eq!(report.anomalies(), 2);
        assert_eq!(sink.tables.len(), 1);
        assert_eq!(sink.tables[0].rows[1], vec!["4", "5", ""]);
        assert_eq!(sink.tables[0].rows[2], vec!["6", "7", "8"]);
    }

    #[test]
    fn test_strict_run_aborts_without_writing() {
        let input = "a,b,c\n1,2\n";
        let mut sink = MemorySink::new();
        let result = clean_source(
            &narrow_profile(CleaningMode::Strict),
            input.as_bytes(),
            &options(CleaningMode::Strict),
            &mut sink,
            None,
        );

        match result {
            Err(CleanerError::AggregateAnomalyExceeded {
                total_rows,
                anomalies,
                max_allowed,
                ..
            }) => {
                assert_eq!(total_rows, 1);
                assert_eq!(anomalies, 1);
                assert_eq!(max_allowed, 0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(sink.tables.is_empty());
    }

    #[test]
    fn test_strict_run_with_clean_input_succeeds() {
        let input = "a,b,c\n1,2,3\n";
        let mut sink = MemorySink::new();
        let report = clean_source(
            &narrow_profile(CleaningMode::Strict),
            input.as_bytes(),
            &options(CleaningMode::Strict),
            &mut sink,
            None,
        )
        .unwrap();
        assert_eq!(report.anomalies(), 0);
        assert_eq!(sink.tables.len(), 1);
    }

    #[test]
    fn test_strict_abort_still_writes_audit_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("anomalies.ndjson");
        let mut opts = options(CleaningMode::Strict);
        opts.anomaly_log = Some(log_path.clone());

        let input = "a,b,c\n1,2\n";
        let mut sink = MemorySink::new();
        let result = clean_source(
            &narrow_profile(CleaningMode::Strict),
            input.as_bytes(),
            &opts,
            &mut sink,
            None,
        );

        assert!(result.is_err());
        let content = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("\"padded\""));
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let mut sink = MemorySink::new();
        let result = clean_file(
            &narrow_profile(CleaningMode::Lenient),
            Path::new("/nonexistent/input.csv"),
            &options(CleaningMode::Lenient),
            &mut sink,
            None,
        );
        assert!(matches!(
            result,
            Err(CleanerError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_warehouse_failure_retains_artifact() {
        let input = "a,b,c\n1,2,3\n";
        let mut artifact = MemorySink::new();
        let mut warehouse = FailingSink;
        let result = clean_source(
            &narrow_profile(CleaningMode::Lenient),
            input.as_bytes(),
            &options(CleaningMode::Lenient),
            &mut artifact,
            Some(&mut warehouse),
        );

        assert!(matches!(result, Err(CleanerError::SinkFailure { .. })));
        assert_eq!(artifact.tables.len(), 1);
    }
}
