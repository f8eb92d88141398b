use crate::constants::{EMPTY_NAME_PLACEHOLDER, SYNTHETIC_NAME_PREFIX};
use crate::error::{CleanerError, Result};
use crate::types::{Anomaly, Disposition};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::io::Read;
use tracing::warn;

static NAME_SANITIZER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("header sanitizer pattern"));

/// Everything one reconciliation pass produces: the resolved header, the
/// rectangular rows, and the repairs that were needed to get there.
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub anomalies: Vec<Anomaly>,
    /// Data records the reader yielded, including errored ones. Physically
    /// blank lines never become records, so they are not counted.
    pub rows_read: usize,
}

/// Make a raw header cell usable as a column name: every character outside
/// `[A-Za-z0-9_]` becomes `_`, a leading digit gets a `_` prefix, and a name
/// that sanitizes down to nothing becomes `_empty_`.
pub fn sanitize_name(raw: &str) -> String {
    let cleaned = NAME_SANITIZER.replace_all(raw, "_").into_owned();
    if cleaned.is_empty() {
        return EMPTY_NAME_PLACEHOLDER.to_string();
    }
    if cleaned.as_bytes()[0].is_ascii_digit() {
        format!("_{}", cleaned)
    } else {
        cleaned
    }
}

/// Trim a data field and collapse embedded line breaks: `\n` becomes a
/// single space, `\r` is removed.
fn clean_field(raw: &str) -> String {
    raw.trim().replace('\n', " ").replace('\r', "")
}

/// First occurrence keeps its bare name; later collisions gain `_2`, `_3`, …
/// suffixes, bumping further if the suffixed name itself already exists.
fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        match seen.get(&name).copied() {
            None => {
                seen.insert(name.clone(), 1);
                out.push(name);
            }
            Some(count) => {
                let mut n = count + 1;
                let mut candidate = format!("{}_{}", name, n);
                while seen.contains_key(&candidate) {
                    n += 1;
                    candidate = format!("{}_{}", name, n);
                }
                warn!("Duplicate column name '{}' renamed to '{}'", name, candidate);
                seen.insert(name, n);
                seen.insert(candidate.clone(), 1);
                out.push(candidate);
            }
        }
    }
    out
}

/// Turn the raw header record into exactly `expected_width` unique, sanitized
/// column names. Renames apply to the raw names before sanitizing.
pub fn resolve_header(
    raw_header: Vec<String>,
    expected_width: usize,
    renames: &[(String, String)],
) -> Vec<String> {
    let mut names = raw_header;
    if names.len() < expected_width {
        warn!(
            "Header has {} columns, expected {}. Appending synthetic names.",
            names.len(),
            expected_width
        );
        for i in names.len()..expected_width {
            names.push(format!("{}{}", SYNTHETIC_NAME_PREFIX, i + 1));
        }
    } else if names.len() > expected_width {
        warn!(
            "Header has {} columns, expected {}. Truncating.",
            names.len(),
            expected_width
        );
        names.truncate(expected_width);
    }
    for name in names.iter_mut() {
        if let Some((_, to)) = renames.iter().find(|(from, _)| from == name) {
            *name = to.clone();
        }
    }
    dedup_names(names.iter().map(|n| sanitize_name(n)).collect())
}

/// Read one CSV source and reconcile every data row to `expected_width`
/// fields. Quote-aware: quoted fields may contain commas and newlines.
/// Only physically blank lines are dropped (the reader never yields them);
/// a row that parses to a single empty field is padded like any narrow row.
pub fn reconcile<R: Read>(
    input: R,
    expected_width: usize,
    renames: &[(String, String)],
) -> Result<ReconcileOutcome> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);
    let mut records = reader.records();

    let raw_header = match records.next() {
        Some(record) => record?,
        None => return Err(CleanerError::MissingHeader),
    };
    let header = resolve_header(
        raw_header.iter().map(|s| s.to_string()).collect(),
        expected_width,
        renames,
    );

    let mut rows = Vec::new();
    let mut anomalies = Vec::new();
    let mut rows_read = 0;

    for (idx, record) in records.enumerate() {
        let ordinal = idx + 1;
        rows_read += 1;

        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!("Row {} could not be read: {}", ordinal, err);
                anomalies.push(Anomaly {
                    ordinal,
                    raw_width: 0,
                    disposition: Disposition::Error,
                    raw: err.to_string(),
                });
                continue;
            }
        };

        let mut fields: Vec<String> = record.iter().map(clean_field).collect();
        let raw_width = fields.len();

        if raw_width > expected_width {
            warn!(
                "Row {} has {} columns. Truncated to {} columns.",
                ordinal, raw_width, expected_width
            );
            anomalies.push(Anomaly {
                ordinal,
                raw_width,
                disposition: Disposition::Truncated,
                raw: record.iter().collect::<Vec<_>>().join(","),
            });
            fields.truncate(expected_width);
        } else if raw_width < expected_width {
            warn!(
                "Row {} has {} columns. Padded to {} columns.",
                ordinal, raw_width, expected_width
            );
            anomalies.push(Anomaly {
                ordinal,
                raw_width,
                disposition: Disposition::Padded,
                raw: record.iter().collect::<Vec<_>>().join(","),
            });
            fields.resize(expected_width, String::new());
        }

        rows.push(fields);
    }

    Ok(ReconcileOutcome {
        header,
        rows,
        anomalies,
        rows_read,
    })
}
