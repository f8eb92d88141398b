use crate::constants::ALL_EMPTY_SENTINEL;
use crate::types::{Cell, Column, Table};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, warn};

/// Candidate formats tried in order when a date rule does not configure its
/// own. US-style forms come first because that is what the exports emit.
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
];

/// Declarative per-column coercion policy, resolved by column name.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercionRule {
    /// Base-10 integer. With `zero_fill`, unparseable or empty values become
    /// `0`; without it they become unset and render blank.
    Integer { zero_fill: bool },
    /// Decimal float; unparseable values become unset.
    Float,
    /// Decimal float, but a column the parse leaves entirely blank is filled
    /// with the `#NUM!` placeholder like a categorical column.
    FloatOrPlaceholder,
    /// Date or datetime via candidate formats.
    Date(DateRule),
    /// Pass-through, but an entirely-empty column is filled with the
    /// `#NUM!` placeholder so spreadsheet tools keep the column visible.
    Categorical,
    /// Wrap non-empty values in a fixed prefix/suffix, e.g. `="…"` so a
    /// spreadsheet keeps a long identifier textual.
    FixedPrefix { prefix: String, suffix: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateRule {
    pub formats: Vec<String>,
    /// Remove the whole row when the value cannot be parsed (or is empty)
    pub drop_on_invalid: bool,
}

impl Default for DateRule {
    fn default() -> Self {
        DateRule {
            formats: DEFAULT_DATE_FORMATS.iter().map(|s| s.to_string()).collect(),
            drop_on_invalid: false,
        }
    }
}

/// Counts from one coercion pass over a table.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CoercionReport {
    /// Non-empty cells that failed their rule and degraded to unset/zero
    pub cell_failures: usize,
    /// Rows removed by drop-on-invalid dates or the all-blank post-pass
    pub rows_dropped: usize,
    /// Categorical columns replaced wholesale by the placeholder
    pub placeholder_columns: usize,
}

/// Apply every bound column rule in schema order, then remove rows whose
/// every cell is blank. Each failure degrades a single cell; nothing here
/// aborts the run.
pub fn apply_rules(table: &mut Table) -> CoercionReport {
    let mut report = CoercionReport::default();
    let columns: Vec<Column> = table.schema.columns().to_vec();
    for column in &columns {
        match &column.rule {
            None => continue,
            Some(CoercionRule::Integer { zero_fill }) => {
                coerce_integers(table, column, *zero_fill, &mut report)
            }
            Some(CoercionRule::Float) => coerce_floats(table, column, &mut report),
            Some(CoercionRule::FloatOrPlaceholder) => {
                coerce_floats(table, column, &mut report);
                fill_placeholder(table, column, &mut report);
            }
            Some(CoercionRule::Date(rule)) => coerce_dates(table, column, rule, &mut report),
            Some(CoercionRule::Categorical) => fill_placeholder(table, column, &mut report),
            Some(CoercionRule::FixedPrefix { prefix, suffix }) => {
                wrap_fixed_prefix(table, column, prefix, suffix)
            }
        }
    }

    let before = table.rows.len();
    table.rows.retain(|row| row.iter().any(|cell| !cell.is_blank()));
    let blank_rows = before - table.rows.len();
    if blank_rows > 0 {
        debug!("Removed {} all-blank rows", blank_rows);
        report.rows_dropped += blank_rows;
    }
    report
}

fn coerce_integers(table: &mut Table, column: &Column, zero_fill: bool, report: &mut CoercionReport) {
    for row in table.rows.iter_mut() {
        let cell = &mut row[column.position];
        let Cell::Text(raw) = cell else { continue };
        if raw.is_empty() {
            *cell = if zero_fill { Cell::Int(0) } else { Cell::Unset };
            continue;
        }
        if let Ok(n) = raw.parse::<i64>() {
            *cell = Cell::Int(n);
            continue;
        }
        // Zero-fill columns take numeric-looking values like "1.7" the way a
        // spreadsheet would, truncating toward zero.
        if zero_fill {
            if let Ok(x) = raw.parse::<f64>() {
                *cell = Cell::Int(x as i64);
                continue;
            }
        }
        warn!("Column '{}' value '{}' is not an integer", column.name, raw);
        report.cell_failures += 1;
        *cell = if zero_fill { Cell::Int(0) } else { Cell::Unset };
    }
}

fn coerce_floats(table: &mut Table, column: &Column, report: &mut CoercionReport) {
    for row in table.rows.iter_mut() {
        let cell = &mut row[column.position];
        let Cell::Text(raw) = cell else { continue };
        if raw.is_empty() {
            *cell = Cell::Unset;
            continue;
        }
        // f64 parsing accepts the literal "NaN"; degrade it to unset so it
        // renders blank like any other unparseable value.
        match raw.parse::<f64>() {
            Ok(x) if !x.is_nan() => *cell = Cell::Float(x),
            _ => {
                warn!("Column '{}' value '{}' is not a number", column.name, raw);
                report.cell_failures += 1;
                *cell = Cell::Unset;
            }
        }
    }
}

fn coerce_dates(table: &mut Table, column: &Column, rule: &DateRule, report: &mut CoercionReport) {
    let mut drop = vec![false; table.rows.len()];
    let mut drop_count = 0;
    for (i, row) in table.rows.iter_mut().enumerate() {
        let cell = &mut row[column.position];
        let Cell::Text(raw) = cell else { continue };
        if raw.is_empty() {
            *cell = Cell::Unset;
            if rule.drop_on_invalid {
                drop[i] = true;
                drop_count += 1;
            }
            continue;
        }
        match parse_temporal(raw, &rule.formats) {
            Some(parsed) => *cell = parsed,
            None => {
                warn!(
                    "Column '{}' value '{}' matched no date format",
                    column.name, raw
                );
                report.cell_failures += 1;
                *cell = Cell::Unset;
                if rule.drop_on_invalid {
                    drop[i] = true;
                    drop_count += 1;
                }
            }
        }
    }
    if drop_count > 0 {
        warn!(
            "Dropping {} rows with no usable '{}' date",
            drop_count, column.name
        );
        let mut idx = 0;
        table.rows.retain(|_| {
            let keep = !drop[idx];
            idx += 1;
            keep
        });
        report.rows_dropped += drop_count;
    }
}

/// Try each candidate as a datetime first so formats carrying time fields
/// yield a DateTime cell, then as a bare date.
fn parse_temporal(raw: &str, formats: &[String]) -> Option<Cell> {
    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Cell::DateTime(dt));
        }
        if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
            return Some(Cell::Date(d));
        }
    }
    None
}

fn fill_placeholder(table: &mut Table, column: &Column, report: &mut CoercionReport) {
    if table.rows.is_empty() {
        return;
    }
    let all_empty = table
        .rows
        .iter()
        .all(|row| row[column.position].is_blank());
    if all_empty {
        debug!(
            "Column '{}' is entirely empty, filling with {}",
            column.name, ALL_EMPTY_SENTINEL
        );
        for row in table.rows.iter_mut() {
            row[column.position] = Cell::Text(ALL_EMPTY_SENTINEL.to_string());
        }
        report.placeholder_columns += 1;
    }
}

fn wrap_fixed_prefix(table: &mut Table, column: &Column, prefix: &str, suffix: &str) {
    for row in table.rows.iter_mut() {
        let cell = &mut row[column.position];
        if let Cell::Text(s) = cell {
            if !s.is_empty() {
                let wrapped = format!("{}{}{}", prefix, s, suffix);
                *s = wrapped;
            }
        }
    }
}
