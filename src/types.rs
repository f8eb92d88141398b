use crate::coerce::CoercionRule;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// How a run treats rows that needed repair: strict aborts the write on the
/// first anomaly, lenient writes them through and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CleaningMode {
    Strict,
    Lenient,
}

impl std::fmt::Display for CleaningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleaningMode::Strict => write!(f, "strict"),
            CleaningMode::Lenient => write!(f, "lenient"),
        }
    }
}

/// What reconciliation had to do to a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Padded,
    Truncated,
    Error,
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disposition::Padded => write!(f, "padded"),
            Disposition::Truncated => write!(f, "truncated"),
            Disposition::Error => write!(f, "error"),
        }
    }
}

/// One row that required repair during reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    /// 1-based data-row ordinal, header excluded
    pub ordinal: usize,
    /// Field count of the row before repair
    pub raw_width: usize,
    pub disposition: Disposition,
    /// The row as it arrived, or the error description for `error` rows
    pub raw: String,
}

/// A single cell value. Reconciliation produces `Text`; the typed variants
/// are introduced by column rules. `Unset` renders as an empty field.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Unset,
}

impl Cell {
    /// Render the value exactly as it is written into the artifact.
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Int(n) => n.to_string(),
            Cell::Float(x) => format!("{:?}", x),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Cell::Unset => String::new(),
        }
    }

    /// True when the cell carries nothing: unset, or empty text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Unset => true,
            Cell::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// One column of a schema: resolved name, position, and the coercion rule
/// bound to it (if any).
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub position: usize,
    pub rule: Option<CoercionRule>,
}

/// Ordered column definitions for one source file type. Immutable once built.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Bind rules to columns by name. Rules that address a column missing
    /// from the header are dropped with a warning so a drifted export does
    /// not silently coerce the wrong column.
    pub fn new(names: Vec<String>, rules: &BTreeMap<String, CoercionRule>) -> Self {
        for rule_name in rules.keys() {
            if !names.iter().any(|n| n == rule_name) {
                warn!(column = %rule_name, "column rule addresses a column not present in the header");
            }
        }
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(position, name)| {
                let rule = rules.get(&name).cloned();
                Column { name, position, rule }
            })
            .collect();
        Schema { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// A rectangular table: every row holds exactly `schema.len()` cells.
#[derive(Debug, Clone)]
pub struct Table {
    pub schema: Schema,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Wrap reconciled string rows as text cells.
    pub fn from_rows(schema: Schema, rows: Vec<Vec<String>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| {
                debug_assert_eq!(row.len(), schema.len());
                row.into_iter().map(Cell::Text).collect()
            })
            .collect();
        Table { schema, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
