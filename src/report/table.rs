//! Tables built from run results.

use super::schema::ColumnSchema;
use super::unique_label;
use crate::analysis::{DetailStore, RunResult, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// Text shown for a cell with no underlying data.
pub const ABSENT_MARKER: &str = "-";

/// One table cell. `Absent` is distinct from every recorded value,
/// including zero and empty sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Value(Value),
    Absent,
}

impl Cell {
    pub fn is_absent(&self) -> bool {
        matches!(self, Cell::Absent)
    }
}

impl From<Option<&Value>> for Cell {
    fn from(value: Option<&Value>) -> Self {
        value.map_or(Cell::Absent, |v| Cell::Value(v.clone()))
    }
}

/// A recorded string equal to [`ABSENT_MARKER`] is quoted, so text output
/// never shows data as absence.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Value(Value::Str(s)) if s == ABSENT_MARKER => write!(f, "{:?}", s),
            Cell::Value(v) => write!(f, "{}", v),
            Cell::Absent => f.write_str(ABSENT_MARKER),
        }
    }
}

/// Recorded values are never JSON `null`, so `null` marks absence.
impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Value(v) => v.serialize(serializer),
            Cell::Absent => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub title: String,
    pub key_label: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Cell at the given row key and column label.
    pub fn cell(&self, key: &str, column: &str) -> Option<&Cell> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.iter().find(|r| r.key == key)?.cells.get(col)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// `{"title": ..., "columns": [...], "rows": [{"<key label>": key, "<column>": cell, ...}]}`
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct RowView<'t> {
            table: &'t Table,
            row: &'t Row,
        }

        impl Serialize for RowView<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.row.cells.len() + 1))?;
                map.serialize_entry(&self.table.key_label, &self.row.key)?;
                for (column, cell) in self.table.columns.iter().zip(&self.row.cells) {
                    map.serialize_entry(column, cell)?;
                }
                map.end()
            }
        }

        let rows: Vec<RowView<'_>> = self.rows.iter().map(|row| RowView { table: self, row }).collect();
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("title", &self.title)?;
        map.serialize_entry("columns", &self.columns)?;
        map.serialize_entry("rows", &rows)?;
        map.end()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                std::iter::once(row.key.clone())
                    .chain(row.cells.iter().map(|c| c.to_string()))
                    .collect()
            })
            .collect();

        let header: Vec<&str> = std::iter::once(self.key_label.as_str())
            .chain(self.columns.iter().map(String::as_str))
            .collect();
        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in &rendered {
            for (w, text) in widths.iter_mut().zip(row) {
                *w = (*w).max(text.chars().count());
            }
        }

        writeln!(f, "{}", self.title)?;
        write_line(f, &header, &widths)?;
        let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
        write_line(f, &rule, &widths)?;
        for row in &rendered {
            write_line(f, row, &widths)?;
        }
        Ok(())
    }
}

fn write_line<S: AsRef<str>>(f: &mut fmt::Formatter<'_>, cells: &[S], widths: &[usize]) -> fmt::Result {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(text, &w)| format!("{:<w$}", text.as_ref(), w = w))
        .collect();
    writeln!(f, "{}", padded.join("  ").trim_end())
}

/// Cross-model summary: one row per run, one column per summary field seen
/// in any run, in sorted order.
///
/// Row keys are the model names. A name shared by several runs gets a `#n`
/// suffix on its later rows.
pub fn summary_table(runs: &[RunResult]) -> Table {
    let columns: BTreeSet<&str> = runs
        .iter()
        .flat_map(|run| run.summary.keys().map(String::as_str))
        .collect();
    let columns: Vec<String> = columns.into_iter().map(str::to_string).collect();

    let mut rows: Vec<Row> = Vec::with_capacity(runs.len());
    for run in runs {
        let taken: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        let key = unique_label(&run.model, &taken[..]);
        if key != run.model {
            tracing::warn!(model = %run.model, renamed = %key, "duplicate model name in summary");
        }
        rows.push(Row {
            key,
            cells: columns.iter().map(|c| Cell::from(run.summary.get(c))).collect(),
        });
    }

    Table {
        title: "summary".to_string(),
        key_label: "model".to_string(),
        columns,
        rows,
    }
}

/// Detail fields present in the store that no column of the schema reads.
pub fn uncovered_fields(details: &DetailStore, schema: &ColumnSchema) -> BTreeSet<String> {
    let covered = schema.covered_fields();
    details
        .field_names()
        .into_iter()
        .filter(|f| !covered.contains(f))
        .map(str::to_string)
        .collect()
}

/// Per-node table of one run: one row per visited operator application, in
/// visitation order, one cell per declared column.
///
/// Recorded fields the schema does not cover are reported as a warning and
/// left out of the table.
pub fn detail_table(run: &RunResult, schema: &ColumnSchema) -> Table {
    let uncovered = uncovered_fields(&run.details, schema);
    if !uncovered.is_empty() {
        tracing::warn!(
            model = %run.model,
            fields = ?uncovered,
            "recorded fields not covered by the column schema"
        );
    }

    let rows = run
        .details
        .iter()
        .map(|(node, details)| Row {
            key: node.to_string(),
            cells: schema
                .columns()
                .iter()
                .map(|c| Cell::from(c.path.resolve(details)))
                .collect(),
        })
        .collect();

    Table {
        title: run.model.clone(),
        key_label: "node".to_string(),
        columns: schema.columns().iter().map(|c| c.label.clone()).collect(),
        rows,
    }
}
