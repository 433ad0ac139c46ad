//! Declared columns of a per-node detail table.

use crate::analysis::passes::{INDEX, INPUT_SHAPES, OP, OUTPUT_SHAPE};
use super::unique_label;
use crate::analysis::{NodeDetails, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Where a column's value lives: a detail field, optionally followed by an
/// index into the field's sequence or map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnPath {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl ColumnPath {
    pub fn field(field: &str) -> Self {
        Self { field: field.to_string(), index: None }
    }

    pub fn indexed(field: &str, index: usize) -> Self {
        Self { field: field.to_string(), index: Some(index) }
    }

    /// Resolves the path against one node's details. Any missing step
    /// yields `None`.
    pub fn resolve<'d>(&self, details: &'d NodeDetails) -> Option<&'d Value> {
        let value = details.get(&self.field)?;
        match self.index {
            Some(i) => value.at(i),
            None => Some(value),
        }
    }
}

impl fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}[{}]", self.field, i),
            None => f.write_str(&self.field),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub path: ColumnPath,
    pub label: String,
}

/// Ordered, duplicate-free list of columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Column>", into = "Vec<Column>")]
pub struct ColumnSchema {
    columns: Vec<Column>,
}

impl ColumnSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column. A path that is already present keeps its first
    /// position and label. A label already used by another path gets a
    /// `#n` suffix, so labels stay unique keys of the JSON rows.
    pub fn push(&mut self, path: ColumnPath, label: &str) {
        if self.columns.iter().any(|c| c.path == path) {
            tracing::debug!(%path, "duplicate column ignored");
            return;
        }
        let taken: Vec<&str> = self.columns.iter().map(|c| c.label.as_str()).collect();
        let unique = unique_label(label, &taken[..]);
        if unique != label {
            tracing::warn!(%path, label, renamed = %unique, "duplicate column label renamed");
        }
        self.columns.push(Column { path, label: unique });
    }

    pub fn with(mut self, field: &str, label: &str) -> Self {
        self.push(ColumnPath::field(field), label);
        self
    }

    pub fn with_index(mut self, field: &str, index: usize, label: &str) -> Self {
        self.push(ColumnPath::indexed(field, index), label);
        self
    }

    /// Columns for the standard pass set: visit index, operator, output
    /// shape, the first `arity` argument shapes and the given attributes.
    pub fn standard<S: AsRef<str>>(arity: usize, attributes: &[S]) -> Self {
        let mut schema = Self::new()
            .with(INDEX, "#")
            .with(OP, "op")
            .with(OUTPUT_SHAPE, "output shape");
        for i in 0..arity {
            schema = schema.with_index(INPUT_SHAPES, i, &format!("input {}", i));
        }
        for key in attributes {
            schema = schema.with(key.as_ref(), key.as_ref());
        }
        schema
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Detail fields referenced by at least one column.
    pub fn covered_fields(&self) -> BTreeSet<&str> {
        self.columns.iter().map(|c| c.path.field.as_str()).collect()
    }
}

impl From<Vec<Column>> for ColumnSchema {
    fn from(columns: Vec<Column>) -> Self {
        let mut schema = Self::new();
        for column in columns {
            schema.push(column.path, &column.label);
        }
        schema
    }
}

impl From<ColumnSchema> for Vec<Column> {
    fn from(schema: ColumnSchema) -> Self {
        schema.columns
    }
}
