//! # Reports
//!
//! Flattens run results into tables:
//!
//! - [`summary_table`]: one row per model, columns are the sorted union of
//!   every summary field across the runs.
//! - [`detail_table`]: one row per operator application of a single run,
//!   columns declared by a [`ColumnSchema`].
//!
//! Missing data is rendered as [`Cell::Absent`], never as a zero or an
//! empty value.

pub mod schema;
pub mod table;

pub use schema::{Column, ColumnPath, ColumnSchema};
pub use table::{detail_table, summary_table, uncovered_fields, Cell, Row, Table, ABSENT_MARKER};

/// `label` itself, or the first of `label#2`, `label#3`, ... not in `taken`.
pub fn unique_label<S: AsRef<str>>(label: &str, taken: &[S]) -> String {
    let is_taken = |candidate: &str| taken.iter().any(|t| t.as_ref() == candidate);
    if !is_taken(label) {
        return label.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}#{}", label, n);
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
