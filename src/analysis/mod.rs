//! # Graph Analysis Module
//!
//! A multi-pass engine that gathers structural facts from an [`Asg`](crate::asg::Asg).
//!
//! ## How It Works
//!
//! ```text
//! passes ──► Pipeline::new (validate + order) ──► Pipeline::run(asg)
//!                                                     │
//!                      Walker: one traversal, args before consumers
//!                                                     │
//!                 on_call / on_leaf for every pass, in pipeline order
//!                                                     │
//!                      on_summarize for every pass ──► RunResult
//! ```
//!
//! Each pass owns a set of typed detail fields. A pass may read fields owned
//! by the passes it declares as dependencies; the pipeline schedules those
//! first and rejects missing owners or cycles before anything runs.
//!
//! ## Example
//!
//! ```ignore
//! use asgscope::analysis::{passes, Pipeline};
//!
//! let pipeline = Pipeline::new(passes::standard())?;
//! let result = pipeline.run(&graph)?;
//! for (node, details) in result.details.iter() {
//!     println!("{node}: {details:?}");
//! }
//! ```

pub mod details;
pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod value;
pub mod walker;

pub use details::{Anomaly, DetailStore, NodeContext, NodeDetails, Summary};
pub use pass::{AnyPass, Pass};
pub use pipeline::{Pipeline, RunResult};
pub use value::{FieldDecl, Value, ValueKind};
pub use walker::Walker;

use crate::asg::AsgError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Graph error: {0}")]
    Asg(#[from] AsgError),

    #[error("Pass '{pass}' wrote field '{field}' it does not declare.")]
    UndeclaredWrite { pass: String, field: String },

    #[error("Pass '{pass}' read field '{field}' without declaring it as a dependency.")]
    UndeclaredRead { pass: String, field: String },

    #[error("Pass '{pass}' declares field '{field}' as {expected} but wrote a {actual}.")]
    KindMismatch {
        pass: String,
        field: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("Detail field '{field}' is declared by both '{first}' and '{second}'.")]
    DuplicateField {
        field: String,
        first: String,
        second: String,
    },

    #[error("Pass '{pass}' reads field '{field}' but no pass in the pipeline writes it.")]
    UnmetDependency { pass: String, field: String },

    #[error("Pass dependencies form a cycle through '{0}'.")]
    DependencyCycle(String),

    #[error("Summary field '{field}' is produced by both '{first}' and '{second}'.")]
    SummaryCollision {
        field: String,
        first: String,
        second: String,
    },
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
