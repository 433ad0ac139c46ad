//! # asgscope: structural analysis of ASG model graphs
//!
//! Runs a set of analysis passes over an **Abstract Semantic Graph (ASG)** in
//! a single traversal, collects typed per-node details and per-model
//! summaries, and flattens them into comparison tables.
//!
//! ## Usage Example
//!
//! ```no_run
//! use asgscope::analysis::{passes, Pipeline};
//! use asgscope::report::{detail_table, summary_table, ColumnSchema};
//! use asgscope::zoo;
//!
//! let pipeline = Pipeline::new(passes::standard()).unwrap();
//! let graphs = vec![zoo::lenet().unwrap(), zoo::resnet_tiny().unwrap()];
//! let runs: Vec<_> = pipeline.run_all(&graphs).into_iter().flatten().collect();
//!
//! println!("{}", summary_table(&runs));
//! let schema = ColumnSchema::standard(2, &passes::DEFAULT_ATTRIBUTES);
//! println!("{}", detail_table(&runs[0], &schema));
//! ```

pub mod analysis;
pub mod asg;
pub mod config;
pub mod nn;
pub mod report;
pub mod shapes;
pub mod tensor;
pub mod zoo;
