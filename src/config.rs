//! Report configuration, read from a JSON file.
//!
//! Every key is optional:
//!
//! ```json
//! {
//!   "models": ["lenet", "resnet_tiny"],
//!   "graphs": ["exported/model.json"],
//!   "attributes": ["strides", "padding", "groups"],
//!   "histogram_field": "op",
//!   "input_columns": 2,
//!   "columns": [{"path": {"field": "op"}, "label": "op"}],
//!   "format": "json",
//!   "parallel": true
//! }
//! ```

use crate::analysis::passes::{self, DEFAULT_ATTRIBUTES, OP};
use crate::analysis::{AnalysisError, Pipeline};
use crate::asg::{Asg, AsgError};
use crate::report::{unique_label, ColumnSchema};
use crate::tensor::BuildError;
use crate::zoo;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed graph in {}: {source}", path.display())]
    Graph {
        path: PathBuf,
        #[source]
        source: AsgError,
    },

    #[error("Model error: {0}")]
    Build(#[from] BuildError),

    #[error("Pipeline error: {0}")]
    Analysis(#[from] AnalysisError),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Zoo models to analyse. Empty means the whole catalog, unless graph
    /// files are given.
    pub models: Vec<String>,
    /// JSON-serialized graphs to analyse next to the zoo models.
    pub graphs: Vec<PathBuf>,
    /// Attribute keys extracted into detail fields.
    pub attributes: Vec<String>,
    /// Detail field counted by the summary histogram.
    pub histogram_field: String,
    /// Argument positions shown by the standard detail columns.
    pub input_columns: usize,
    /// Explicit detail columns, replacing the standard ones.
    pub columns: Option<ColumnSchema>,
    pub format: OutputFormat,
    /// Analyse models on the rayon pool.
    pub parallel: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            graphs: Vec::new(),
            attributes: DEFAULT_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
            histogram_field: OP.to_string(),
            input_columns: 2,
            columns: None,
            format: OutputFormat::Text,
            parallel: true,
        }
    }
}

impl ReportConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        read_json(path.as_ref())
    }

    /// Pass pipeline for this configuration.
    pub fn pipeline(&self) -> ConfigResult<Pipeline> {
        Ok(Pipeline::new(passes::configured(&self.attributes[..], &self.histogram_field))?)
    }

    /// Columns of the per-node tables.
    pub fn detail_schema(&self) -> ColumnSchema {
        match &self.columns {
            Some(columns) => columns.clone(),
            None => ColumnSchema::standard(self.input_columns, &self.attributes[..]),
        }
    }

    /// Zoo models named by the configuration, then the graph files.
    /// Repeated graph names get a `#n` suffix so each run is reported
    /// under its own name.
    pub fn graphs(&self) -> ConfigResult<Vec<Asg>> {
        let mut graphs = Vec::new();
        if self.models.is_empty() && self.graphs.is_empty() {
            for entry in zoo::catalog() {
                graphs.push((entry.build)()?);
            }
        }
        for name in &self.models {
            graphs.push(zoo::build(name)?);
        }
        for path in &self.graphs {
            graphs.push(load_graph(path)?);
        }
        let mut names: Vec<String> = Vec::with_capacity(graphs.len());
        for graph in &mut graphs {
            let name = unique_label(&graph.name, &names[..]);
            if name != graph.name {
                tracing::warn!(model = %graph.name, renamed = %name, "duplicate model name");
                graph.name = name.clone();
            }
            names.push(name);
        }
        tracing::debug!(count = graphs.len(), "graphs loaded");
        Ok(graphs)
    }
}

/// Reads a graph written with `serde_json`. Node ids must match their
/// positions in the node list.
pub fn load_graph<P: AsRef<Path>>(path: P) -> ConfigResult<Asg> {
    let path = path.as_ref();
    let graph: Asg = read_json(path)?;
    graph.check_ids().map_err(|source| ConfigError::Graph {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(graph)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}
