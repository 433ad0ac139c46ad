//! `asgscope`: runs the standard analysis passes over model graphs and
//! prints the cross-model summary and per-node detail tables.

use asgscope::analysis::RunResult;
use asgscope::config::{OutputFormat, ReportConfig};
use asgscope::report::{detail_table, summary_table, Table};
use asgscope::zoo;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Command line arguments. Flags override the configuration file.
#[derive(Parser, Debug)]
#[command(author, version, about = "Structural analysis of ASG model graphs", long_about = None)]
struct Args {
    /// JSON report configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Zoo model to analyse (repeatable)
    #[arg(short, long = "model")]
    models: Vec<String>,

    /// JSON graph file to analyse (repeatable)
    #[arg(short, long = "graph")]
    graphs: Vec<PathBuf>,

    /// Attribute key to extract (repeatable, replaces the configured keys)
    #[arg(short, long = "attribute")]
    attributes: Vec<String>,

    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Print only the cross-model summary
    #[arg(long)]
    summary_only: bool,

    /// Analyse models one after another
    #[arg(long)]
    sequential: bool,

    /// List the zoo models and exit
    #[arg(long)]
    list: bool,
}

impl Args {
    fn apply(&self, config: &mut ReportConfig) {
        if !self.models.is_empty() {
            config.models = self.models.clone();
        }
        if !self.graphs.is_empty() {
            config.graphs = self.graphs.clone();
        }
        if !self.attributes.is_empty() {
            config.attributes = self.attributes.clone();
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if self.sequential {
            config.parallel = false;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.list {
        for entry in zoo::catalog() {
            println!("{:<22}{}", entry.name, entry.description);
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => ReportConfig::load(path)?,
        None => ReportConfig::default(),
    };
    args.apply(&mut config);

    let pipeline = config.pipeline()?;
    let graphs = config.graphs()?;
    tracing::info!(passes = ?pipeline.pass_names(), models = graphs.len(), "starting analysis");

    let results = if config.parallel {
        pipeline.run_all(&graphs)
    } else {
        graphs.iter().map(|g| pipeline.run(g)).collect()
    };

    let mut runs = Vec::new();
    let mut failures = Vec::new();
    for (graph, result) in graphs.iter().zip(results) {
        match result {
            Ok(run) => runs.push(run),
            Err(e) => failures.push((graph.name.clone(), e.to_string())),
        }
    }

    let schema = config.detail_schema();
    let details: Vec<Table> = if args.summary_only {
        Vec::new()
    } else {
        runs.iter().map(|run| detail_table(run, &schema)).collect()
    };
    let summary = summary_table(&runs);

    match config.format {
        OutputFormat::Text => print_text(&summary, &details, &runs, &failures),
        OutputFormat::Json => print_json(&summary, &details, &runs, &failures)?,
    }

    if !failures.is_empty() {
        return Err(format!("{} of {} runs failed", failures.len(), graphs.len()).into());
    }
    Ok(())
}

fn print_text(summary: &Table, details: &[Table], runs: &[RunResult], failures: &[(String, String)]) {
    println!("{}", summary);
    for table in details {
        println!("{}", table);
    }
    for run in runs {
        for anomaly in &run.anomalies {
            println!("{}: {}", run.model, anomaly);
        }
    }
    for (model, error) in failures {
        eprintln!("{}: {}", model, error);
    }
}

fn print_json(
    summary: &Table,
    details: &[Table],
    runs: &[RunResult],
    failures: &[(String, String)],
) -> serde_json::Result<()> {
    let anomalies: serde_json::Map<String, serde_json::Value> = runs
        .iter()
        .filter(|run| !run.anomalies.is_empty())
        .map(|run| {
            let messages = run.anomalies.iter().map(|a| a.to_string()).collect::<Vec<_>>();
            (run.model.clone(), serde_json::json!(messages))
        })
        .collect();
    let errors: serde_json::Map<String, serde_json::Value> = failures
        .iter()
        .map(|(model, error)| (model.clone(), serde_json::json!(error)))
        .collect();

    let report = serde_json::json!({
        "summary": summary,
        "details": details,
        "anomalies": anomalies,
        "errors": errors,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
