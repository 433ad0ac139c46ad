//! Pass scheduling and run orchestration.

use super::details::{Access, Anomaly, DetailStore, Summary};
use super::pass::AnyPass;
use super::value::FieldDecl;
use super::walker::{Scheduled, Walker};
use super::{AnalysisError, AnalysisResult};
use crate::asg::Asg;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

/// Everything one graph's analysis produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub model: String,
    pub details: DetailStore,
    pub summary: Summary,
    pub anomalies: Vec<Anomaly>,
}

/// A validated, dependency-ordered list of passes.
pub struct Pipeline {
    passes: Vec<Box<dyn AnyPass>>,
    access: Vec<Access>,
}

impl Pipeline {
    /// Checks field ownership and dependencies, then orders the passes so that
    /// every field is written before it is read. Caller order is kept wherever
    /// the dependencies allow it.
    pub fn new(passes: Vec<Box<dyn AnyPass>>) -> AnalysisResult<Self> {
        let mut owners: HashMap<String, usize> = HashMap::new();
        for (i, pass) in passes.iter().enumerate() {
            for field in pass.declared_writes() {
                if let Some(&first) = owners.get(&field.name) {
                    return Err(AnalysisError::DuplicateField {
                        field: field.name,
                        first: passes[first].pass_name().to_string(),
                        second: pass.pass_name().to_string(),
                    });
                }
                owners.insert(field.name, i);
            }
        }

        let mut deps: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..passes.len()).map(|i| deps.add_node(i)).collect();
        for (i, pass) in passes.iter().enumerate() {
            for field in pass.declared_reads() {
                match owners.get(&field) {
                    Some(&owner) if owner == i => {}
                    Some(&owner) => {
                        deps.update_edge(nodes[owner], nodes[i], ());
                    }
                    None => {
                        return Err(AnalysisError::UnmetDependency {
                            pass: pass.pass_name().to_string(),
                            field,
                        })
                    }
                }
            }
        }

        if let Err(cycle) = toposort(&deps, None) {
            let culprit = deps[cycle.node_id()];
            return Err(AnalysisError::DependencyCycle(passes[culprit].pass_name().to_string()));
        }

        let order = stable_order(&deps);
        if order.iter().enumerate().any(|(pos, &i)| pos != i) {
            tracing::debug!(?order, "passes reordered to satisfy field dependencies");
        }

        let mut slots: Vec<Option<Box<dyn AnyPass>>> = passes.into_iter().map(Some).collect();
        let passes: Vec<Box<dyn AnyPass>> = order.into_iter().filter_map(|i| slots[i].take()).collect();
        let access = passes
            .iter()
            .map(|pass| Access {
                pass: pass.pass_name().to_string(),
                writes: pass.declared_writes(),
                reads: pass.declared_reads().into_iter().collect(),
            })
            .collect();

        Ok(Self { passes, access })
    }

    /// Pass names in execution order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.pass_name()).collect()
    }

    /// Every detail field the pipeline can produce.
    pub fn detail_fields(&self) -> Vec<&FieldDecl> {
        self.access.iter().flat_map(|a| a.writes.iter()).collect()
    }

    /// Analyses one graph: a single traversal followed by the summary step.
    ///
    /// Any contract violation aborts the run; no partial result escapes.
    pub fn run(&self, asg: &Asg) -> AnalysisResult<RunResult> {
        let _span = tracing::debug_span!("run", model = %asg.name).entered();

        let mut scheduled: Vec<Scheduled<'_>> = self
            .passes
            .iter()
            .zip(&self.access)
            .map(|(pass, access)| Scheduled { access, run: pass.start() })
            .collect();

        let mut details = DetailStore::new();
        let mut anomalies = Vec::new();
        Walker::new(asg).traverse(&mut scheduled, &mut details, &mut anomalies)?;

        let mut summary = Summary::new();
        let mut producers: BTreeMap<String, &str> = BTreeMap::new();
        for Scheduled { access, run } in scheduled {
            let Some(fragment) = run.finish(&details) else {
                continue;
            };
            for (field, value) in fragment {
                if let Some(first) = producers.get(&field) {
                    return Err(AnalysisError::SummaryCollision {
                        field,
                        first: first.to_string(),
                        second: access.pass.clone(),
                    });
                }
                producers.insert(field.clone(), &access.pass);
                summary.insert(field, value);
            }
        }

        tracing::debug!(
            nodes = details.len(),
            summary_fields = summary.len(),
            anomalies = anomalies.len(),
            "run complete"
        );
        Ok(RunResult { model: asg.name.clone(), details, summary, anomalies })
    }

    /// Analyses independent graphs in parallel. Results keep input order and
    /// a failed run does not affect the others.
    pub fn run_all(&self, graphs: &[Asg]) -> Vec<AnalysisResult<RunResult>> {
        graphs
            .par_iter()
            .map(|asg| {
                let result = self.run(asg);
                if let Err(e) = &result {
                    tracing::error!(model = %asg.name, error = %e, "run discarded");
                }
                result
            })
            .collect()
    }
}

/// Kahn's algorithm, always releasing the lowest ready index first.
fn stable_order(deps: &DiGraph<usize, ()>) -> Vec<usize> {
    let mut indegree: Vec<usize> = deps
        .node_indices()
        .map(|n| deps.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(indegree.len());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(deps[NodeIndex::new(i)]);
        for next in deps.neighbors_directed(NodeIndex::new(i), Direction::Outgoing) {
            let n = next.index();
            indegree[n] -= 1;
            if indegree[n] == 0 {
                ready.push(Reverse(n));
            }
        }
    }
    order
}
