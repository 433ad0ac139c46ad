//! Single traversal of a graph that drives every pass of a run.

use super::details::{Access, Anomaly, DetailStore, NodeContext};
use super::pass::PassRun;
use super::AnalysisResult;
use crate::asg::{Asg, AsgError, NodeId, NodeKind};
use std::collections::HashSet;

/// A pass started for one run, with the fields it may touch.
pub(crate) struct Scheduled<'p> {
    pub access: &'p Access,
    pub run: Box<dyn PassRun + 'p>,
}

/// Depth-first walker over the graph outputs.
///
/// Arguments are visited before the nodes that consume them, left to right,
/// and every node at most once no matter how many consumers it has.
pub struct Walker<'a> {
    asg: &'a Asg,
    visited: HashSet<NodeId>,
    on_path: HashSet<NodeId>,
}

enum Step {
    Enter(NodeId),
    Exit(NodeId),
}

impl<'a> Walker<'a> {
    pub fn new(asg: &'a Asg) -> Self {
        Self { asg, visited: HashSet::new(), on_path: HashSet::new() }
    }

    /// Node ids in visitation order, leaves included.
    pub fn order(asg: &'a Asg) -> AnalysisResult<Vec<NodeId>> {
        let mut walker = Self::new(asg);
        let mut order = Vec::new();
        walker.walk(|id| {
            order.push(id);
            Ok(())
        })?;
        Ok(order)
    }

    /// Visits every node reachable from the graph outputs and dispatches it
    /// to each pass in turn.
    pub(crate) fn traverse(
        mut self,
        passes: &mut [Scheduled<'_>],
        store: &mut DetailStore,
        anomalies: &mut Vec<Anomaly>,
    ) -> AnalysisResult<()> {
        let asg = self.asg;
        self.walk(|id| {
            let node = asg.get_node(id)?;
            match &node.kind {
                NodeKind::Call(call) => {
                    store.open(id);
                    for pass in passes.iter_mut() {
                        let mut cx = NodeContext::new(id, asg, pass.access, store, anomalies);
                        pass.run.visit_call(call, &mut cx)?;
                    }
                }
                NodeKind::Var { .. } | NodeKind::Constant { .. } => {
                    for pass in passes.iter_mut() {
                        pass.run.visit_leaf(node);
                    }
                }
            }
            Ok(())
        })
    }

    fn walk<F>(&mut self, mut visit: F) -> AnalysisResult<()>
    where
        F: FnMut(NodeId) -> AnalysisResult<()>,
    {
        let asg = self.asg;
        for &root in &asg.outputs {
            let mut stack = vec![Step::Enter(root)];
            while let Some(step) = stack.pop() {
                match step {
                    Step::Enter(id) => {
                        if self.visited.contains(&id) {
                            continue;
                        }
                        if !self.on_path.insert(id) {
                            return Err(AsgError::Cycle(id).into());
                        }
                        stack.push(Step::Exit(id));
                        let node = asg.get_node(id)?;
                        // Reversed so the first argument is popped first.
                        for &arg in node.args().iter().rev() {
                            if !self.visited.contains(&arg) {
                                stack.push(Step::Enter(arg));
                            }
                        }
                    }
                    Step::Exit(id) => {
                        self.on_path.remove(&id);
                        if self.visited.insert(id) {
                            visit(id)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
