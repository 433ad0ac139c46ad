//! The pass contract.
//!
//! A pass is an immutable description of one unit of extraction. Everything a
//! pass accumulates while a graph is walked lives in its [`Pass::State`],
//! which the engine creates fresh for every run and threads through each
//! hook. The same pass object can therefore serve any number of runs,
//! including concurrent ones.

use super::details::{DetailStore, NodeContext, Summary};
use super::value::FieldDecl;
use super::AnalysisResult;
use crate::asg::{Call, Node};

pub trait Pass: Send + Sync {
    /// Per-run accumulator.
    type State: Default + 'static;

    /// Name used in diagnostics and scheduling errors.
    fn name(&self) -> &str;

    /// Detail fields this pass writes. No two passes of a pipeline may
    /// declare the same field.
    fn writes(&self) -> Vec<FieldDecl> {
        Vec::new()
    }

    /// Detail fields of other passes this pass reads. The pipeline schedules
    /// the owners of these fields first.
    fn reads(&self) -> Vec<String> {
        Vec::new()
    }

    /// Called once per operator application, after all of its arguments.
    fn on_call(
        &self,
        _state: &mut Self::State,
        _call: &Call,
        _cx: &mut NodeContext<'_>,
    ) -> AnalysisResult<()> {
        Ok(())
    }

    /// Called once per reachable leaf (variable or constant). Leaves have no
    /// detail entry.
    fn on_leaf(&self, _state: &mut Self::State, _node: &Node) {}

    /// Called once after traversal with the finished detail store.
    fn on_summarize(&self, _state: Self::State, _details: &DetailStore) -> Option<Summary> {
        None
    }
}

/// One pass's participation in a single run.
pub trait PassRun {
    fn visit_call(&mut self, call: &Call, cx: &mut NodeContext<'_>) -> AnalysisResult<()>;
    fn visit_leaf(&mut self, node: &Node);
    fn finish(self: Box<Self>, details: &DetailStore) -> Option<Summary>;
}

/// Object-safe view of a [`Pass`], used to hold heterogeneous pass lists.
pub trait AnyPass: Send + Sync {
    fn pass_name(&self) -> &str;
    fn declared_writes(&self) -> Vec<FieldDecl>;
    fn declared_reads(&self) -> Vec<String>;
    /// Starts a run with a fresh state.
    fn start(&self) -> Box<dyn PassRun + '_>;
}

struct Running<'p, P: Pass> {
    pass: &'p P,
    state: P::State,
}

impl<P: Pass> PassRun for Running<'_, P> {
    fn visit_call(&mut self, call: &Call, cx: &mut NodeContext<'_>) -> AnalysisResult<()> {
        self.pass.on_call(&mut self.state, call, cx)
    }

    fn visit_leaf(&mut self, node: &Node) {
        self.pass.on_leaf(&mut self.state, node)
    }

    fn finish(self: Box<Self>, details: &DetailStore) -> Option<Summary> {
        let Running { pass, state } = *self;
        pass.on_summarize(state, details)
    }
}

impl<P: Pass> AnyPass for P {
    fn pass_name(&self) -> &str {
        Pass::name(self)
    }

    fn declared_writes(&self) -> Vec<FieldDecl> {
        Pass::writes(self)
    }

    fn declared_reads(&self) -> Vec<String> {
        Pass::reads(self)
    }

    fn start(&self) -> Box<dyn PassRun + '_> {
        Box::new(Running { pass: self, state: P::State::default() })
    }
}
