use super::{INDEX, OP};
use crate::analysis::details::NodeContext;
use crate::analysis::pass::Pass;
use crate::analysis::value::{FieldDecl, Value, ValueKind};
use crate::analysis::AnalysisResult;
use crate::asg::Call;

/// Records the operator name.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpNamePass;

impl Pass for OpNamePass {
    type State = ();

    fn name(&self) -> &str {
        "op_name"
    }

    fn writes(&self) -> Vec<FieldDecl> {
        vec![FieldDecl::new(OP, ValueKind::Str)]
    }

    fn on_call(&self, _: &mut (), call: &Call, cx: &mut NodeContext<'_>) -> AnalysisResult<()> {
        cx.set(OP, Value::Str(call.op.clone()))
    }
}

/// Numbers operator applications in the order they are visited.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisitIndexPass;

impl Pass for VisitIndexPass {
    /// Next index to hand out.
    type State = i64;

    fn name(&self) -> &str {
        "visit_index"
    }

    fn writes(&self) -> Vec<FieldDecl> {
        vec![FieldDecl::new(INDEX, ValueKind::Int)]
    }

    fn on_call(&self, next: &mut i64, _call: &Call, cx: &mut NodeContext<'_>) -> AnalysisResult<()> {
        cx.set(INDEX, Value::Int(*next))?;
        *next += 1;
        Ok(())
    }
}
