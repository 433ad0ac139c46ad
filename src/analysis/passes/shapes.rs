//! Shape extraction for node results and call arguments.

use super::{INPUT_SHAPES, OUTPUT_SHAPE};
use crate::analysis::details::NodeContext;
use crate::analysis::pass::Pass;
use crate::analysis::value::{FieldDecl, Value, ValueKind};
use crate::analysis::AnalysisResult;
use crate::asg::{Call, NodeKind};
use std::collections::BTreeMap;

/// Records each call's result type as nested integer sequences.
///
/// A result type with no structural view is reported as an anomaly and no
/// value is recorded for that node.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputShapePass;

impl Pass for OutputShapePass {
    type State = ();

    fn name(&self) -> &str {
        "output_shape"
    }

    fn writes(&self) -> Vec<FieldDecl> {
        vec![FieldDecl::new(OUTPUT_SHAPE, ValueKind::Seq)]
    }

    fn on_call(&self, _: &mut (), call: &Call, cx: &mut NodeContext<'_>) -> AnalysisResult<()> {
        match Value::from_result_type(&call.ty) {
            Some(shape) => cx.set(OUTPUT_SHAPE, shape),
            None => {
                cx.anomaly(format!("unrecognized result type {} for '{}'", call.ty, call.op));
                Ok(())
            }
        }
    }
}

/// Records the shape of every argument, keyed by argument position.
///
/// Call arguments contribute the `output_shape` recorded when they were
/// visited; leaf arguments contribute their declared type. Positions with no
/// known shape are left out of the map.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputShapesPass;

impl Pass for InputShapesPass {
    type State = ();

    fn name(&self) -> &str {
        "input_shapes"
    }

    fn writes(&self) -> Vec<FieldDecl> {
        vec![FieldDecl::new(INPUT_SHAPES, ValueKind::Map)]
    }

    fn reads(&self) -> Vec<String> {
        vec![OUTPUT_SHAPE.to_string()]
    }

    fn on_call(&self, _: &mut (), call: &Call, cx: &mut NodeContext<'_>) -> AnalysisResult<()> {
        let mut shapes = BTreeMap::new();
        for (position, &arg) in call.args.iter().enumerate() {
            let node = cx.graph().get_node(arg)?;
            let shape = match &node.kind {
                NodeKind::Call(_) => cx.get_for(arg, OUTPUT_SHAPE)?.cloned(),
                NodeKind::Var { .. } | NodeKind::Constant { .. } => {
                    Value::from_result_type(&node.declared_type())
                }
            };
            if let Some(shape) = shape {
                shapes.insert(position.to_string(), shape);
            }
        }
        cx.set(INPUT_SHAPES, Value::Map(shapes))
    }
}
