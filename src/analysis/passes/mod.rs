//! Standard extraction passes.
//!
//! | pass              | kind    | field / output                         |
//! |-------------------|---------|----------------------------------------|
//! | [`OpNamePass`]    | detail  | `op`: operator name                    |
//! | [`VisitIndexPass`]| detail  | `index`: 0, 1, 2... in visit order     |
//! | [`OutputShapePass`]| detail | `output_shape`: flattened result type  |
//! | [`InputShapesPass`]| detail | `input_shapes`: argument position -> shape |
//! | [`AttributePass`] | detail  | `<key>`: attribute as integers         |
//! | [`HistogramPass`] | summary | value of another field -> count        |

mod attrs;
mod basic;
mod histogram;
mod shapes;

pub use attrs::AttributePass;
pub use basic::{OpNamePass, VisitIndexPass};
pub use histogram::HistogramPass;
pub use shapes::{InputShapesPass, OutputShapePass};

use super::pass::AnyPass;

pub const OP: &str = "op";
pub const INDEX: &str = "index";
pub const OUTPUT_SHAPE: &str = "output_shape";
pub const INPUT_SHAPES: &str = "input_shapes";

/// Attribute keys extracted by default.
pub const DEFAULT_ATTRIBUTES: [&str; 2] = ["strides", "padding"];

/// The default pass set with the given attribute keys.
pub fn with_attributes<S: AsRef<str>>(attributes: &[S]) -> Vec<Box<dyn AnyPass>> {
    configured(attributes, OP)
}

/// The default detail passes plus one attribute pass per key, with the
/// histogram counting `histogram_field`.
pub fn configured<S: AsRef<str>>(attributes: &[S], histogram_field: &str) -> Vec<Box<dyn AnyPass>> {
    let mut passes: Vec<Box<dyn AnyPass>> = vec![
        Box::new(OpNamePass),
        Box::new(VisitIndexPass),
        Box::new(OutputShapePass),
        Box::new(InputShapesPass),
    ];
    for key in attributes {
        passes.push(Box::new(AttributePass::new(key.as_ref())));
    }
    passes.push(Box::new(HistogramPass::new(histogram_field)));
    passes
}

/// Operator name, visit index, output and input shapes, strides, padding,
/// and an operator histogram.
pub fn standard() -> Vec<Box<dyn AnyPass>> {
    with_attributes(&DEFAULT_ATTRIBUTES)
}
