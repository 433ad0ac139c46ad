//! `Tensor` handles and the `GraphContext` that owns the graph under
//! construction.
//!
//! A `Tensor` holds no data. It names a node of the graph being built, and
//! every operation on it appends a new call node whose result type is
//! computed on the spot from the operand types.

use crate::asg::{Asg, AsgError, Attr, Call, NodeId, ResultType, Shape, VarRole};
use crate::shapes::{self, Window};
use ndarray::ArrayD;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Graph error: {0}")]
    Asg(#[from] AsgError),

    #[error("Incompatible shapes for operation '{op}': left operand {shape1:?}, right operand {shape2:?}.")]
    IncompatibleShapes { op: String, shape1: Shape, shape2: Shape },

    #[error("Invalid tensor rank for '{op}': expected {expected}D, got {actual}D.")]
    InvalidRank { op: String, expected: usize, actual: usize },

    #[error("Operation '{op}' needs a tensor operand, got {ty}.")]
    NotATensor { op: String, ty: ResultType },

    #[error("Window of size {kernel} does not fit extent {size} in '{op}'.")]
    WindowTooLarge { op: String, kernel: usize, size: usize },

    #[error("Tuple index {index} out of range for {ty}.")]
    TupleIndex { index: usize, ty: ResultType },

    #[error("concatenate needs at least one operand.")]
    EmptyConcat,

    #[error("Unknown model '{0}'.")]
    UnknownModel(String),
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// Owns the graph while layers append to it.
#[derive(Debug, Clone)]
pub struct GraphContext {
    graph: Asg,
}

impl GraphContext {
    pub fn new(name: &str) -> Self {
        Self { graph: Asg::new(name) }
    }

    /// Shared context for building a graph through `Tensor` handles.
    pub fn shared(name: &str) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(name)))
    }

    pub fn graph(&self) -> &Asg {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Asg {
        &mut self.graph
    }

    /// Snapshot of the graph with `output` as its single output.
    pub fn finish(context: &Rc<RefCell<Self>>, output: &Tensor) -> Asg {
        let mut graph = context.borrow().graph.clone();
        graph.set_output(output.node_id);
        graph
    }
}

/// Symbolic handle to a node of the graph under construction.
#[derive(Debug, Clone)]
pub struct Tensor {
    pub node_id: NodeId,
    pub ty: ResultType,
    pub context: Rc<RefCell<GraphContext>>,
}

impl Tensor {
    /// Graph input, fed with data at run time.
    pub fn new_input(context: &Rc<RefCell<GraphContext>>, name: &str, shape: Shape) -> Self {
        Self::new_var(context, name, VarRole::Input, shape)
    }

    /// Trainable weight.
    pub fn new_parameter(context: &Rc<RefCell<GraphContext>>, name: &str, shape: Shape) -> Self {
        Self::new_var(context, name, VarRole::Parameter, shape)
    }

    fn new_var(context: &Rc<RefCell<GraphContext>>, name: &str, role: VarRole, shape: Shape) -> Self {
        let ty = ResultType::Tensor(shape);
        let node_id = context.borrow_mut().graph_mut().add_var(name, role, ty.clone());
        Self { node_id, ty, context: Rc::clone(context) }
    }

    /// Constant embedded in the graph.
    pub fn new_literal(context: &Rc<RefCell<GraphContext>>, data: ArrayD<f32>, name: &str) -> Self {
        let ty = ResultType::Tensor(data.shape().to_vec());
        let node_id = context.borrow_mut().graph_mut().add_constant(name, data);
        Self { node_id, ty, context: Rc::clone(context) }
    }

    /// Tensor shape of this handle.
    pub fn shape(&self, op: &str) -> BuildResult<&Shape> {
        match &self.ty {
            ResultType::Tensor(shape) => Ok(shape),
            other => Err(BuildError::NotATensor { op: op.to_string(), ty: other.clone() }),
        }
    }

    fn apply(&self, call: Call) -> BuildResult<Tensor> {
        let ty = call.ty.clone();
        let node_id = self.context.borrow_mut().graph_mut().add_call(call)?;
        Ok(Tensor { node_id, ty, context: Rc::clone(&self.context) })
    }

    fn unary(&self, op: &str) -> BuildResult<Tensor> {
        self.apply(Call::new(op, vec![self.node_id], self.ty.clone()))
    }

    fn binary(&self, op: &str, rhs: &Tensor) -> BuildResult<Tensor> {
        let shape = shapes::broadcast(op, self.shape(op)?, rhs.shape(op)?)?;
        self.apply(Call::new(op, vec![self.node_id, rhs.node_id], ResultType::Tensor(shape)))
    }

    // --- Elementwise ---

    pub fn add(&self, rhs: &Tensor) -> BuildResult<Tensor> {
        self.binary("add", rhs)
    }

    pub fn multiply(&self, rhs: &Tensor) -> BuildResult<Tensor> {
        self.binary("multiply", rhs)
    }

    pub fn relu(&self) -> BuildResult<Tensor> {
        self.unary("nn.relu")
    }

    pub fn sigmoid(&self) -> BuildResult<Tensor> {
        self.unary("sigmoid")
    }

    pub fn tanh(&self) -> BuildResult<Tensor> {
        self.unary("tanh")
    }

    pub fn leaky_relu(&self, alpha: f64) -> BuildResult<Tensor> {
        self.apply(Call::new("nn.leaky_relu", vec![self.node_id], self.ty.clone()).with_attr("alpha", alpha))
    }

    pub fn softmax(&self, axis: i64) -> BuildResult<Tensor> {
        self.apply(Call::new("nn.softmax", vec![self.node_id], self.ty.clone()).with_attr("axis", axis))
    }

    // --- Dense ---

    /// `weight` is `[units, in_features]`.
    pub fn dense(&self, weight: &Tensor) -> BuildResult<Tensor> {
        let shape = shapes::dense(self.shape("nn.dense")?, weight.shape("nn.dense")?)?;
        self.apply(Call::new("nn.dense", vec![self.node_id, weight.node_id], ResultType::Tensor(shape)))
    }

    pub fn bias_add(&self, bias: &Tensor, axis: usize) -> BuildResult<Tensor> {
        let shape = shapes::bias_add(self.shape("nn.bias_add")?, bias.shape("nn.bias_add")?, axis)?;
        self.apply(
            Call::new("nn.bias_add", vec![self.node_id, bias.node_id], ResultType::Tensor(shape))
                .with_attr("axis", axis as i64),
        )
    }

    // --- Convolution ---

    pub fn conv2d(&self, weight: &Tensor, window: Window, groups: usize) -> BuildResult<Tensor> {
        let weight_shape = weight.shape("nn.conv2d")?;
        let shape = shapes::conv2d(self.shape("nn.conv2d")?, weight_shape, &window, groups)?;
        let kernel = (weight_shape[2], weight_shape[3]);
        self.apply(
            Call::new("nn.conv2d", vec![self.node_id, weight.node_id], ResultType::Tensor(shape))
                .with_attr("strides", window.stride)
                .with_attr("padding", window.padding)
                .with_attr("dilation", window.dilation)
                .with_attr("groups", groups as i64)
                .with_attr("kernel_size", kernel),
        )
    }

    pub fn conv2d_transpose(
        &self,
        weight: &Tensor,
        window: Window,
        output_padding: (usize, usize),
    ) -> BuildResult<Tensor> {
        let weight_shape = weight.shape("nn.conv2d_transpose")?;
        let shape =
            shapes::conv2d_transpose(self.shape("nn.conv2d_transpose")?, weight_shape, &window, output_padding)?;
        let kernel = (weight_shape[2], weight_shape[3]);
        self.apply(
            Call::new("nn.conv2d_transpose", vec![self.node_id, weight.node_id], ResultType::Tensor(shape))
                .with_attr("strides", window.stride)
                .with_attr("padding", window.padding)
                .with_attr("output_padding", output_padding)
                .with_attr("kernel_size", kernel),
        )
    }

    // --- Pooling ---

    pub fn max_pool2d(&self, window: Window) -> BuildResult<Tensor> {
        self.pool2d("nn.max_pool2d", window)
    }

    pub fn avg_pool2d(&self, window: Window) -> BuildResult<Tensor> {
        self.pool2d("nn.avg_pool2d", window)
    }

    fn pool2d(&self, op: &str, window: Window) -> BuildResult<Tensor> {
        let shape = shapes::pool2d(op, self.shape(op)?, &window)?;
        self.apply(
            Call::new(op, vec![self.node_id], ResultType::Tensor(shape))
                .with_attr("pool_size", window.kernel)
                .with_attr("strides", window.stride)
                .with_attr("padding", window.padding),
        )
    }

    pub fn adaptive_avg_pool2d(&self, output_size: (usize, usize)) -> BuildResult<Tensor> {
        let shape = shapes::adaptive_pool2d(self.shape("nn.adaptive_avg_pool2d")?, output_size)?;
        self.apply(
            Call::new("nn.adaptive_avg_pool2d", vec![self.node_id], ResultType::Tensor(shape))
                .with_attr("output_size", output_size),
        )
    }

    // --- Normalization ---

    /// Returns the `(output, batch mean, batch variance)` tuple.
    pub fn batch_norm(
        &self,
        gamma: &Tensor,
        beta: &Tensor,
        moving_mean: &Tensor,
        moving_var: &Tensor,
        epsilon: f64,
    ) -> BuildResult<Tensor> {
        let shape = self.shape("nn.batch_norm")?;
        let channels = gamma.shape("nn.batch_norm")?.clone();
        shapes::bias_add(shape, &channels, 1)?;
        let ty = ResultType::Tuple(vec![
            ResultType::Tensor(shape.clone()),
            ResultType::Tensor(channels.clone()),
            ResultType::Tensor(channels),
        ]);
        let args = vec![self.node_id, gamma.node_id, beta.node_id, moving_mean.node_id, moving_var.node_id];
        self.apply(Call::new("nn.batch_norm", args, ty).with_attr("epsilon", epsilon))
    }

    pub fn tuple_get_item(&self, index: usize) -> BuildResult<Tensor> {
        let ty = match &self.ty {
            ResultType::Tuple(fields) => fields.get(index).cloned(),
            _ => None,
        }
        .ok_or_else(|| BuildError::TupleIndex { index, ty: self.ty.clone() })?;
        self.apply(Call::new("TupleGetItem", vec![self.node_id], ty).with_attr("index", index as i64))
    }

    // --- Shape ---

    pub fn batch_flatten(&self) -> BuildResult<Tensor> {
        let shape = shapes::flatten(self.shape("nn.batch_flatten")?)?;
        self.apply(Call::new("nn.batch_flatten", vec![self.node_id], ResultType::Tensor(shape)))
    }

    pub fn reshape(&self, target: Shape) -> BuildResult<Tensor> {
        let shape = shapes::reshape(self.shape("reshape")?, &target)?;
        let newshape: Vec<i64> = shape.iter().map(|&d| d as i64).collect();
        self.apply(Call::new("reshape", vec![self.node_id], ResultType::Tensor(shape)).with_attr("newshape", Attr::Ints(newshape)))
    }

    pub fn concatenate(parts: &[&Tensor], axis: usize) -> BuildResult<Tensor> {
        let first = parts.first().ok_or(BuildError::EmptyConcat)?;
        let part_shapes = parts
            .iter()
            .map(|t| t.shape("concatenate").map(Vec::as_slice))
            .collect::<BuildResult<Vec<_>>>()?;
        let shape = shapes::concatenate(&part_shapes, axis)?;
        let args = parts.iter().map(|t| t.node_id).collect();
        first.apply(Call::new("concatenate", args, ResultType::Tensor(shape)).with_attr("axis", axis as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ops_record_result_types() {
        let context = GraphContext::shared("t");
        let x = Tensor::new_input(&context, "x", vec![1, 3, 8, 8]);
        let w = Tensor::new_parameter(&context, "w", vec![4, 3, 3, 3]);
        let y = x.conv2d(&w, Window::new((3, 3), (2, 2), (1, 1)), 1).unwrap();

        assert_eq!(y.ty, ResultType::Tensor(vec![1, 4, 4, 4]));
        let graph = GraphContext::finish(&context, &y);
        let call = graph.get_node(y.node_id).unwrap().as_call().unwrap();
        assert_eq!(call.op, "nn.conv2d");
        assert_eq!(call.attrs.get("strides"), Some(&Attr::Ints(vec![2, 2])));
        assert_eq!(graph.outputs, vec![y.node_id]);
    }

    #[test]
    fn test_batch_norm_is_a_tuple() {
        let context = GraphContext::shared("bn");
        let x = Tensor::new_input(&context, "x", vec![1, 8, 4, 4]);
        let params: Vec<Tensor> = ["g", "b", "m", "v"]
            .iter()
            .map(|n| Tensor::new_parameter(&context, n, vec![8]))
            .collect();
        let bn = x.batch_norm(&params[0], &params[1], &params[2], &params[3], 1e-5).unwrap();
        assert!(matches!(bn.ty, ResultType::Tuple(ref f) if f.len() == 3));

        let out = bn.tuple_get_item(0).unwrap();
        assert_eq!(out.ty, ResultType::Tensor(vec![1, 8, 4, 4]));
        assert!(matches!(bn.tuple_get_item(3), Err(BuildError::TupleIndex { .. })));
    }

    #[test]
    fn test_shape_errors_surface() {
        let context = GraphContext::shared("bad");
        let x = Tensor::new_input(&context, "x", vec![2, 3]);
        let y = Tensor::new_input(&context, "y", vec![4]);
        assert!(matches!(x.add(&y), Err(BuildError::IncompatibleShapes { .. })));
        assert!(matches!(x.max_pool2d(Window::new((2, 2), (2, 2), (0, 0))), Err(BuildError::InvalidRank { .. })));
    }

    #[test]
    fn test_literal_broadcasts() {
        let context = GraphContext::shared("lit");
        let x = Tensor::new_input(&context, "x", vec![2, 3]);
        let scale = Tensor::new_literal(&context, ArrayD::zeros(ndarray::IxDyn(&[3])), "scale");
        let y = x.multiply(&scale).unwrap();
        assert_eq!(y.ty, ResultType::Tensor(vec![2, 3]));
        assert_eq!(scale.ty, ResultType::Tensor(vec![3]));
    }

    #[test]
    fn test_concatenate() {
        let context = GraphContext::shared("cat");
        let a = Tensor::new_input(&context, "a", vec![1, 2, 4]);
        let b = Tensor::new_input(&context, "b", vec![1, 6, 4]);
        let c = Tensor::concatenate(&[&a, &b], 1).unwrap();
        assert_eq!(c.ty, ResultType::Tensor(vec![1, 8, 4]));
    }
}
