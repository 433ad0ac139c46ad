//! ASG: the abstract semantic graph analysed by the pass engine.
//!
//! A graph is an arena of [`Node`]s addressed by [`NodeId`]. Node identity is
//! id identity: a sub-graph shared by several consumers is a single id that
//! appears in several argument lists, while two structurally equal nodes with
//! different ids are different nodes.

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Tensor shape.
pub type Shape = Vec<usize>;

pub type AsgResult<T> = std::result::Result<T, AsgError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AsgError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    #[error("node {0} is reachable from its own arguments")]
    Cycle(NodeId),
    #[error("node at position {position} is labelled {id}")]
    MisplacedNode { position: usize, id: NodeId },
}

/// Node identifier: the index of the node in its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Computed type of a node's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultType {
    Tensor(Shape),
    Tuple(Vec<ResultType>),
    /// Any type the analysis passes have no structural view of
    /// (function types, references, handles...). The string names it.
    Opaque(String),
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultType::Tensor(shape) => write!(f, "Tensor{:?}", shape),
            ResultType::Tuple(fields) => {
                let parts: Vec<String> = fields.iter().map(|t| t.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
            ResultType::Opaque(name) => write!(f, "<{}>", name),
        }
    }
}

/// Operator attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attr {
    Int(i64),
    Ints(Vec<i64>),
    Float(f64),
    Str(String),
}

impl Attr {
    /// Integer-sequence view of the attribute, if it has one.
    pub fn as_ints(&self) -> Option<Vec<i64>> {
        match self {
            Attr::Int(v) => Some(vec![*v]),
            Attr::Ints(v) => Some(v.clone()),
            Attr::Float(_) | Attr::Str(_) => None,
        }
    }
}

impl From<i64> for Attr {
    fn from(v: i64) -> Self {
        Attr::Int(v)
    }
}

impl From<(usize, usize)> for Attr {
    fn from(pair: (usize, usize)) -> Self {
        Attr::Ints(vec![pair.0 as i64, pair.1 as i64])
    }
}

impl From<f64> for Attr {
    fn from(v: f64) -> Self {
        Attr::Float(v)
    }
}

impl From<&str> for Attr {
    fn from(v: &str) -> Self {
        Attr::Str(v.to_string())
    }
}

/// Operator application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub op: String,
    pub args: Vec<NodeId>,
    #[serde(default)]
    pub attrs: BTreeMap<String, Attr>,
    pub ty: ResultType,
}

impl Call {
    pub fn new(op: impl Into<String>, args: Vec<NodeId>, ty: ResultType) -> Self {
        Self { op: op.into(), args, attrs: BTreeMap::new(), ty }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Attr>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarRole {
    Input,
    Parameter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Call(Call),
    Var { name: String, role: VarRole, ty: ResultType },
    Constant { name: String, value: ArrayD<f32> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
}

impl Node {
    /// Argument ids; empty for leaves.
    pub fn args(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Call(call) => &call.args,
            NodeKind::Var { .. } | NodeKind::Constant { .. } => &[],
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match &self.kind {
            NodeKind::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Type known from the node itself, without any analysis.
    /// Calls carry their computed type, constants are typed by their data.
    pub fn declared_type(&self) -> ResultType {
        match &self.kind {
            NodeKind::Call(call) => call.ty.clone(),
            NodeKind::Var { ty, .. } => ty.clone(),
            NodeKind::Constant { value, .. } => ResultType::Tensor(value.shape().to_vec()),
        }
    }
}

/// A named model graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asg {
    pub name: String,
    pub nodes: Vec<Node>,
    pub outputs: Vec<NodeId>,
}

impl Asg {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), nodes: Vec::new(), outputs: Vec::new() }
    }

    /// Appends a node. Every argument must already be in the graph, which
    /// keeps graphs built through this method acyclic.
    pub fn add_node(&mut self, kind: NodeKind) -> AsgResult<NodeId> {
        let id = NodeId(self.nodes.len());
        if let NodeKind::Call(call) = &kind {
            if let Some(missing) = call.args.iter().find(|a| a.0 >= id.0) {
                return Err(AsgError::NodeNotFound(*missing));
            }
        }
        self.nodes.push(Node { id, kind });
        Ok(id)
    }

    pub fn add_call(&mut self, call: Call) -> AsgResult<NodeId> {
        self.add_node(NodeKind::Call(call))
    }

    pub fn add_var(&mut self, name: &str, role: VarRole, ty: ResultType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { id, kind: NodeKind::Var { name: name.to_string(), role, ty } });
        id
    }

    pub fn add_constant(&mut self, name: &str, value: ArrayD<f32>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { id, kind: NodeKind::Constant { name: name.to_string(), value } });
        id
    }

    pub fn set_output(&mut self, output: NodeId) {
        self.outputs = vec![output];
    }

    pub fn get_node(&self, id: NodeId) -> AsgResult<&Node> {
        self.nodes.get(id.0).ok_or(AsgError::NodeNotFound(id))
    }

    /// Checks that every node's id is its arena position. Graphs built
    /// through `add_*` always pass; deserialized ones may not.
    pub fn check_ids(&self) -> AsgResult<()> {
        match self.nodes.iter().enumerate().find(|(i, n)| n.id.0 != *i) {
            Some((position, node)) => Err(AsgError::MisplacedNode { position, id: node.id }),
            None => Ok(()),
        }
    }

    pub fn calls(&self) -> impl Iterator<Item = (&Node, &Call)> {
        self.nodes.iter().filter_map(|n| n.as_call().map(|c| (n, c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_node_rejects_forward_reference() {
        let mut asg = Asg::new("bad");
        let call = Call::new("relu", vec![NodeId(3)], ResultType::Tensor(vec![1]));
        assert_eq!(asg.add_call(call), Err(AsgError::NodeNotFound(NodeId(3))));
        assert!(asg.nodes.is_empty());
    }

    #[test]
    fn test_check_ids() {
        let mut asg = Asg::new("ids");
        let x = asg.add_var("x", VarRole::Input, ResultType::Tensor(vec![1]));
        asg.add_call(Call::new("nn.relu", vec![x], ResultType::Tensor(vec![1]))).unwrap();
        assert_eq!(asg.check_ids(), Ok(()));

        asg.nodes.swap(0, 1);
        assert_eq!(
            asg.check_ids(),
            Err(AsgError::MisplacedNode { position: 0, id: NodeId(1) })
        );
    }

    #[test]
    fn test_constant_declared_type() {
        let mut asg = Asg::new("c");
        let id = asg.add_constant("k", ArrayD::zeros(ndarray::IxDyn(&[2, 5])));
        assert_eq!(
            asg.get_node(id).unwrap().declared_type(),
            ResultType::Tensor(vec![2, 5])
        );
    }

    #[test]
    fn test_attr_coercion() {
        assert_eq!(Attr::Int(2).as_ints(), Some(vec![2]));
        assert_eq!(Attr::from((1, 2)).as_ints(), Some(vec![1, 2]));
        assert_eq!(Attr::Float(0.5).as_ints(), None);
        assert_eq!(Attr::from("NCHW").as_ints(), None);
    }

    #[test]
    fn test_result_type_display() {
        let ty = ResultType::Tuple(vec![
            ResultType::Tensor(vec![1, 3]),
            ResultType::Opaque("ref".to_string()),
        ]);
        assert_eq!(ty.to_string(), "(Tensor[1, 3], <ref>)");
    }
}
