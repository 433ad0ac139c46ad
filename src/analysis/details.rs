//! Per-run storage for what passes record: node details, summaries, anomalies.

use super::value::{FieldDecl, Value};
use super::{AnalysisError, AnalysisResult};
use crate::asg::{Asg, NodeId};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Fields recorded for one node, keyed by field name.
pub type NodeDetails = BTreeMap<String, Value>;

/// Whole-graph statistics, keyed by field name.
pub type Summary = BTreeMap<String, Value>;

/// Node details in visitation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailStore {
    entries: IndexMap<NodeId, NodeDetails>,
}

impl DetailStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: NodeId) -> Option<&NodeDetails> {
        self.entries.get(&node)
    }

    pub fn field(&self, node: NodeId, field: &str) -> Option<&Value> {
        self.entries.get(&node).and_then(|d| d.get(field))
    }

    /// Entries in the order their nodes were visited.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeDetails)> {
        self.entries.iter().map(|(id, d)| (*id, d))
    }

    /// Visitation position of a node.
    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.entries.get_index_of(&node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every field name recorded on at least one node.
    pub fn field_names(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .flat_map(|d| d.keys().map(String::as_str))
            .collect()
    }

    pub(crate) fn open(&mut self, node: NodeId) {
        self.entries.entry(node).or_default();
    }

    fn insert(&mut self, node: NodeId, field: &str, value: Value) {
        self.entries
            .entry(node)
            .or_default()
            .insert(field.to_string(), value);
    }
}

/// A non-fatal finding about one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub node: NodeId,
    pub pass: String,
    pub message: String,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.node, self.pass, self.message)
    }
}

/// Fields a pass may touch during a run.
#[derive(Debug, Clone)]
pub(crate) struct Access {
    pub pass: String,
    pub writes: Vec<FieldDecl>,
    pub reads: BTreeSet<String>,
}

impl Access {
    fn owns(&self, field: &str) -> Option<&FieldDecl> {
        self.writes.iter().find(|f| f.name == field)
    }

    fn check_read(&self, field: &str) -> AnalysisResult<()> {
        if self.owns(field).is_some() || self.reads.contains(field) {
            Ok(())
        } else {
            Err(AnalysisError::UndeclaredRead {
                pass: self.pass.clone(),
                field: field.to_string(),
            })
        }
    }
}

/// Handle a pass receives while visiting one node.
///
/// Writes go to the visited node only and must match the pass's field
/// declarations. Reads may target any node but only fields the pass owns or
/// declared as dependencies.
pub struct NodeContext<'a> {
    node: NodeId,
    asg: &'a Asg,
    access: &'a Access,
    store: &'a mut DetailStore,
    anomalies: &'a mut Vec<Anomaly>,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(
        node: NodeId,
        asg: &'a Asg,
        access: &'a Access,
        store: &'a mut DetailStore,
        anomalies: &'a mut Vec<Anomaly>,
    ) -> Self {
        Self { node, asg, access, store, anomalies }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn graph(&self) -> &'a Asg {
        self.asg
    }

    pub fn set(&mut self, field: &str, value: Value) -> AnalysisResult<()> {
        let decl = self.access.owns(field).ok_or_else(|| AnalysisError::UndeclaredWrite {
            pass: self.access.pass.clone(),
            field: field.to_string(),
        })?;
        if decl.kind != value.kind() {
            return Err(AnalysisError::KindMismatch {
                pass: self.access.pass.clone(),
                field: field.to_string(),
                expected: decl.kind,
                actual: value.kind(),
            });
        }
        self.store.insert(self.node, field, value);
        Ok(())
    }

    /// Reads a field of the node being visited.
    pub fn get(&self, field: &str) -> AnalysisResult<Option<&Value>> {
        self.get_for(self.node, field)
    }

    /// Reads a field recorded for another node, typically an argument.
    pub fn get_for(&self, node: NodeId, field: &str) -> AnalysisResult<Option<&Value>> {
        self.access.check_read(field)?;
        Ok(self.store.field(node, field))
    }

    /// Records a non-fatal finding for the visited node.
    pub fn anomaly(&mut self, message: impl Into<String>) {
        let anomaly = Anomaly {
            node: self.node,
            pass: self.access.pass.clone(),
            message: message.into(),
        };
        tracing::warn!(node = %anomaly.node, pass = %anomaly.pass, "{}", anomaly.message);
        self.anomalies.push(anomaly);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::value::ValueKind;

    fn access() -> Access {
        Access {
            pass: "checker".to_string(),
            writes: vec![FieldDecl::new("op", ValueKind::Str)],
            reads: BTreeSet::from(["index".to_string()]),
        }
    }

    #[test]
    fn test_write_checks_declaration_and_kind() {
        let asg = Asg::new("g");
        let access = access();
        let mut store = DetailStore::new();
        let mut anomalies = Vec::new();
        let mut cx = NodeContext::new(NodeId(0), &asg, &access, &mut store, &mut anomalies);

        assert!(cx.set("op", Value::from("add")).is_ok());
        assert!(matches!(
            cx.set("op", Value::Int(1)),
            Err(AnalysisError::KindMismatch { .. })
        ));
        assert!(matches!(
            cx.set("shape", Value::Int(1)),
            Err(AnalysisError::UndeclaredWrite { .. })
        ));
        assert_eq!(store.field(NodeId(0), "op"), Some(&Value::from("add")));
    }

    #[test]
    fn test_read_requires_declaration() {
        let asg = Asg::new("g");
        let access = access();
        let mut store = DetailStore::new();
        let mut anomalies = Vec::new();
        let cx = NodeContext::new(NodeId(0), &asg, &access, &mut store, &mut anomalies);

        assert_eq!(cx.get("index").unwrap(), None);
        assert!(matches!(
            cx.get("output_shape"),
            Err(AnalysisError::UndeclaredRead { .. })
        ));
    }

    #[test]
    fn test_anomaly_is_collected() {
        let asg = Asg::new("g");
        let access = access();
        let mut store = DetailStore::new();
        let mut anomalies = Vec::new();
        let mut cx = NodeContext::new(NodeId(4), &asg, &access, &mut store, &mut anomalies);
        cx.anomaly("odd type");

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].to_string(), "%4 [checker]: odd type");
    }

    #[test]
    fn test_field_names_union() {
        let mut store = DetailStore::new();
        store.open(NodeId(1));
        store.insert(NodeId(2), "op", Value::from("add"));
        store.insert(NodeId(3), "index", Value::Int(0));
        assert_eq!(store.len(), 3);
        assert_eq!(store.position(NodeId(2)), Some(1));
        assert_eq!(store.field_names(), BTreeSet::from(["index", "op"]));
    }
}
