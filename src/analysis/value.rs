//! Typed values recorded by analysis passes.

use crate::asg::ResultType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A detail or summary value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Str(String),
    Seq(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// Kind tag of a [`Value`], used by field declarations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Int,
    Str,
    Seq,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Int => "int",
            ValueKind::Str => "str",
            ValueKind::Seq => "seq",
            ValueKind::Map => "map",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Str(_) => ValueKind::Str,
            Value::Seq(_) => ValueKind::Seq,
            Value::Map(_) => ValueKind::Map,
        }
    }

    pub fn from_ints(values: impl IntoIterator<Item = i64>) -> Self {
        Value::Seq(values.into_iter().map(Value::Int).collect())
    }

    /// Flattens a result type into nested integer sequences.
    ///
    /// Tensors become `[d0, d1, ...]`, tuples become a sequence of their
    /// fields. Returns `None` as soon as an opaque type is met anywhere.
    pub fn from_result_type(ty: &ResultType) -> Option<Self> {
        match ty {
            ResultType::Tensor(shape) => Some(Value::from_ints(shape.iter().map(|&d| d as i64))),
            ResultType::Tuple(fields) => fields
                .iter()
                .map(Value::from_result_type)
                .collect::<Option<Vec<_>>>()
                .map(Value::Seq),
            ResultType::Opaque(_) => None,
        }
    }

    /// Looks up a nested element: sequences by position, maps by the
    /// decimal form of the index.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Value::Seq(items) => items.get(index),
            Value::Map(entries) => entries.get(&index.to_string()),
            Value::Int(_) | Value::Str(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Str(s) => f.write_str(s),
            Value::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, item)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// A detail field a pass owns, with the kind of value it records there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub kind: ValueKind,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self { name: name.into(), kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_flattening() {
        let v = Value::from_result_type(&ResultType::Tensor(vec![1, 3])).unwrap();
        assert_eq!(v, Value::from_ints([1, 3]));
        assert_eq!(v.to_string(), "[1, 3]");
    }

    #[test]
    fn test_tuple_flattening() {
        let ty = ResultType::Tuple(vec![ResultType::Tensor(vec![2]), ResultType::Tensor(vec![])]);
        let v = Value::from_result_type(&ty).unwrap();
        assert_eq!(v.to_string(), "[[2], []]");
    }

    #[test]
    fn test_opaque_inside_tuple_is_rejected() {
        let ty = ResultType::Tuple(vec![
            ResultType::Tensor(vec![2]),
            ResultType::Opaque("func".to_string()),
        ]);
        assert_eq!(Value::from_result_type(&ty), None);
    }

    #[test]
    fn test_at_resolves_seq_and_map() {
        let seq = Value::from_ints([4, 5]);
        assert_eq!(seq.at(1), Some(&Value::Int(5)));
        assert_eq!(seq.at(2), None);

        let mut entries = BTreeMap::new();
        entries.insert("1".to_string(), Value::Int(7));
        let map = Value::Map(entries);
        assert_eq!(map.at(1), Some(&Value::Int(7)));
        assert_eq!(map.at(0), None);
        assert_eq!(Value::Int(3).at(0), None);
    }
}
