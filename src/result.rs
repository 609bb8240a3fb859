//! The DOM-3 `XPathResult` surface over an evaluated value.
//!
//! Callers request one of the ten DOM result types. Scalar requests coerce
//! through the value algebra; node requests require a node-set, with the
//! ordered flavours materialised in document order and the unordered ones
//! keeping insertion order. Accessors for a different flavour than the one
//! requested raise the DOM type error (code 52).

use crate::dom::{DomNode, XNode};
use crate::error::XPathError;
use crate::value::Value;

/// The DOM result type codes 0–9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Any = 0,
    Number = 1,
    String = 2,
    Boolean = 3,
    UnorderedNodeIterator = 4,
    OrderedNodeIterator = 5,
    UnorderedNodeSnapshot = 6,
    OrderedNodeSnapshot = 7,
    AnyUnorderedNode = 8,
    FirstOrderedNode = 9,
}

impl ResultType {
    pub fn from_code(code: u16) -> Result<Self, XPathError> {
        Ok(match code {
            0 => ResultType::Any,
            1 => ResultType::Number,
            2 => ResultType::String,
            3 => ResultType::Boolean,
            4 => ResultType::UnorderedNodeIterator,
            5 => ResultType::OrderedNodeIterator,
            6 => ResultType::UnorderedNodeSnapshot,
            7 => ResultType::OrderedNodeSnapshot,
            8 => ResultType::AnyUnorderedNode,
            9 => ResultType::FirstOrderedNode,
            other => return Err(XPathError::UnknownResultType(other)),
        })
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    fn is_iterator(self) -> bool {
        matches!(
            self,
            ResultType::UnorderedNodeIterator | ResultType::OrderedNodeIterator
        )
    }

    fn is_snapshot(self) -> bool {
        matches!(
            self,
            ResultType::UnorderedNodeSnapshot | ResultType::OrderedNodeSnapshot
        )
    }

    fn is_single_node(self) -> bool {
        matches!(self, ResultType::AnyUnorderedNode | ResultType::FirstOrderedNode)
    }

    fn wants_document_order(self) -> bool {
        matches!(
            self,
            ResultType::OrderedNodeIterator
                | ResultType::OrderedNodeSnapshot
                | ResultType::FirstOrderedNode
        )
    }
}

#[derive(Debug, Clone)]
enum ResultValue<N> {
    Number(f64),
    String(String),
    Boolean(bool),
    Nodes(Vec<XNode<N>>),
}

#[derive(Debug, Clone)]
pub struct XPathResult<N> {
    result_type: ResultType,
    value: ResultValue<N>,
    cursor: usize,
}

impl<'a, N: DomNode<'a>> XPathResult<N> {
    /// Wraps `value` as `requested`. [`ResultType::Any`] picks the type
    /// matching the value's variant.
    pub fn new(value: Value<N>, requested: ResultType) -> Result<Self, XPathError> {
        let result_type = match requested {
            ResultType::Any => match &value {
                Value::NodeSet(_) => ResultType::UnorderedNodeIterator,
                Value::String(_) => ResultType::String,
                Value::Number(_) => ResultType::Number,
                Value::Boolean(_) => ResultType::Boolean,
            },
            other => other,
        };
        let stored = match result_type {
            ResultType::Number => ResultValue::Number(value.number()),
            ResultType::String => ResultValue::String(value.string()),
            ResultType::Boolean => ResultValue::Boolean(value.boolean()),
            _ => {
                let set = value.node_set()?;
                let nodes = if result_type.wants_document_order() {
                    set.to_vec()
                } else {
                    set.unsorted().to_vec()
                };
                ResultValue::Nodes(nodes)
            }
        };
        Ok(XPathResult { result_type, value: stored, cursor: 0 })
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    pub fn number_value(&self) -> Result<f64, XPathError> {
        match &self.value {
            ResultValue::Number(n) if self.result_type == ResultType::Number => Ok(*n),
            _ => Err(XPathError::type_error("result is not a number")),
        }
    }

    pub fn string_value(&self) -> Result<&str, XPathError> {
        match &self.value {
            ResultValue::String(s) if self.result_type == ResultType::String => Ok(s),
            _ => Err(XPathError::type_error("result is not a string")),
        }
    }

    pub fn boolean_value(&self) -> Result<bool, XPathError> {
        match &self.value {
            ResultValue::Boolean(b) if self.result_type == ResultType::Boolean => Ok(*b),
            _ => Err(XPathError::type_error("result is not a boolean")),
        }
    }

    /// Advances the iterator flavours; `None` when exhausted.
    pub fn iterate_next(&mut self) -> Result<Option<XNode<N>>, XPathError> {
        if !self.result_type.is_iterator() {
            return Err(XPathError::type_error("result is not an iterator"));
        }
        let ResultValue::Nodes(nodes) = &self.value else {
            return Err(XPathError::type_error("result is not an iterator"));
        };
        let next = nodes.get(self.cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        Ok(next)
    }

    pub fn snapshot_length(&self) -> Result<usize, XPathError> {
        match &self.value {
            ResultValue::Nodes(nodes) if self.result_type.is_snapshot() => Ok(nodes.len()),
            _ => Err(XPathError::type_error("result is not a snapshot")),
        }
    }

    pub fn snapshot_item(&self, index: usize) -> Result<Option<XNode<N>>, XPathError> {
        match &self.value {
            ResultValue::Nodes(nodes) if self.result_type.is_snapshot() => {
                Ok(nodes.get(index).cloned())
            }
            _ => Err(XPathError::type_error("result is not a snapshot")),
        }
    }

    pub fn single_node_value(&self) -> Result<Option<XNode<N>>, XPathError> {
        match &self.value {
            ResultValue::Nodes(nodes) if self.result_type.is_single_node() => {
                Ok(nodes.first().cloned())
            }
            _ => Err(XPathError::type_error("result is not a single node")),
        }
    }
}
