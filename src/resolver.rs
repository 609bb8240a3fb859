//! Injection points for namespaces, variables and extension functions.
//!
//! The evaluator only sees the three traits below; maps and closures get
//! blanket implementations so callers can pass plain `HashMap`s. QNames in
//! variable and function position resolve through [`NamespaceResolver`]
//! with the empty URI for prefixless names.

use crate::dom::{DomNode, NodeKind, XML_NAMESPACE_URI, XMLNS_NAMESPACE_URI};
use crate::engine::Context;
use crate::error::XPathError;
use crate::value::Value;
use std::collections::HashMap;

pub trait NamespaceResolver {
    fn resolve_prefix(&self, prefix: &str) -> Option<String>;
}

impl NamespaceResolver for HashMap<String, String> {
    fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        self.get(prefix).cloned()
    }
}

/// Wraps a closure as a namespace resolver.
pub struct FnNamespaceResolver<F>(pub F);

impl<F: Fn(&str) -> Option<String>> NamespaceResolver for FnNamespaceResolver<F> {
    fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        (self.0)(prefix)
    }
}

/// The default resolver: walks the DOM ancestors of a node looking for
/// `xmlns`/`xmlns:prefix` declarations, with `xml` and `xmlns` hard-wired.
/// A document node is replaced by its root element before the walk.
pub struct NodeNamespaceResolver<N> {
    node: N,
}

impl<N> NodeNamespaceResolver<N> {
    pub fn new(node: N) -> Self {
        NodeNamespaceResolver { node }
    }
}

impl<'a, N: DomNode<'a>> NamespaceResolver for NodeNamespaceResolver<N> {
    fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        match prefix {
            "xml" => return Some(XML_NAMESPACE_URI.to_string()),
            "xmlns" => return Some(XMLNS_NAMESPACE_URI.to_string()),
            _ => {}
        }
        let mut current = match self.node.kind() {
            NodeKind::Element => Some(self.node.clone()),
            NodeKind::Document => self.node.children().find(|c| c.kind() == NodeKind::Element),
            NodeKind::Attribute => self.node.owner_element(),
            // Text, CDATA, comments and PIs resolve through the nearest
            // enclosing element.
            _ => {
                let mut ancestor = self.node.parent();
                while ancestor.as_ref().is_some_and(|n| n.kind() != NodeKind::Element) {
                    ancestor = ancestor.and_then(|n| n.parent());
                }
                ancestor
            }
        };
        while let Some(element) = current {
            if element.kind() != NodeKind::Element {
                break;
            }
            for attr in element.attributes() {
                let declared = if prefix.is_empty() {
                    attr.node_name() == "xmlns"
                } else {
                    attr.prefix() == Some("xmlns") && attr.local_name() == Some(prefix)
                };
                if declared {
                    let uri = attr.node_value().unwrap_or_default();
                    return if uri.is_empty() { None } else { Some(uri.to_string()) };
                }
            }
            current = element.parent();
        }
        None
    }
}

pub trait VariableResolver<N> {
    fn resolve_variable(&self, uri: &str, local: &str) -> Option<Value<N>>;
}

/// Variables keyed by `local` (empty URI) or `{uri}local`.
impl<'a, N: DomNode<'a>> VariableResolver<N> for HashMap<String, Value<N>> {
    fn resolve_variable(&self, uri: &str, local: &str) -> Option<Value<N>> {
        let key = if uri.is_empty() {
            local.to_string()
        } else {
            format!("{{{uri}}}{local}")
        };
        self.get(&key).cloned()
    }
}

/// A user-supplied function: receives the call context and the evaluated
/// arguments. `'f` is the lifetime of whatever the function borrows,
/// including the node type's document.
pub type DynFunction<'f, N> =
    Box<dyn Fn(&Context<'_, N>, Vec<Value<N>>) -> Result<Value<N>, XPathError> + 'f>;

pub trait FunctionResolver<N> {
    /// Returns `None` for names this resolver does not provide, which lets
    /// lookup fall through to the built-in library.
    fn call(
        &self,
        uri: &str,
        local: &str,
        ctx: &Context<'_, N>,
        args: Vec<Value<N>>,
    ) -> Option<Result<Value<N>, XPathError>>;
}

/// A registry of extension functions keyed by `local` or `{uri}local`.
/// Built-ins of the same name are shadowed.
pub struct FunctionLibrary<'f, N> {
    functions: HashMap<String, DynFunction<'f, N>>,
}

impl<'f, N> FunctionLibrary<'f, N> {
    pub fn new() -> Self {
        FunctionLibrary { functions: HashMap::new() }
    }

    pub fn insert(
        &mut self,
        name: &str,
        function: impl Fn(&Context<'_, N>, Vec<Value<N>>) -> Result<Value<N>, XPathError> + 'f,
    ) {
        self.functions.insert(name.to_string(), Box::new(function));
    }

    pub fn insert_ns(
        &mut self,
        uri: &str,
        name: &str,
        function: impl Fn(&Context<'_, N>, Vec<Value<N>>) -> Result<Value<N>, XPathError> + 'f,
    ) {
        self.functions
            .insert(format!("{{{uri}}}{name}"), Box::new(function));
    }
}

impl<'f, N> Default for FunctionLibrary<'f, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, 'f, N: DomNode<'a>> FunctionResolver<N> for FunctionLibrary<'f, N> {
    fn call(
        &self,
        uri: &str,
        local: &str,
        ctx: &Context<'_, N>,
        args: Vec<Value<N>>,
    ) -> Option<Result<Value<N>, XPathError>> {
        let key = if uri.is_empty() {
            local.to_string()
        } else {
            format!("{{{uri}}}{local}")
        };
        self.functions.get(&key).map(|f| f(ctx, args))
    }
}
