//! The read-only capability view of a host document tree.
//!
//! The engine is written exclusively against the [`DomNode`] trait, so any
//! tree shape (a third-party XML DOM, an HTML DOM, the bundled
//! [`tree::Document`]) can be queried as long as it exposes the navigation
//! and naming operations below. Namespace nodes do not exist in host trees;
//! the engine synthesises them on demand as [`NamespaceNode`] and carries
//! both flavours in [`XNode`].

use std::fmt;
use std::hash::Hash;

pub mod tree;

pub const XML_NAMESPACE_URI: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_NAMESPACE_URI: &str = "http://www.w3.org/2000/xmlns/";

/// The kind of a node, aligned with the XPath 1.0 data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,
    Attribute,
    Text,
    CData,
    ProcessingInstruction,
    Comment,
    Document,
    DocumentType,
    DocumentFragment,
    /// Synthetic; never reported by a host tree.
    Namespace,
}

/// The universal contract for a node in a read-only, hierarchical document.
///
/// `'a` is the lifetime of the underlying document storage. Implementations
/// are handles (cheap to clone, compared and hashed by node identity).
pub trait DomNode<'a>: fmt::Debug + Clone + PartialEq + Eq + Hash + 'a {
    fn kind(&self) -> NodeKind;

    /// The DOM node name: qualified name for elements and attributes, the
    /// target for processing instructions, `#text`/`#comment`/... otherwise.
    fn node_name(&self) -> String;

    fn local_name(&self) -> Option<&'a str>;

    fn prefix(&self) -> Option<&'a str>;

    fn namespace_uri(&self) -> Option<&'a str>;

    /// Attribute value, text/CDATA content, comment content, PI data.
    fn node_value(&self) -> Option<&'a str>;

    /// The DOM parent. `None` for the document and for attribute nodes
    /// (attributes hang off their element via [`DomNode::owner_element`]).
    fn parent(&self) -> Option<Self>;

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    fn owner_document(&self) -> Option<Self>;

    /// For attribute nodes, the element carrying the attribute.
    fn owner_element(&self) -> Option<Self>;

    fn next_sibling(&self) -> Option<Self> {
        let parent = self.parent()?;
        let mut found = false;
        for child in parent.children() {
            if found {
                return Some(child);
            }
            if child == *self {
                found = true;
            }
        }
        None
    }

    fn previous_sibling(&self) -> Option<Self> {
        let parent = self.parent()?;
        let mut previous = None;
        for child in parent.children() {
            if child == *self {
                return previous;
            }
            previous = Some(child);
        }
        None
    }

    /// Optional host accelerator for document-order comparison, mirroring
    /// DOM's `compareDocumentPosition`. `None` falls back to the generic
    /// structural walk in [`crate::nodeset::document_order`].
    fn compare_position(&self, _other: &Self) -> Option<std::cmp::Ordering> {
        None
    }

    /// `getAttributeNS`: the value of the attribute with this expanded
    /// name, if present. The fallback scans the attribute list.
    fn attribute_ns(&self, uri: Option<&str>, local: &str) -> Option<String> {
        for attr in self.attributes() {
            if attr.namespace_uri() == uri && attr.local_name() == Some(local) {
                return attr.node_value().map(str::to_string);
            }
        }
        None
    }

    /// Optional host accelerator for `id()`. The fallback is a depth-first
    /// scan for attributes named `id`.
    fn element_by_id(&self, id: &str) -> Option<Self> {
        let root = self.owner_document().unwrap_or_else(|| self.clone());
        let mut stack: Vec<Self> = root.children().collect();
        while let Some(node) = stack.pop() {
            if node.kind() == NodeKind::Element {
                for attr in node.attributes() {
                    if attr.prefix().is_none()
                        && attr.local_name() == Some("id")
                        && attr.node_value() == Some(id)
                    {
                        return Some(node);
                    }
                }
            }
            stack.extend(node.children());
        }
        None
    }

    /// Mirrors `implementation.hasFeature("HTML", "2.0")`; absent hosts are
    /// treated as XML.
    fn is_html_document(&self) -> bool {
        false
    }

    /// The XPath string value. Containers concatenate descendant text and
    /// CDATA content in document order; everything else is the node value.
    fn string_value(&self) -> String {
        match self.kind() {
            NodeKind::Element | NodeKind::Document | NodeKind::DocumentFragment => {
                let mut out = String::new();
                collect_text(self, &mut out);
                out
            }
            _ => self.node_value().unwrap_or_default().to_string(),
        }
    }
}

fn collect_text<'a, N: DomNode<'a>>(node: &N, out: &mut String) {
    for child in node.children() {
        match child.kind() {
            NodeKind::Text | NodeKind::CData => {
                if let Some(v) = child.node_value() {
                    out.push_str(v);
                }
            }
            NodeKind::Element => collect_text(&child, out),
            _ => {}
        }
    }
}

/// A namespace binding in scope on `owner`, materialised for the
/// `namespace::` axis. Re-created per query; never part of the host tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceNode<N> {
    pub prefix: String,
    pub uri: String,
    pub owner: N,
}

/// A node as seen by the evaluator: either a host node or a synthetic
/// namespace node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum XNode<N> {
    Dom(N),
    Namespace(NamespaceNode<N>),
}

impl<'a, N: DomNode<'a>> XNode<N> {
    pub fn kind(&self) -> NodeKind {
        match self {
            XNode::Dom(n) => n.kind(),
            XNode::Namespace(_) => NodeKind::Namespace,
        }
    }

    pub fn as_dom(&self) -> Option<&N> {
        match self {
            XNode::Dom(n) => Some(n),
            XNode::Namespace(_) => None,
        }
    }

    pub fn node_name(&self) -> String {
        match self {
            XNode::Dom(n) => n.node_name(),
            XNode::Namespace(ns) => ns.prefix.clone(),
        }
    }

    /// The local part of the expanded name; a namespace node's local name is
    /// its prefix.
    pub fn local_name(&self) -> Option<String> {
        match self {
            XNode::Dom(n) => n.local_name().map(str::to_string),
            XNode::Namespace(ns) => Some(ns.prefix.clone()),
        }
    }

    pub fn namespace_uri(&self) -> Option<String> {
        match self {
            XNode::Dom(n) => n.namespace_uri().map(str::to_string),
            XNode::Namespace(_) => None,
        }
    }

    /// The XPath parent: owner element for attributes and namespace nodes,
    /// the DOM parent otherwise.
    pub fn parent(&self) -> Option<XNode<N>> {
        match self {
            XNode::Dom(n) => match n.kind() {
                NodeKind::Attribute => n.owner_element().or_else(|| n.parent()).map(XNode::Dom),
                _ => n.parent().map(XNode::Dom),
            },
            XNode::Namespace(ns) => Some(XNode::Dom(ns.owner.clone())),
        }
    }

    pub fn is_attribute_like(&self) -> bool {
        matches!(self.kind(), NodeKind::Attribute | NodeKind::Namespace)
    }

    pub fn string_value(&self) -> String {
        match self {
            XNode::Dom(n) => n.string_value(),
            XNode::Namespace(ns) => ns.uri.clone(),
        }
    }
}
