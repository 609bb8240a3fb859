//! An owned, arena-backed document tree implementing [`DomNode`].
//!
//! This is the crate's bundled tree for hosts without a DOM of their own and
//! for tests. Nodes live in a flat `Vec` in document order; a [`NodeRef`] is
//! a copyable `(document, index)` handle. Trees are built with the
//! stack-based [`TreeBuilder`] and are immutable afterwards, matching the
//! engine's read-only view.

use super::{DomNode, NodeKind, XML_NAMESPACE_URI, XMLNS_NAMESPACE_URI};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    /// Qualified name for elements/attributes, target for PIs, "" otherwise.
    name: String,
    local: Option<String>,
    prefix: Option<String>,
    uri: Option<String>,
    value: Option<String>,
    parent: Option<usize>,
    children: Vec<usize>,
    attributes: Vec<usize>,
}

impl NodeData {
    fn new(kind: NodeKind, parent: Option<usize>) -> Self {
        NodeData {
            kind,
            name: String::new(),
            local: None,
            prefix: None,
            uri: None,
            value: None,
            parent,
            children: Vec::new(),
            attributes: Vec::new(),
        }
    }
}

/// An immutable document. Ids of non-attribute nodes are assigned in
/// document order; attribute ids follow the builder's call order, which may
/// interleave with children declared earlier. [`NodeRef::compare_position`]
/// only answers for pairs where id order is document order.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    html: bool,
}

impl Document {
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef { doc: self, id: 0 }
    }
}

/// A cheap handle to one node of a [`Document`].
#[derive(Clone, Copy)]
pub struct NodeRef<'d> {
    doc: &'d Document,
    id: usize,
}

impl<'d> NodeRef<'d> {
    fn data(&self) -> &'d NodeData {
        &self.doc.nodes[self.id]
    }

    fn at(&self, id: usize) -> NodeRef<'d> {
        NodeRef { doc: self.doc, id }
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef(#{} {:?} {})", self.id, self.data().kind, self.data().name)
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.doc, other.doc)
    }
}

impl Eq for NodeRef<'_> {}

impl Hash for NodeRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.doc as *const Document as usize).hash(state);
        self.id.hash(state);
    }
}

impl<'d> DomNode<'d> for NodeRef<'d> {
    fn kind(&self) -> NodeKind {
        self.data().kind
    }

    fn node_name(&self) -> String {
        match self.data().kind {
            NodeKind::Document => "#document".to_string(),
            NodeKind::DocumentFragment => "#document-fragment".to_string(),
            NodeKind::Text => "#text".to_string(),
            NodeKind::CData => "#cdata-section".to_string(),
            NodeKind::Comment => "#comment".to_string(),
            _ => self.data().name.clone(),
        }
    }

    fn local_name(&self) -> Option<&'d str> {
        self.data().local.as_deref()
    }

    fn prefix(&self) -> Option<&'d str> {
        self.data().prefix.as_deref()
    }

    fn namespace_uri(&self) -> Option<&'d str> {
        self.data().uri.as_deref()
    }

    fn node_value(&self) -> Option<&'d str> {
        self.data().value.as_deref()
    }

    fn parent(&self) -> Option<Self> {
        if self.data().kind == NodeKind::Attribute {
            return None;
        }
        self.data().parent.map(|id| self.at(id))
    }

    fn children(&self) -> Box<dyn Iterator<Item = Self> + 'd> {
        let doc = self.doc;
        Box::new(self.data().children.iter().map(move |&id| NodeRef { doc, id }))
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'd> {
        let doc = self.doc;
        Box::new(self.data().attributes.iter().map(move |&id| NodeRef { doc, id }))
    }

    fn owner_document(&self) -> Option<Self> {
        if self.id == 0 { None } else { Some(self.at(0)) }
    }

    fn owner_element(&self) -> Option<Self> {
        if self.data().kind == NodeKind::Attribute {
            self.data().parent.map(|id| self.at(id))
        } else {
            None
        }
    }

    fn compare_position(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if !std::ptr::eq(self.doc, other.doc) {
            return None;
        }
        let self_attr = self.data().kind == NodeKind::Attribute;
        let other_attr = other.data().kind == NodeKind::Attribute;
        // An attribute declared after a sibling child gets a larger id than
        // that child even though it precedes it in document order, so only
        // pairs with a guaranteed id order are answered here; the rest fall
        // back to the structural walk.
        match (self_attr, other_attr) {
            (false, false) => Some(self.id.cmp(&other.id)),
            (true, true) if self.data().parent == other.data().parent => {
                Some(self.id.cmp(&other.id))
            }
            _ => None,
        }
    }

    fn is_html_document(&self) -> bool {
        self.doc.html
    }
}

/// Builds a [`Document`] with open/close element nesting.
///
/// Namespace URIs are resolved once at [`TreeBuilder::finish`] from the
/// `xmlns`/`xmlns:*` attributes in scope, the way a parser would populate a
/// DOM, so tests only declare bindings.
pub struct TreeBuilder {
    nodes: Vec<NodeData>,
    stack: Vec<usize>,
    html: bool,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder {
            nodes: vec![NodeData::new(NodeKind::Document, None)],
            stack: vec![0],
            html: false,
        }
    }

    fn current(&self) -> usize {
        *self.stack.last().expect("builder stack underflow")
    }

    fn push_child(&mut self, mut data: NodeData) -> usize {
        let parent = self.current();
        data.parent = Some(parent);
        let id = self.nodes.len();
        self.nodes.push(data);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn open(&mut self, name: &str) -> &mut Self {
        let mut data = NodeData::new(NodeKind::Element, None);
        let (prefix, local) = split_qname(name);
        data.name = name.to_string();
        data.prefix = prefix;
        data.local = Some(local);
        let id = self.push_child(data);
        self.stack.push(id);
        self
    }

    pub fn close(&mut self) -> &mut Self {
        assert!(self.stack.len() > 1, "close() without matching open()");
        self.stack.pop();
        self
    }

    pub fn attr(&mut self, name: &str, value: &str) -> &mut Self {
        let element = self.current();
        assert!(
            self.nodes[element].kind == NodeKind::Element,
            "attr() outside an element"
        );
        let mut data = NodeData::new(NodeKind::Attribute, Some(element));
        let (prefix, local) = split_qname(name);
        data.name = name.to_string();
        data.prefix = prefix;
        data.local = Some(local);
        data.value = Some(value.to_string());
        let id = self.nodes.len();
        self.nodes.push(data);
        self.nodes[element].attributes.push(id);
        self
    }

    pub fn text(&mut self, content: &str) -> &mut Self {
        let mut data = NodeData::new(NodeKind::Text, None);
        data.value = Some(content.to_string());
        self.push_child(data);
        self
    }

    pub fn cdata(&mut self, content: &str) -> &mut Self {
        let mut data = NodeData::new(NodeKind::CData, None);
        data.value = Some(content.to_string());
        self.push_child(data);
        self
    }

    pub fn comment(&mut self, content: &str) -> &mut Self {
        let mut data = NodeData::new(NodeKind::Comment, None);
        data.value = Some(content.to_string());
        self.push_child(data);
        self
    }

    pub fn pi(&mut self, target: &str, content: &str) -> &mut Self {
        let mut data = NodeData::new(NodeKind::ProcessingInstruction, None);
        data.name = target.to_string();
        data.value = Some(content.to_string());
        self.push_child(data);
        self
    }

    /// Marks the document as HTML, enabling case-insensitive name tests by
    /// default when it is queried.
    pub fn html(&mut self, html: bool) -> &mut Self {
        self.html = html;
        self
    }

    pub fn finish(mut self) -> Document {
        self.resolve_namespaces();
        Document { nodes: self.nodes, html: self.html }
    }

    fn resolve_namespaces(&mut self) {
        let mut resolved = Vec::new();
        for id in 0..self.nodes.len() {
            let node = &self.nodes[id];
            let uri = match node.kind {
                NodeKind::Element => {
                    lookup_uri(&self.nodes, id, node.prefix.as_deref(), true)
                }
                NodeKind::Attribute => {
                    if node.name == "xmlns" || node.prefix.as_deref() == Some("xmlns") {
                        Some(XMLNS_NAMESPACE_URI.to_string())
                    } else {
                        match node.prefix.as_deref() {
                            Some(p) => {
                                lookup_uri(&self.nodes, node.parent.unwrap_or(0), Some(p), false)
                            }
                            None => None,
                        }
                    }
                }
                _ => None,
            };
            if uri.is_some() {
                resolved.push((id, uri));
            }
        }
        for (id, uri) in resolved {
            self.nodes[id].uri = uri;
        }
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn split_qname(name: &str) -> (Option<String>, String) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, name.to_string()),
    }
}

/// Walks from `start` to the root looking for an in-scope binding of
/// `prefix`. The default binding (`prefix == None`) only applies to element
/// names.
fn lookup_uri(
    nodes: &[NodeData],
    start: usize,
    prefix: Option<&str>,
    default_applies: bool,
) -> Option<String> {
    match prefix {
        Some("xml") => return Some(XML_NAMESPACE_URI.to_string()),
        Some("xmlns") => return Some(XMLNS_NAMESPACE_URI.to_string()),
        None if !default_applies => return None,
        _ => {}
    }
    let mut cur = Some(start);
    while let Some(id) = cur {
        let node = &nodes[id];
        if node.kind != NodeKind::Element {
            break;
        }
        for &attr_id in &node.attributes {
            let attr = &nodes[attr_id];
            let declared = match prefix {
                Some(p) => attr.prefix.as_deref() == Some("xmlns") && attr.local.as_deref() == Some(p),
                None => attr.name == "xmlns",
            };
            if declared {
                let value = attr.value.clone().unwrap_or_default();
                return if value.is_empty() { None } else { Some(value) };
            }
        }
        cur = node.parent;
    }
    None
}
