//! Node generation for the thirteen XPath axes.
//!
//! Each collector appends the candidate sequence for one context node in
//! axis order: forward axes in document order, reverse axes nearest-first.
//! Positional predicates rely on that ordering; the final document-order
//! normalisation happens later in the node-set.

use crate::ast::Axis;
use crate::dom::{DomNode, NamespaceNode, NodeKind, XML_NAMESPACE_URI, XNode};
use std::collections::HashSet;

pub fn collect<'a, N: DomNode<'a>>(
    axis: Axis,
    node: &XNode<N>,
    virtual_root: Option<&N>,
    out: &mut Vec<XNode<N>>,
) {
    match axis {
        Axis::SelfAxis => out.push(node.clone()),
        Axis::Child => collect_children(node, out),
        Axis::Attribute => collect_attributes(node, out),
        Axis::Parent => collect_parent(node, virtual_root, out),
        Axis::Ancestor => collect_ancestors(node, virtual_root, out),
        Axis::AncestorOrSelf => {
            out.push(node.clone());
            collect_ancestors(node, virtual_root, out);
        }
        Axis::Descendant => collect_descendants(node, out),
        Axis::DescendantOrSelf => {
            out.push(node.clone());
            collect_descendants(node, out);
        }
        Axis::FollowingSibling => collect_following_siblings(node, out),
        Axis::PrecedingSibling => collect_preceding_siblings(node, out),
        Axis::Following => collect_following(node, virtual_root, out),
        Axis::Preceding => collect_preceding(node, virtual_root, out),
        Axis::Namespace => collect_namespaces(node, out),
    }
}

fn collect_children<'a, N: DomNode<'a>>(node: &XNode<N>, out: &mut Vec<XNode<N>>) {
    if let XNode::Dom(n) = node {
        if n.kind() != NodeKind::Attribute {
            out.extend(n.children().map(XNode::Dom));
        }
    }
}

fn collect_attributes<'a, N: DomNode<'a>>(node: &XNode<N>, out: &mut Vec<XNode<N>>) {
    if let XNode::Dom(n) = node {
        if n.kind() == NodeKind::Element {
            out.extend(n.attributes().map(XNode::Dom));
        }
    }
}

fn collect_parent<'a, N: DomNode<'a>>(
    node: &XNode<N>,
    virtual_root: Option<&N>,
    out: &mut Vec<XNode<N>>,
) {
    if at_virtual_root(node, virtual_root) {
        return;
    }
    if let Some(parent) = node.parent() {
        out.push(parent);
    }
}

/// Nearest-first; the virtual root is included as the final sentinel.
fn collect_ancestors<'a, N: DomNode<'a>>(
    node: &XNode<N>,
    virtual_root: Option<&N>,
    out: &mut Vec<XNode<N>>,
) {
    if at_virtual_root(node, virtual_root) {
        return;
    }
    let mut current = node.parent();
    while let Some(parent) = current {
        out.push(parent.clone());
        if at_virtual_root(&parent, virtual_root) {
            break;
        }
        current = parent.parent();
    }
}

/// Pre-order, i.e. document order.
fn collect_descendants<'a, N: DomNode<'a>>(node: &XNode<N>, out: &mut Vec<XNode<N>>) {
    if let XNode::Dom(n) = node {
        if n.kind() != NodeKind::Attribute {
            descend(n, out);
        }
    }
}

fn descend<'a, N: DomNode<'a>>(node: &N, out: &mut Vec<XNode<N>>) {
    for child in node.children() {
        out.push(XNode::Dom(child.clone()));
        descend(&child, out);
    }
}

fn collect_following_siblings<'a, N: DomNode<'a>>(node: &XNode<N>, out: &mut Vec<XNode<N>>) {
    let XNode::Dom(n) = node else { return };
    if node.is_attribute_like() {
        return;
    }
    let mut current = n.next_sibling();
    while let Some(sibling) = current {
        out.push(XNode::Dom(sibling.clone()));
        current = sibling.next_sibling();
    }
}

/// Nearest-first.
fn collect_preceding_siblings<'a, N: DomNode<'a>>(node: &XNode<N>, out: &mut Vec<XNode<N>>) {
    let XNode::Dom(n) = node else { return };
    if node.is_attribute_like() {
        return;
    }
    let mut current = n.previous_sibling();
    while let Some(sibling) = current {
        out.push(XNode::Dom(sibling.clone()));
        current = sibling.previous_sibling();
    }
}

/// Everything after the node in document order, minus its own descendants.
/// For attribute and namespace nodes the owning element's content follows
/// the node, so the walk starts inside the owner.
fn collect_following<'a, N: DomNode<'a>>(
    node: &XNode<N>,
    virtual_root: Option<&N>,
    out: &mut Vec<XNode<N>>,
) {
    let mut anchor: N = match node {
        XNode::Dom(n) if n.kind() == NodeKind::Attribute => {
            let Some(owner) = n.owner_element() else { return };
            descend(&owner, out);
            owner
        }
        XNode::Dom(n) => n.clone(),
        XNode::Namespace(ns) => {
            descend(&ns.owner, out);
            ns.owner.clone()
        }
    };
    loop {
        let mut sibling = anchor.next_sibling();
        while let Some(s) = sibling {
            out.push(XNode::Dom(s.clone()));
            descend(&s, out);
            sibling = s.next_sibling();
        }
        if virtual_root == Some(&anchor) {
            break;
        }
        match anchor.parent() {
            Some(parent) => anchor = parent,
            None => break,
        }
    }
}

/// Everything before the node in reverse document order, minus ancestors.
fn collect_preceding<'a, N: DomNode<'a>>(
    node: &XNode<N>,
    virtual_root: Option<&N>,
    out: &mut Vec<XNode<N>>,
) {
    let mut anchor: Option<N> = match node {
        XNode::Dom(n) if n.kind() == NodeKind::Attribute => n.owner_element(),
        XNode::Dom(n) => Some(n.clone()),
        XNode::Namespace(ns) => Some(ns.owner.clone()),
    };
    while let Some(current) = anchor {
        let mut sibling = current.previous_sibling();
        while let Some(s) = sibling {
            let mut subtree = vec![XNode::Dom(s.clone())];
            descend(&s, &mut subtree);
            out.extend(subtree.into_iter().rev());
            sibling = s.previous_sibling();
        }
        if virtual_root == Some(&current) {
            break;
        }
        anchor = current.parent();
    }
}

/// Materialises the in-scope namespace bindings of an element: every
/// `xmlns`/`xmlns:*` declaration on the element or an ancestor, closest
/// declaration winning per prefix, plus the implicit `xml` binding (first).
/// `xmlns=""` removes the default binding for the subtree.
fn collect_namespaces<'a, N: DomNode<'a>>(node: &XNode<N>, out: &mut Vec<XNode<N>>) {
    let XNode::Dom(element) = node else { return };
    if element.kind() != NodeKind::Element {
        return;
    }
    let mut seen: HashSet<String> = HashSet::new();
    let mut bindings: Vec<(String, String)> = Vec::new();
    let mut current = Some(element.clone());
    while let Some(e) = current {
        if e.kind() != NodeKind::Element {
            break;
        }
        for attr in e.attributes() {
            let name = attr.node_name();
            let prefix = if name == "xmlns" {
                Some(String::new())
            } else {
                name.strip_prefix("xmlns:").map(str::to_string)
            };
            let Some(prefix) = prefix else { continue };
            if seen.insert(prefix.clone()) {
                let uri = attr.node_value().unwrap_or_default();
                // An empty URI is an undeclaration; `seen` shadows any
                // outer binding of the prefix.
                if !uri.is_empty() && prefix != "xml" {
                    bindings.push((prefix, uri.to_string()));
                }
            }
        }
        current = e.parent();
    }
    out.push(XNode::Namespace(NamespaceNode {
        prefix: "xml".to_string(),
        uri: XML_NAMESPACE_URI.to_string(),
        owner: element.clone(),
    }));
    for (prefix, uri) in bindings {
        out.push(XNode::Namespace(NamespaceNode {
            prefix,
            uri,
            owner: element.clone(),
        }));
    }
}

fn at_virtual_root<'a, N: DomNode<'a>>(node: &XNode<N>, virtual_root: Option<&N>) -> bool {
    match (node, virtual_root) {
        (XNode::Dom(n), Some(vr)) => n == vr,
        _ => false,
    }
}
