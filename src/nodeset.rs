//! Duplicate-free node collections with a document-ordered view.
//!
//! A [`NodeSet`] keeps nodes in insertion order and builds an AVL index
//! keyed by document order lazily, the first time a sorted view is asked
//! for. The dominant access pattern — nodes arriving roughly in document
//! order — degenerates the tree into cheap, rotation-light inserts.

use crate::dom::{DomNode, NodeKind, XML_NAMESPACE_URI, XNode};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub struct NodeSet<N> {
    items: Vec<XNode<N>>,
    seen: HashSet<XNode<N>>,
    ordered: RefCell<Option<Vec<XNode<N>>>>,
}

impl<'a, N: DomNode<'a>> NodeSet<N> {
    pub fn new() -> Self {
        NodeSet {
            items: Vec::new(),
            seen: HashSet::new(),
            ordered: RefCell::new(None),
        }
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = XNode<N>>) -> Self {
        let mut set = Self::new();
        set.add_all(nodes);
        set
    }

    /// Appends a node unless it is already present. Invalidates the sorted
    /// view.
    pub fn add(&mut self, node: XNode<N>) {
        if self.seen.insert(node.clone()) {
            self.items.push(node);
            *self.ordered.borrow_mut() = None;
        }
    }

    pub fn add_all(&mut self, nodes: impl IntoIterator<Item = XNode<N>>) {
        for node in nodes {
            self.add(node);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, node: &XNode<N>) -> bool {
        self.seen.contains(node)
    }

    /// The nodes in insertion order.
    pub fn unsorted(&self) -> &[XNode<N>] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, XNode<N>> {
        self.items.iter()
    }

    /// The nodes in document order. Built lazily and cached until the next
    /// mutation.
    pub fn to_vec(&self) -> Vec<XNode<N>> {
        if let Some(sorted) = self.ordered.borrow().as_ref() {
            return sorted.clone();
        }
        let mut root: Link<N> = None;
        for item in &self.items {
            root = Some(avl_insert(root, item.clone()));
        }
        let mut out = Vec::with_capacity(self.items.len());
        in_order(&root, &mut out);
        *self.ordered.borrow_mut() = Some(out.clone());
        out
    }

    /// The lowest node in document order.
    pub fn first(&self) -> Option<XNode<N>> {
        self.to_vec().into_iter().next()
    }

    /// The string value of the set: the string value of its first node, or
    /// empty when the set is empty.
    pub fn string_value(&self) -> String {
        self.first().map(|n| n.string_value()).unwrap_or_default()
    }
}

impl<'a, N: DomNode<'a>> Default for NodeSet<N> {
    fn default() -> Self {
        Self::new()
    }
}

// --- AVL index keyed by document order ---

type Link<N> = Option<Box<AvlNode<N>>>;

#[derive(Debug, Clone)]
struct AvlNode<N> {
    item: XNode<N>,
    left: Link<N>,
    right: Link<N>,
    depth: u32,
}

fn avl_insert<'a, N: DomNode<'a>>(link: Link<N>, item: XNode<N>) -> Box<AvlNode<N>> {
    let mut node = match link {
        None => {
            return Box::new(AvlNode { item, left: None, right: None, depth: 1 });
        }
        Some(node) => node,
    };
    match document_order(&item, &node.item) {
        // Already present; the set deduplicates by identity.
        Ordering::Equal => node,
        Ordering::Less => {
            node.left = Some(avl_insert(node.left.take(), item));
            rebalance(node)
        }
        Ordering::Greater => {
            node.right = Some(avl_insert(node.right.take(), item));
            rebalance(node)
        }
    }
}

fn link_depth<N>(link: &Link<N>) -> u32 {
    link.as_ref().map_or(0, |n| n.depth)
}

fn update_depth<N>(node: &mut AvlNode<N>) {
    node.depth = 1 + link_depth(&node.left).max(link_depth(&node.right));
}

fn rebalance<N>(mut node: Box<AvlNode<N>>) -> Box<AvlNode<N>> {
    update_depth(&mut node);
    let balance = link_depth(&node.left) as i64 - link_depth(&node.right) as i64;
    if balance > 1 {
        // LR: rotate the left child left first, then the plain LL rotation.
        let left = node.left.as_ref().expect("left-heavy node without left child");
        if link_depth(&left.right) > link_depth(&left.left) {
            let child = node.left.take().expect("checked above");
            node.left = Some(rotate_left(child));
        }
        rotate_right(node)
    } else if balance < -1 {
        let right = node.right.as_ref().expect("right-heavy node without right child");
        if link_depth(&right.left) > link_depth(&right.right) {
            let child = node.right.take().expect("checked above");
            node.right = Some(rotate_right(child));
        }
        rotate_left(node)
    } else {
        node
    }
}

fn rotate_right<N>(mut node: Box<AvlNode<N>>) -> Box<AvlNode<N>> {
    let mut pivot = node.left.take().expect("rotate_right without left child");
    node.left = pivot.right.take();
    update_depth(&mut node);
    pivot.right = Some(node);
    update_depth(&mut pivot);
    pivot
}

fn rotate_left<N>(mut node: Box<AvlNode<N>>) -> Box<AvlNode<N>> {
    let mut pivot = node.right.take().expect("rotate_left without right child");
    node.right = pivot.left.take();
    update_depth(&mut node);
    pivot.left = Some(node);
    update_depth(&mut pivot);
    pivot
}

fn in_order<N: Clone>(link: &Link<N>, out: &mut Vec<XNode<N>>) {
    if let Some(node) = link {
        in_order(&node.left, out);
        out.push(node.item.clone());
        in_order(&node.right, out);
    }
}

// --- Document-order comparison ---

/// Compares two nodes by document order.
///
/// The host's `compare_position` hook is honoured first; otherwise the
/// generic walk climbs both parent chains to depth parity, detects
/// ancestorship (an ancestor precedes its descendants), and finally orders
/// the two diverging siblings under their common parent. Attribute-like
/// nodes precede children; namespace nodes precede attributes, with the
/// `xml` binding first among them. Nodes of disconnected trees get an
/// arbitrary but stable order.
pub fn document_order<'a, N: DomNode<'a>>(a: &XNode<N>, b: &XNode<N>) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if let (XNode::Dom(x), XNode::Dom(y)) = (a, b) {
        if let Some(ordering) = x.compare_position(y) {
            return ordering;
        }
    }

    let depth_a = xpath_depth(a);
    let depth_b = xpath_depth(b);
    let mut x = a.clone();
    let mut y = b.clone();
    for _ in depth_b..depth_a {
        match x.parent() {
            Some(p) => x = p,
            None => break,
        }
    }
    for _ in depth_a..depth_b {
        match y.parent() {
            Some(p) => y = p,
            None => break,
        }
    }
    if x == y {
        // The shallower node is an ancestor of the deeper one.
        return if depth_a < depth_b { Ordering::Less } else { Ordering::Greater };
    }

    loop {
        match (x.parent(), y.parent()) {
            (Some(px), Some(py)) => {
                if px == py {
                    return sibling_order(&px, &x, &y);
                }
                x = px;
                y = py;
            }
            _ => {
                // Disconnected trees: stable per-process fallback.
                return stable_hash(&x).cmp(&stable_hash(&y)).then(Ordering::Less);
            }
        }
    }
}

fn xpath_depth<'a, N: DomNode<'a>>(node: &XNode<N>) -> usize {
    let mut depth = 0;
    let mut current = node.clone();
    while let Some(parent) = current.parent() {
        depth += 1;
        current = parent;
    }
    depth
}

fn attribute_rank<'a, N: DomNode<'a>>(node: &XNode<N>) -> u8 {
    match node.kind() {
        NodeKind::Namespace => 0,
        NodeKind::Attribute => 1,
        _ => 2,
    }
}

fn sibling_order<'a, N: DomNode<'a>>(parent: &XNode<N>, x: &XNode<N>, y: &XNode<N>) -> Ordering {
    let rank_x = attribute_rank(x);
    let rank_y = attribute_rank(y);
    if rank_x != rank_y {
        return rank_x.cmp(&rank_y);
    }
    match (x, y) {
        (XNode::Namespace(nx), XNode::Namespace(ny)) => {
            let xml_x = nx.uri == XML_NAMESPACE_URI;
            let xml_y = ny.uri == XML_NAMESPACE_URI;
            match (xml_x, xml_y) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => nx.prefix.cmp(&ny.prefix),
            }
        }
        _ => {
            let element = match parent.as_dom() {
                Some(e) => e,
                None => return Ordering::Equal,
            };
            let scan_attributes = x.kind() == NodeKind::Attribute;
            let list: Box<dyn Iterator<Item = N> + 'a> = if scan_attributes {
                element.attributes()
            } else {
                element.children()
            };
            for sibling in list {
                if Some(&sibling) == x.as_dom() {
                    return Ordering::Less;
                }
                if Some(&sibling) == y.as_dom() {
                    return Ordering::Greater;
                }
            }
            Ordering::Equal
        }
    }
}

fn stable_hash<'a, N: DomNode<'a>>(node: &XNode<N>) -> u64 {
    let mut hasher = DefaultHasher::new();
    node.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::tree::{Document, NodeRef, TreeBuilder};

    fn sample() -> Document {
        let mut b = TreeBuilder::new();
        b.open("root");
        b.open("a");
        b.attr("id", "x");
        b.open("b");
        b.close();
        b.open("b");
        b.close();
        b.close();
        b.open("c");
        b.close();
        b.close();
        b.finish()
    }

    fn descendants<'d>(doc: &'d Document) -> Vec<NodeRef<'d>> {
        let mut out = Vec::new();
        let mut stack = vec![doc.root()];
        while let Some(node) = stack.pop() {
            out.push(node);
            let children: Vec<_> = node.children().collect();
            for child in children.into_iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    #[test]
    fn test_dedup() {
        let doc = sample();
        let nodes = descendants(&doc);
        let mut set = NodeSet::new();
        for node in &nodes {
            set.add(XNode::Dom(*node));
            set.add(XNode::Dom(*node));
        }
        assert_eq!(set.len(), nodes.len());
        assert_eq!(set.to_vec().len(), nodes.len());
    }

    #[test]
    fn test_sorts_into_document_order() {
        let doc = sample();
        let nodes = descendants(&doc);
        let mut set = NodeSet::new();
        for node in nodes.iter().rev() {
            set.add(XNode::Dom(*node));
        }
        let sorted = set.to_vec();
        let expected: Vec<XNode<NodeRef<'_>>> = nodes.iter().map(|n| XNode::Dom(*n)).collect();
        assert_eq!(sorted, expected);
        assert_eq!(set.first(), Some(XNode::Dom(doc.root())));
    }

    #[test]
    fn test_host_hook_order() {
        let doc = sample();
        let nodes = descendants(&doc);
        for (i, x) in nodes.iter().enumerate() {
            for (j, y) in nodes.iter().enumerate() {
                let expected = i.cmp(&j);
                assert_eq!(
                    document_order(&XNode::Dom(*x), &XNode::Dom(*y)),
                    expected,
                    "nodes {i} vs {j}"
                );
            }
        }
    }

    /// A delegating handle that hides the host ordering hook, forcing the
    /// structural walk.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct NoHook<'d>(NodeRef<'d>);

    impl<'d> crate::dom::DomNode<'d> for NoHook<'d> {
        fn kind(&self) -> crate::dom::NodeKind {
            self.0.kind()
        }
        fn node_name(&self) -> String {
            self.0.node_name()
        }
        fn local_name(&self) -> Option<&'d str> {
            self.0.local_name()
        }
        fn prefix(&self) -> Option<&'d str> {
            self.0.prefix()
        }
        fn namespace_uri(&self) -> Option<&'d str> {
            self.0.namespace_uri()
        }
        fn node_value(&self) -> Option<&'d str> {
            self.0.node_value()
        }
        fn parent(&self) -> Option<Self> {
            self.0.parent().map(NoHook)
        }
        fn children(&self) -> Box<dyn Iterator<Item = Self> + 'd> {
            Box::new(self.0.children().map(NoHook))
        }
        fn attributes(&self) -> Box<dyn Iterator<Item = Self> + 'd> {
            Box::new(self.0.attributes().map(NoHook))
        }
        fn owner_document(&self) -> Option<Self> {
            self.0.owner_document().map(NoHook)
        }
        fn owner_element(&self) -> Option<Self> {
            self.0.owner_element().map(NoHook)
        }
    }

    #[test]
    fn test_structural_walk_matches_host_order() {
        let doc = sample();
        let nodes = descendants(&doc);
        let root = doc.root().children().next().unwrap();
        let a = root.children().next().unwrap();
        let mut all: Vec<NoHook<'_>> = nodes.iter().copied().map(NoHook).collect();
        // Interleave the attribute where document order puts it: right
        // after its element.
        let attr = NoHook(a.attributes().next().unwrap());
        let a_pos = all.iter().position(|n| *n == NoHook(a)).unwrap();
        all.insert(a_pos + 1, attr);

        for (i, x) in all.iter().enumerate() {
            for (j, y) in all.iter().enumerate() {
                let expected = i.cmp(&j);
                assert_eq!(
                    document_order(&XNode::Dom(*x), &XNode::Dom(*y)),
                    expected,
                    "nodes {i} vs {j}"
                );
            }
        }
    }

    #[test]
    fn test_attribute_ordering() {
        let doc = sample();
        let root = doc.root().children().next().unwrap();
        let a = root.children().next().unwrap();
        let id_attr = a.attributes().next().unwrap();
        let b1 = a.children().next().unwrap();

        // Element precedes its attributes; attributes precede children.
        assert_eq!(
            document_order(&XNode::Dom(a), &XNode::Dom(id_attr)),
            Ordering::Less
        );
        assert_eq!(
            document_order(&XNode::Dom(id_attr), &XNode::Dom(b1)),
            Ordering::Less
        );
    }

    #[test]
    fn test_attribute_added_after_children_still_precedes_them() {
        let mut b = TreeBuilder::new();
        b.open("e");
        b.text("x");
        b.attr("a", "1");
        b.close();
        let doc = b.finish();
        let e = doc.root().children().next().unwrap();
        let text = e.children().next().unwrap();
        let attr = e.attributes().next().unwrap();

        // The host hook declines this pair; the structural walk must order
        // the attribute before every child of its element.
        assert_eq!(
            document_order(&XNode::Dom(attr), &XNode::Dom(text)),
            Ordering::Less
        );
        assert_eq!(
            document_order(&XNode::Dom(text), &XNode::Dom(attr)),
            Ordering::Greater
        );
        assert_eq!(
            document_order(&XNode::Dom(e), &XNode::Dom(attr)),
            Ordering::Less
        );

        let mut set = NodeSet::new();
        set.add(XNode::Dom(text));
        set.add(XNode::Dom(attr));
        assert_eq!(set.to_vec(), vec![XNode::Dom(attr), XNode::Dom(text)]);
    }

    #[test]
    fn test_namespace_nodes_precede_attributes() {
        let doc = sample();
        let root = doc.root().children().next().unwrap();
        let a = root.children().next().unwrap();
        let id_attr = a.attributes().next().unwrap();
        let ns = XNode::Namespace(crate::dom::NamespaceNode {
            prefix: "p".to_string(),
            uri: "urn:p".to_string(),
            owner: a,
        });
        assert_eq!(document_order(&ns, &XNode::Dom(id_attr)), Ordering::Less);
        assert_eq!(document_order(&XNode::Dom(a), &ns), Ordering::Less);

        let xml_ns = XNode::Namespace(crate::dom::NamespaceNode {
            prefix: "xml".to_string(),
            uri: XML_NAMESPACE_URI.to_string(),
            owner: a,
        });
        assert_eq!(document_order(&xml_ns, &ns), Ordering::Less);
    }

    #[test]
    fn test_string_value_of_set() {
        let doc = sample();
        let set: NodeSet<NodeRef<'_>> = NodeSet::new();
        assert_eq!(set.string_value(), "");
        let mut set = NodeSet::new();
        set.add(XNode::Dom(doc.root()));
        assert_eq!(set.string_value(), "");
    }
}
