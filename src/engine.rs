//! The recursive AST interpreter and its evaluation context.
//!
//! A [`Context`] is never mutated in place: predicate loops and step
//! evaluation derive shallow copies through [`Context::with_node`], so a
//! context can be shared between sequential evaluations and a compiled
//! expression is freely reusable.

use crate::ast::{BinaryOp, Expr, LocationPath, NodeTest, PathExpr, Step};
use crate::axes;
use crate::dom::{DomNode, NodeKind, XNode};
use crate::error::XPathError;
use crate::functions;
use crate::nodeset::NodeSet;
use crate::operators;
use crate::resolver::{FunctionResolver, NamespaceResolver, VariableResolver};
use crate::value::Value;

/// Everything a subexpression needs to interpret relative references.
#[derive(Clone)]
pub struct Context<'c, N> {
    pub node: XNode<N>,
    /// 1-based position of `node` in the current candidate list.
    pub position: usize,
    pub size: usize,
    pub namespaces: &'c dyn NamespaceResolver,
    pub variables: Option<&'c dyn VariableResolver<N>>,
    pub functions: Option<&'c dyn FunctionResolver<N>>,
    /// Sentinel ancestor bounding ancestor/preceding traversals and
    /// standing in for the document root of detached fragments.
    pub virtual_root: Option<N>,
    pub case_insensitive: bool,
    pub allow_any_namespace_for_no_prefix: bool,
}

impl<'c, N: Clone> Context<'c, N> {
    pub fn new(node: XNode<N>, namespaces: &'c dyn NamespaceResolver) -> Self {
        Context {
            node,
            position: 1,
            size: 1,
            namespaces,
            variables: None,
            functions: None,
            virtual_root: None,
            case_insensitive: false,
            allow_any_namespace_for_no_prefix: false,
        }
    }

    pub fn with_variables(mut self, variables: &'c dyn VariableResolver<N>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_functions(mut self, functions: &'c dyn FunctionResolver<N>) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn with_virtual_root(mut self, root: N) -> Self {
        self.virtual_root = Some(root);
        self
    }

    /// A shallow copy focused on another node/position/size.
    pub fn with_node(&self, node: XNode<N>, position: usize, size: usize) -> Self {
        let mut next = self.clone();
        next.node = node;
        next.position = position;
        next.size = size;
        next
    }
}

/// Evaluates a compiled expression in `ctx`.
pub fn evaluate<'a, N: DomNode<'a>>(
    expr: &Expr,
    ctx: &Context<'_, N>,
) -> Result<Value<N>, XPathError> {
    match expr {
        Expr::Literal(s) => Ok(Value::String(s.clone())),
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Variable(name) => {
            let (uri, local) = resolve_qname(name, ctx)?;
            ctx.variables
                .and_then(|v| v.resolve_variable(&uri, &local))
                .ok_or_else(|| XPathError::UnknownVariable(name.clone()))
        }
        Expr::FunctionCall { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate(arg, ctx)?);
            }
            call_function(name, evaluated, ctx)
        }
        Expr::Binary { left, op, right } => match op {
            // `and`/`or` only evaluate the right side when needed.
            BinaryOp::And => {
                let l = evaluate(left, ctx)?;
                if !l.boolean() {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(evaluate(right, ctx)?.boolean()))
            }
            BinaryOp::Or => {
                let l = evaluate(left, ctx)?;
                if l.boolean() {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(evaluate(right, ctx)?.boolean()))
            }
            _ => {
                let l = evaluate(left, ctx)?;
                let r = evaluate(right, ctx)?;
                operators::evaluate(*op, l, r)
            }
        },
        Expr::Negate(inner) => Ok(Value::Number(-evaluate(inner, ctx)?.number())),
        Expr::Path(path) => evaluate_path(path, ctx),
    }
}

/// Splits a lexical QName and resolves its prefix; a prefixless name is in
/// the empty namespace.
fn resolve_qname<'a, N: DomNode<'a>>(
    name: &str,
    ctx: &Context<'_, N>,
) -> Result<(String, String), XPathError> {
    match name.split_once(':') {
        Some((prefix, local)) => {
            let uri = ctx
                .namespaces
                .resolve_prefix(prefix)
                .ok_or_else(|| XPathError::UnresolvedPrefix(prefix.to_string()))?;
            Ok((uri, local.to_string()))
        }
        None => Ok((String::new(), name.to_string())),
    }
}

fn call_function<'a, N: DomNode<'a>>(
    name: &str,
    args: Vec<Value<N>>,
    ctx: &Context<'_, N>,
) -> Result<Value<N>, XPathError> {
    let (uri, local) = resolve_qname(name, ctx)?;
    if let Some(user) = ctx.functions {
        if let Some(result) = user.call(&uri, &local, ctx, args.clone()) {
            return result;
        }
    }
    if uri.is_empty() {
        if let Some(result) = functions::call_builtin(&local, ctx, args) {
            return result;
        }
    }
    Err(XPathError::UnknownFunction(name.to_string()))
}

fn evaluate_path<'a, N: DomNode<'a>>(
    path: &PathExpr,
    ctx: &Context<'_, N>,
) -> Result<Value<N>, XPathError> {
    let start: Vec<XNode<N>> = match &path.filter {
        Some(filter) => {
            let value = evaluate(filter, ctx)?;
            // The parser only builds a filtered path when predicates or
            // steps follow, and those need a node-set to work on.
            let set = match value {
                Value::NodeSet(set) => set,
                other => {
                    return Err(XPathError::type_error(format!(
                        "a {} cannot be filtered or stepped into",
                        other.type_name()
                    )));
                }
            };
            // Filter predicates run over the unsorted array, forward.
            let nodes: Vec<XNode<N>> = set.unsorted().to_vec();
            apply_predicates(nodes, &path.predicates, ctx)?
        }
        None => vec![ctx.node.clone()],
    };

    let result = match &path.path {
        Some(location) => {
            let initial = if location.absolute {
                vec![resolve_root(start.first().unwrap_or(&ctx.node), ctx)]
            } else {
                start
            };
            evaluate_location_path(location, initial, ctx)?
        }
        None => NodeSet::from_nodes(start),
    };
    Ok(Value::NodeSet(result))
}

/// The evaluation root: the node's document, the virtual root for detached
/// fragments, or the top of the parent chain.
fn resolve_root<'a, N: DomNode<'a>>(start: &XNode<N>, ctx: &Context<'_, N>) -> XNode<N> {
    if let XNode::Dom(n) = start {
        if n.kind() == NodeKind::Document {
            return start.clone();
        }
    }
    if let Some(vr) = &ctx.virtual_root {
        return XNode::Dom(vr.clone());
    }
    if let XNode::Dom(n) = start {
        if let Some(doc) = n.owner_document() {
            return XNode::Dom(doc);
        }
    }
    let mut current = start.clone();
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current
}

fn evaluate_location_path<'a, N: DomNode<'a>>(
    location: &LocationPath,
    start: Vec<XNode<N>>,
    ctx: &Context<'_, N>,
) -> Result<NodeSet<N>, XPathError> {
    let mut current = NodeSet::from_nodes(start);
    for step in &location.steps {
        let mut next = NodeSet::new();
        for origin in current.to_vec() {
            next.add_all(evaluate_step(step, &origin, ctx)?);
        }
        current = next;
    }
    Ok(current)
}

/// One step from one origin: generate the axis sequence, filter by the node
/// test, then apply the predicates positionally in axis order.
fn evaluate_step<'a, N: DomNode<'a>>(
    step: &Step,
    origin: &XNode<N>,
    ctx: &Context<'_, N>,
) -> Result<Vec<XNode<N>>, XPathError> {
    let mut candidates = Vec::new();
    axes::collect(step.axis, origin, ctx.virtual_root.as_ref(), &mut candidates);

    let mut tested = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if node_test_matches(&step.node_test, &candidate, ctx)? {
            tested.push(candidate);
        }
    }
    apply_predicates(tested, &step.predicates, ctx)
}

/// Applies predicates left to right. The k-th candidate sees context
/// position k and the pre-predicate candidate count as the context size; a
/// numeric predicate keeps the node at that position, anything else keeps
/// nodes whose boolean coercion is true.
fn apply_predicates<'a, N: DomNode<'a>>(
    nodes: Vec<XNode<N>>,
    predicates: &[Expr],
    ctx: &Context<'_, N>,
) -> Result<Vec<XNode<N>>, XPathError> {
    let mut current = nodes;
    for predicate in predicates {
        let size = current.len();
        let mut survivors = Vec::with_capacity(size);
        for (index, node) in current.into_iter().enumerate() {
            let predicate_ctx = ctx.with_node(node.clone(), index + 1, size);
            let value = evaluate(predicate, &predicate_ctx)?;
            let keep = match value {
                Value::Number(n) => n == (index + 1) as f64,
                other => other.boolean(),
            };
            if keep {
                survivors.push(node);
            }
        }
        current = survivors;
    }
    Ok(current)
}

fn node_test_matches<'a, N: DomNode<'a>>(
    test: &NodeTest,
    node: &XNode<N>,
    ctx: &Context<'_, N>,
) -> Result<bool, XPathError> {
    Ok(match test {
        NodeTest::Any => matches!(
            node.kind(),
            NodeKind::Element | NodeKind::Attribute | NodeKind::Namespace
        ),
        NodeTest::Node => matches!(
            node.kind(),
            NodeKind::Element
                | NodeKind::Attribute
                | NodeKind::Text
                | NodeKind::CData
                | NodeKind::ProcessingInstruction
                | NodeKind::Comment
                | NodeKind::Document
        ),
        NodeTest::Comment => node.kind() == NodeKind::Comment,
        NodeTest::Text => matches!(node.kind(), NodeKind::Text | NodeKind::CData),
        NodeTest::ProcessingInstruction(target) => {
            node.kind() == NodeKind::ProcessingInstruction
                && target.as_ref().is_none_or(|t| node.node_name() == *t)
        }
        NodeTest::PrefixWildcard(prefix) => match node.kind() {
            NodeKind::Element | NodeKind::Attribute => {
                let uri = ctx
                    .namespaces
                    .resolve_prefix(prefix)
                    .ok_or_else(|| XPathError::UnresolvedPrefix(prefix.clone()))?;
                node.namespace_uri().as_deref() == Some(uri.as_str())
            }
            _ => false,
        },
        NodeTest::Name { prefix, local } => match node.kind() {
            NodeKind::Namespace => {
                prefix.is_none() && names_match(local, &node.node_name(), ctx)
            }
            NodeKind::Element | NodeKind::Attribute => {
                let uri_matches = match prefix {
                    Some(p) => {
                        let uri = ctx
                            .namespaces
                            .resolve_prefix(p)
                            .ok_or_else(|| XPathError::UnresolvedPrefix(p.clone()))?;
                        node.namespace_uri().as_deref() == Some(uri.as_str())
                    }
                    None => {
                        ctx.allow_any_namespace_for_no_prefix
                            || node.namespace_uri().as_deref().unwrap_or("").is_empty()
                    }
                };
                uri_matches
                    && node
                        .local_name()
                        .is_some_and(|l| names_match(local, &l, ctx))
            }
            _ => false,
        },
    })
}

fn names_match<N>(test: &str, actual: &str, ctx: &Context<'_, N>) -> bool {
    if ctx.case_insensitive {
        test.eq_ignore_ascii_case(actual) || test.to_lowercase() == actual.to_lowercase()
    } else {
        test == actual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::tree::{Document, NodeRef, TreeBuilder};
    use crate::parser::parse_expression;
    use crate::resolver::{FunctionLibrary, NodeNamespaceResolver};
    use std::collections::HashMap;

    /// <root><a id="x"><b/><b/></a><c/></root>
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

    fn eval<'d>(
        expr: &str,
        doc: &'d Document,
    ) -> Value<NodeRef<'d>> {
        let parsed = parse_expression(expr).unwrap();
        let resolver = NodeNamespaceResolver::new(doc.root());
        let ctx = Context::new(XNode::Dom(doc.root()), &resolver);
        evaluate(&parsed, &ctx).unwrap()
    }

    fn select_names(expr: &str, doc: &Document) -> Vec<String> {
        match eval(expr, doc) {
            Value::NodeSet(set) => set.to_vec().iter().map(|n| n.node_name()).collect(),
            other => panic!("expected node-set, got {other:?}"),
        }
    }

    #[test]
    fn test_count_descendants() {
        let doc = sample();
        assert_eq!(eval("count(//b)", &doc).number(), 2.0);
        // root, a, both b elements and c.
        assert_eq!(eval("count(//*)", &doc).number(), 5.0);
    }

    #[test]
    fn test_positional_step() {
        let doc = sample();
        let result = eval("/root/a/b[2]", &doc);
        if let Value::NodeSet(set) = result {
            assert_eq!(set.len(), 1);
            // The second b in document order.
            let root = doc.root().children().next().unwrap();
            let a = root.children().next().unwrap();
            let b2 = a.children().nth(1).unwrap();
            assert_eq!(set.first(), Some(XNode::Dom(b2)));
        } else {
            panic!("expected node-set");
        }
    }

    #[test]
    fn test_attribute_string_value() {
        let doc = sample();
        assert_eq!(eval("string(//a/@id)", &doc).string(), "x");
    }

    #[test]
    fn test_following_axis() {
        let doc = sample();
        assert_eq!(select_names("//a/following::c", &doc), vec!["c"]);
    }

    #[test]
    fn test_positional_equivalence() {
        let doc = sample();
        let by_index = select_names("//b[1]", &doc);
        let by_position = select_names("//b[position()=1]", &doc);
        assert_eq!(by_index, by_position);
        assert_eq!(by_index.len(), 1);
    }

    #[test]
    fn test_last_predicate() {
        let doc = sample();
        let result = eval("//*[local-name()='b'][position()=last()]", &doc);
        if let Value::NodeSet(set) = result {
            assert_eq!(set.len(), 1);
        } else {
            panic!("expected node-set");
        }
    }

    #[test]
    fn test_union_is_deduplicated_and_ordered() {
        let doc = sample();
        assert_eq!(
            select_names("//b | //a | //b", &doc),
            vec!["a", "b", "b"]
        );
        // Associativity as sets.
        assert_eq!(
            select_names("(//a | //b) | //c", &doc),
            select_names("//a | (//b | //c)", &doc)
        );
    }

    #[test]
    fn test_parent_and_self_abbreviations() {
        let doc = sample();
        assert_eq!(select_names("//b/..", &doc), vec!["a"]);
        assert_eq!(select_names("//a/.", &doc), vec!["a"]);
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let doc = sample();
        assert_eq!(eval("1 + 2 * 3", &doc).number(), 7.0);
        assert!(eval("count(//b) = 2", &doc).boolean());
        assert!(eval("count(//b) < count(//*)", &doc).boolean());
        assert!(eval("not(//missing)", &doc).boolean());
    }

    #[test]
    fn test_variables() {
        let doc = sample();
        let parsed = parse_expression("$limit + 1").unwrap();
        let resolver = NodeNamespaceResolver::new(doc.root());
        let mut vars: HashMap<String, Value<NodeRef<'_>>> = HashMap::new();
        vars.insert("limit".to_string(), Value::Number(41.0));
        let ctx = Context::new(XNode::Dom(doc.root()), &resolver).with_variables(&vars);
        assert_eq!(evaluate(&parsed, &ctx).unwrap().number(), 42.0);
    }

    #[test]
    fn test_undeclared_variable_errors() {
        let doc = sample();
        let parsed = parse_expression("$nope").unwrap();
        let resolver = NodeNamespaceResolver::new(doc.root());
        let ctx = Context::new(XNode::Dom(doc.root()), &resolver);
        assert_eq!(
            evaluate(&parsed, &ctx).unwrap_err(),
            XPathError::UnknownVariable("nope".to_string())
        );
    }

    #[test]
    fn test_variable_node_set_path() {
        let doc = sample();
        let root = doc.root().children().next().unwrap();
        let a = root.children().next().unwrap();
        let parsed = parse_expression("$start/b").unwrap();
        let resolver = NodeNamespaceResolver::new(doc.root());
        let mut vars: HashMap<String, Value<NodeRef<'_>>> = HashMap::new();
        vars.insert(
            "start".to_string(),
            Value::NodeSet(NodeSet::from_nodes(vec![XNode::Dom(a)])),
        );
        let ctx = Context::new(XNode::Dom(doc.root()), &resolver).with_variables(&vars);
        let result = evaluate(&parsed, &ctx).unwrap();
        if let Value::NodeSet(set) = result {
            assert_eq!(set.len(), 2);
        } else {
            panic!("expected node-set");
        }
    }

    #[test]
    fn test_filter_of_non_node_set_is_type_error() {
        let doc = sample();
        let parsed = parse_expression("(1 + 2)/a").unwrap();
        let resolver = NodeNamespaceResolver::new(doc.root());
        let ctx = Context::new(XNode::Dom(doc.root()), &resolver);
        let err = evaluate(&parsed, &ctx).unwrap_err();
        assert_eq!(err.code(), Some(52));
    }

    #[test]
    fn test_filter_predicate_positions_use_insertion_order() {
        let doc = sample();
        // (//b)[2] picks the second b of the whole document.
        let result = eval("(//b)[2]", &doc);
        if let Value::NodeSet(set) = result {
            assert_eq!(set.len(), 1);
        } else {
            panic!("expected node-set");
        }
    }

    #[test]
    fn test_custom_functions() {
        let doc = sample();
        let parsed = parse_expression("twice(21)").unwrap();
        let resolver = NodeNamespaceResolver::new(doc.root());
        let mut library = FunctionLibrary::new();
        library.insert("twice", |_: &Context<'_, NodeRef<'_>>, args| {
            Ok(Value::Number(args[0].number() * 2.0))
        });
        let ctx = Context::new(XNode::Dom(doc.root()), &resolver).with_functions(&library);
        assert_eq!(evaluate(&parsed, &ctx).unwrap().number(), 42.0);
    }

    #[test]
    fn test_unknown_function_errors() {
        let doc = sample();
        let parsed = parse_expression("frobnicate()").unwrap();
        let resolver = NodeNamespaceResolver::new(doc.root());
        let ctx = Context::new(XNode::Dom(doc.root()), &resolver);
        assert_eq!(
            evaluate(&parsed, &ctx).unwrap_err(),
            XPathError::UnknownFunction("frobnicate".to_string())
        );
    }

    #[test]
    fn test_namespaced_name_tests() {
        let mut b = TreeBuilder::new();
        b.open("root");
        b.attr("xmlns:x", "urn:x");
        b.open("x:item");
        b.close();
        b.open("item");
        b.close();
        b.close();
        let doc = b.finish();

        // The default resolver picks up xmlns:x from the document.
        assert_eq!(select_names("//x:item", &doc), vec!["x:item"]);
        // A prefixless test only matches the no-namespace element.
        assert_eq!(select_names("//item", &doc), vec!["item"]);
        // Prefix wildcard.
        assert_eq!(select_names("//x:*", &doc), vec!["x:item"]);
    }

    #[test]
    fn test_unresolved_prefix_errors() {
        let doc = sample();
        let parsed = parse_expression("//nope:item").unwrap();
        let resolver = NodeNamespaceResolver::new(doc.root());
        let ctx = Context::new(XNode::Dom(doc.root()), &resolver);
        assert_eq!(
            evaluate(&parsed, &ctx).unwrap_err(),
            XPathError::UnresolvedPrefix("nope".to_string())
        );
    }

    #[test]
    fn test_case_insensitive_html_mode() {
        let mut b = TreeBuilder::new();
        b.open("HTML");
        b.open("BODY");
        b.close();
        b.close();
        let doc = b.finish();

        let parsed = parse_expression("//body").unwrap();
        let resolver = NodeNamespaceResolver::new(doc.root());
        let mut ctx = Context::new(XNode::Dom(doc.root()), &resolver);
        ctx.case_insensitive = true;
        let result = evaluate(&parsed, &ctx).unwrap();
        if let Value::NodeSet(set) = result {
            assert_eq!(set.len(), 1);
        } else {
            panic!("expected node-set");
        }
    }

    #[test]
    fn test_virtual_root_absolute_path() {
        let doc = sample();
        let root = doc.root().children().next().unwrap();
        let a = root.children().next().unwrap();
        let b1 = a.children().next().unwrap();

        let parsed = parse_expression("/b").unwrap();
        let resolver = NodeNamespaceResolver::new(doc.root());
        let ctx = Context::new(XNode::Dom(b1), &resolver).with_virtual_root(a);
        let result = evaluate(&parsed, &ctx).unwrap();
        if let Value::NodeSet(set) = result {
            // Absolute paths resolve against the virtual root, not the
            // document.
            assert_eq!(set.len(), 2);
        } else {
            panic!("expected node-set");
        }
    }

    #[test]
    fn test_namespace_axis_node_tests() {
        let mut b = TreeBuilder::new();
        b.open("root");
        b.attr("xmlns:p", "urn:p");
        b.close();
        let doc = b.finish();

        assert_eq!(select_names("/root/namespace::*", &doc), vec!["xml", "p"]);
        assert_eq!(select_names("/root/namespace::p", &doc), vec!["p"]);
        let result = eval("string(/root/namespace::p)", &doc);
        assert_eq!(result.string(), "urn:p");
    }

    #[test]
    fn test_text_and_comment_tests() {
        let mut b = TreeBuilder::new();
        b.open("root");
        b.text("alpha");
        b.comment("beta");
        b.cdata("gamma");
        b.pi("target", "pi-data");
        b.close();
        let doc = b.finish();

        assert_eq!(eval("count(/root/text())", &doc).number(), 2.0);
        assert_eq!(eval("string(/root/comment())", &doc).string(), "beta");
        assert_eq!(
            eval("string(/root/processing-instruction('target'))", &doc).string(),
            "pi-data"
        );
        assert_eq!(
            eval("count(/root/processing-instruction('other'))", &doc).number(),
            0.0
        );
        assert_eq!(eval("count(/root/node())", &doc).number(), 4.0);
    }
}
