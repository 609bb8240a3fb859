//! # dompath
//!
//! An embeddable XPath 1.0 engine. Expressions compile to an immutable AST
//! and evaluate against any tree exposing the [`DomNode`] capability view,
//! producing a node-set, string, number or boolean [`Value`].
//!
//! The crate bundles an arena tree ([`dom::tree`]) for hosts without a DOM
//! of their own, and a DOM Level 3 XPath facade ([`dom3`]) for callers that
//! want the `document.evaluate` surface with typed [`result::XPathResult`]s.
//!
//! # Example
//!
//! ```
//! use dompath::dom::tree::TreeBuilder;
//!
//! let mut b = TreeBuilder::new();
//! b.open("inventory");
//! b.open("item");
//! b.attr("sku", "a-1");
//! b.close();
//! b.open("item");
//! b.attr("sku", "b-2");
//! b.close();
//! b.close();
//! let doc = b.finish();
//!
//! let skus = dompath::select("//item/@sku", doc.root()).unwrap();
//! assert_eq!(skus.len(), 2);
//! assert_eq!(skus[0].string_value(), "a-1");
//!
//! let count = dompath::parse("count(//item)")
//!     .unwrap()
//!     .number(&dompath::EvalOptions::new(doc.root()))
//!     .unwrap();
//! assert_eq!(count, 2.0);
//! ```

pub mod ast;
pub mod axes;
mod chars;
pub mod dom;
pub mod dom3;
pub mod engine;
pub mod error;
pub mod functions;
pub mod lexer;
pub mod nodeset;
pub mod operators;
pub mod parser;
pub mod resolver;
pub mod result;
pub mod value;

use std::collections::HashMap;

pub use crate::dom::{DomNode, NamespaceNode, NodeKind, XNode};
pub use crate::engine::Context;
pub use crate::error::XPathError;
pub use crate::nodeset::NodeSet;
pub use crate::resolver::{
    FunctionLibrary, FunctionResolver, NamespaceResolver, NodeNamespaceResolver, VariableResolver,
};
pub use crate::value::Value;

/// A compiled XPath expression; immutable and reusable across evaluations.
#[derive(Debug, Clone)]
pub struct XPath {
    expr: ast::Expr,
}

/// Compiles an expression. Lexical and grammatical problems surface as
/// [`XPathError::InvalidExpression`].
pub fn parse(expression: &str) -> Result<XPath, XPathError> {
    let expr = parser::parse_expression(expression)?;
    log::debug!("compiled xpath {expression:?}");
    Ok(XPath { expr })
}

/// Per-evaluation options: the context node plus the optional resolvers and
/// flags of the evaluation context.
pub struct EvalOptions<'c, N> {
    pub node: N,
    pub namespaces: Option<&'c dyn NamespaceResolver>,
    pub variables: Option<&'c dyn VariableResolver<N>>,
    pub functions: Option<&'c dyn FunctionResolver<N>>,
    pub virtual_root: Option<N>,
    /// Enables case-insensitive name tests and
    /// `allow_any_namespace_for_no_prefix` together, the way HTML documents
    /// are queried.
    pub is_html: bool,
    pub allow_any_namespace_for_no_prefix: bool,
}

impl<'c, N> EvalOptions<'c, N> {
    pub fn new(node: N) -> Self {
        EvalOptions {
            node,
            namespaces: None,
            variables: None,
            functions: None,
            virtual_root: None,
            is_html: false,
            allow_any_namespace_for_no_prefix: false,
        }
    }

    pub fn namespaces(mut self, resolver: &'c dyn NamespaceResolver) -> Self {
        self.namespaces = Some(resolver);
        self
    }

    pub fn variables(mut self, resolver: &'c dyn VariableResolver<N>) -> Self {
        self.variables = Some(resolver);
        self
    }

    pub fn functions(mut self, resolver: &'c dyn FunctionResolver<N>) -> Self {
        self.functions = Some(resolver);
        self
    }

    pub fn virtual_root(mut self, root: N) -> Self {
        self.virtual_root = Some(root);
        self
    }

    pub fn html(mut self, is_html: bool) -> Self {
        self.is_html = is_html;
        self
    }
}

impl XPath {
    /// Evaluates against the options' context node and returns the typed
    /// value.
    pub fn evaluate<'a, N: DomNode<'a>>(
        &self,
        opts: &EvalOptions<'_, N>,
    ) -> Result<Value<N>, XPathError> {
        let default_resolver = NodeNamespaceResolver::new(opts.node.clone());
        let namespaces: &dyn NamespaceResolver = match opts.namespaces {
            Some(resolver) => resolver,
            None => &default_resolver,
        };
        let html = opts.is_html
            || opts
                .node
                .owner_document()
                .unwrap_or_else(|| opts.node.clone())
                .is_html_document();

        let mut ctx = Context::new(XNode::Dom(opts.node.clone()), namespaces);
        ctx.variables = opts.variables;
        ctx.functions = opts.functions;
        ctx.virtual_root = opts.virtual_root.clone();
        ctx.case_insensitive = html;
        ctx.allow_any_namespace_for_no_prefix = opts.allow_any_namespace_for_no_prefix || html;
        engine::evaluate(&self.expr, &ctx)
    }

    pub fn number<'a, N: DomNode<'a>>(
        &self,
        opts: &EvalOptions<'_, N>,
    ) -> Result<f64, XPathError> {
        Ok(self.evaluate(opts)?.number())
    }

    pub fn string<'a, N: DomNode<'a>>(
        &self,
        opts: &EvalOptions<'_, N>,
    ) -> Result<String, XPathError> {
        Ok(self.evaluate(opts)?.string())
    }

    pub fn boolean<'a, N: DomNode<'a>>(
        &self,
        opts: &EvalOptions<'_, N>,
    ) -> Result<bool, XPathError> {
        Ok(self.evaluate(opts)?.boolean())
    }

    /// The result as a node-set; a scalar result is a type error.
    pub fn node_set<'a, N: DomNode<'a>>(
        &self,
        opts: &EvalOptions<'_, N>,
    ) -> Result<NodeSet<N>, XPathError> {
        self.evaluate(opts)?.node_set()
    }

    /// The matching nodes in document order.
    pub fn select<'a, N: DomNode<'a>>(
        &self,
        opts: &EvalOptions<'_, N>,
    ) -> Result<Vec<XNode<N>>, XPathError> {
        Ok(self.node_set(opts)?.to_vec())
    }

    /// The first matching node in document order.
    pub fn select1<'a, N: DomNode<'a>>(
        &self,
        opts: &EvalOptions<'_, N>,
    ) -> Result<Option<XNode<N>>, XPathError> {
        Ok(self.node_set(opts)?.first())
    }
}

/// Parses and selects in one call.
pub fn select<'a, N: DomNode<'a>>(
    expression: &str,
    node: N,
) -> Result<Vec<XNode<N>>, XPathError> {
    parse(expression)?.select(&EvalOptions::new(node))
}

/// Parses and selects the first matching node.
pub fn select1<'a, N: DomNode<'a>>(
    expression: &str,
    node: N,
) -> Result<Option<XNode<N>>, XPathError> {
    parse(expression)?.select1(&EvalOptions::new(node))
}

/// A select function with prefix bindings baked in, for expressions over
/// namespaced documents.
pub struct NamespacedSelect {
    namespaces: HashMap<String, String>,
}

impl NamespacedSelect {
    pub fn select<'a, N: DomNode<'a>>(
        &self,
        expression: &str,
        node: N,
    ) -> Result<Vec<XNode<N>>, XPathError> {
        let opts = EvalOptions::new(node).namespaces(&self.namespaces);
        parse(expression)?.select(&opts)
    }

    pub fn select1<'a, N: DomNode<'a>>(
        &self,
        expression: &str,
        node: N,
    ) -> Result<Option<XNode<N>>, XPathError> {
        let opts = EvalOptions::new(node).namespaces(&self.namespaces);
        parse(expression)?.select1(&opts)
    }
}

/// Binds prefixes to URIs and returns the namespace-aware select.
pub fn use_namespaces(pairs: &[(&str, &str)]) -> NamespacedSelect {
    let namespaces = pairs
        .iter()
        .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
        .collect();
    NamespacedSelect { namespaces }
}
