//! The DOM Level 3 XPath evaluator surface: `createExpression`,
//! `createNSResolver` and `evaluate` over a document node, returning
//! [`XPathResult`] wrappers addressed by the numeric result-type codes.

use crate::dom::DomNode;
use crate::error::XPathError;
use crate::resolver::{NamespaceResolver, NodeNamespaceResolver};
use crate::result::{ResultType, XPathResult};
use crate::{EvalOptions, XPath, parse};

/// A compiled expression with the resolver bound at creation time.
pub struct XPathExpression {
    xpath: XPath,
    resolver: Option<Box<dyn NamespaceResolver>>,
}

impl XPathExpression {
    pub fn evaluate<'a, N: DomNode<'a>>(
        &self,
        context: N,
        result_type: u16,
    ) -> Result<XPathResult<N>, XPathError> {
        let requested = ResultType::from_code(result_type)?;
        let mut opts = EvalOptions::new(context);
        opts.namespaces = self.resolver.as_deref();
        let value = self.xpath.evaluate(&opts)?;
        XPathResult::new(value, requested)
    }
}

/// The `document.evaluate`-shaped entry point, carried by a document node.
pub struct DocumentXPathEvaluator<N> {
    document: N,
}

impl<'a, N: DomNode<'a>> DocumentXPathEvaluator<N> {
    pub fn new(document: N) -> Self {
        DocumentXPathEvaluator { document }
    }

    pub fn create_expression(
        &self,
        expression: &str,
        resolver: Option<Box<dyn NamespaceResolver>>,
    ) -> Result<XPathExpression, XPathError> {
        Ok(XPathExpression { xpath: parse(expression)?, resolver })
    }

    pub fn create_ns_resolver(&self, node: N) -> NodeNamespaceResolver<N> {
        NodeNamespaceResolver::new(node)
    }

    /// Parses and evaluates in one call. `reuse` mirrors the DOM parameter;
    /// results are plain values here, so it is accepted and discarded.
    pub fn evaluate(
        &self,
        expression: &str,
        context: N,
        resolver: Option<&dyn NamespaceResolver>,
        result_type: u16,
        _reuse: Option<XPathResult<N>>,
    ) -> Result<XPathResult<N>, XPathError> {
        let requested = ResultType::from_code(result_type)?;
        let xpath = parse(expression)?;
        let mut opts = EvalOptions::new(context);
        opts.namespaces = resolver;
        let value = xpath.evaluate(&opts)?;
        XPathResult::new(value, requested)
    }

    pub fn document(&self) -> &N {
        &self.document
    }
}
