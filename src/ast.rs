//! The abstract syntax tree produced by the parser.
//!
//! An AST is immutable once built and may be shared across any number of
//! evaluations.

/// An XPath 1.0 expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(String),
    Number(f64),
    Variable(String),
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Unary minus.
    Negate(Box<Expr>),
    Path(PathExpr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Union,
}

/// A path expression: an optional filter primary, predicates over the
/// filter's result, and an optional location path continuing from it.
///
/// `$var`, `(expr)`, literals and function calls only become a `PathExpr`
/// when predicates or steps follow them; a bare primary stays a plain
/// [`Expr`].
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub filter: Option<Box<Expr>>,
    pub predicates: Vec<Expr>,
    pub path: Option<LocationPath>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// Rooted at the document (or virtual root) rather than the context node.
    pub absolute: bool,
    pub steps: Vec<Step>,
}

/// One link of a location path: an axis, a node test, and predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    pub fn new(axis: Axis, node_test: NodeTest) -> Self {
        Step { axis, node_test, predicates: Vec::new() }
    }

    /// `self::node()`, the expansion of `.`.
    pub fn self_node() -> Self {
        Step::new(Axis::SelfAxis, NodeTest::Node)
    }

    /// `parent::node()`, the expansion of `..`.
    pub fn parent_node() -> Self {
        Step::new(Axis::Parent, NodeTest::Node)
    }

    /// `descendant-or-self::node()`, the step `//` inserts.
    pub fn descendant_or_self_node() -> Self {
        Step::new(Axis::DescendantOrSelf, NodeTest::Node)
    }
}

/// The thirteen XPath axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Ancestor,
    AncestorOrSelf,
    Attribute,
    Child,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Namespace,
    Parent,
    Preceding,
    PrecedingSibling,
    SelfAxis,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Axis> {
        Some(match name {
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "attribute" => Axis::Attribute,
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "following" => Axis::Following,
            "following-sibling" => Axis::FollowingSibling,
            "namespace" => Axis::Namespace,
            "parent" => Axis::Parent,
            "preceding" => Axis::Preceding,
            "preceding-sibling" => Axis::PrecedingSibling,
            "self" => Axis::SelfAxis,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::Attribute => "attribute",
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Following => "following",
            Axis::FollowingSibling => "following-sibling",
            Axis::Namespace => "namespace",
            Axis::Parent => "parent",
            Axis::Preceding => "preceding",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::SelfAxis => "self",
        }
    }

    /// Reverse axes iterate nearest-first, which drives positional
    /// predicates.
    pub fn is_reverse(&self) -> bool {
        matches!(
            self,
            Axis::Ancestor
                | Axis::AncestorOrSelf
                | Axis::Parent
                | Axis::Preceding
                | Axis::PrecedingSibling
        )
    }
}

/// A filter on the nodes an axis generates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// `*`
    Any,
    /// `prefix:*`
    PrefixWildcard(String),
    /// `name` or `prefix:name`
    Name {
        prefix: Option<String>,
        local: String,
    },
    /// `comment()`
    Comment,
    /// `text()`; also matches CDATA sections.
    Text,
    /// `processing-instruction()` with an optional target literal.
    ProcessingInstruction(Option<String>),
    /// `node()`
    Node,
}

impl NodeTest {
    pub fn name(qname: &str) -> Self {
        match qname.split_once(':') {
            Some((prefix, local)) => NodeTest::Name {
                prefix: Some(prefix.to_string()),
                local: local.to_string(),
            },
            None => NodeTest::Name {
                prefix: None,
                local: qname.to_string(),
            },
        }
    }
}
