//! A recursive-descent parser from the token stream to the AST.
//!
//! The grammar is canonical XPath 1.0 (W3C REC-xpath-19991116 §3) with the
//! standard precedence chain: `or` < `and` < equality < relational <
//! additive < multiplicative < unary < union < path. Abbreviations are
//! expanded while parsing: `//` inserts a `descendant-or-self::node()`
//! step, `.` and `..` become `self::node()` and `parent::node()`, and `@n`
//! becomes `attribute::n`.

use crate::ast::*;
use crate::error::XPathError;
use crate::lexer::{Token, TokenKind, lex};

pub fn parse_expression(input: &str) -> Result<Expr, XPathError> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(XPathError::invalid(format!(
            "unexpected token '{}' after expression",
            token.text
        )));
    }
    log::trace!("parsed {:?} into {:?}", input, expr);
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, XPathError> {
        match self.peek() {
            Some(token) if token.kind == *kind => Ok(self.bump()),
            Some(token) => Err(XPathError::invalid(format!(
                "expected {what}, found '{}'",
                token.text
            ))),
            None => Err(XPathError::invalid(format!(
                "expected {what}, found end of expression"
            ))),
        }
    }

    // --- Precedence chain ---

    fn expr(&mut self) -> Result<Expr, XPathError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.and_expr()?;
        while self.eat(&TokenKind::Or) {
            let right = self.and_expr()?;
            left = binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.equality_expr()?;
        while self.eat(&TokenKind::And) {
            let right = self.equality_expr()?;
            left = binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn equality_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.relational_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Eq) => BinaryOp::Eq,
                Some(TokenKind::NotEq) => BinaryOp::NotEq,
                _ => break,
            };
            self.bump();
            let right = self.relational_expr()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn relational_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.additive_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Lt) => BinaryOp::Lt,
                Some(TokenKind::LtEq) => BinaryOp::LtEq,
                Some(TokenKind::Gt) => BinaryOp::Gt,
                Some(TokenKind::GtEq) => BinaryOp::GtEq,
                _ => break,
            };
            self.bump();
            let right = self.additive_expr()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn additive_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.multiplicative_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Subtract,
                _ => break,
            };
            self.bump();
            let right = self.multiplicative_expr()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Multiply) => BinaryOp::Multiply,
                Some(TokenKind::Div) => BinaryOp::Divide,
                Some(TokenKind::Mod) => BinaryOp::Modulo,
                _ => break,
            };
            self.bump();
            let right = self.unary_expr()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&TokenKind::Minus) {
            let inner = self.unary_expr()?;
            Ok(Expr::Negate(Box::new(inner)))
        } else {
            self.union_expr()
        }
    }

    fn union_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.path_expr()?;
        while self.eat(&TokenKind::Union) {
            let right = self.path_expr()?;
            left = binary(left, BinaryOp::Union, right);
        }
        Ok(left)
    }

    // --- Paths ---

    fn path_expr(&mut self) -> Result<Expr, XPathError> {
        match self.peek_kind() {
            Some(
                TokenKind::Slash
                | TokenKind::DoubleSlash
                | TokenKind::Dot
                | TokenKind::DotDot
                | TokenKind::At
                | TokenKind::Wildcard
                | TokenKind::QName
                | TokenKind::AxisName
                | TokenKind::NodeType
                | TokenKind::PrefixWildcard,
            ) => {
                let path = self.location_path()?;
                Ok(Expr::Path(PathExpr {
                    filter: None,
                    predicates: Vec::new(),
                    path: Some(path),
                }))
            }
            Some(
                TokenKind::Dollar
                | TokenKind::LParen
                | TokenKind::Literal
                | TokenKind::Number
                | TokenKind::FunctionName,
            ) => self.filter_path(),
            Some(_) => {
                let token = self.peek().unwrap();
                Err(XPathError::invalid(format!(
                    "unexpected token '{}'",
                    token.text
                )))
            }
            None => Err(XPathError::invalid("unexpected end of expression")),
        }
    }

    fn filter_path(&mut self) -> Result<Expr, XPathError> {
        let primary = self.primary_expr()?;
        let mut predicates = Vec::new();
        while self.peek_kind() == Some(&TokenKind::LBracket) {
            predicates.push(self.predicate()?);
        }

        let mut steps = Vec::new();
        let has_path = matches!(
            self.peek_kind(),
            Some(TokenKind::Slash | TokenKind::DoubleSlash)
        );
        if has_path {
            loop {
                match self.peek_kind() {
                    Some(TokenKind::Slash) => {
                        self.bump();
                    }
                    Some(TokenKind::DoubleSlash) => {
                        self.bump();
                        steps.push(Step::descendant_or_self_node());
                    }
                    _ => break,
                }
                steps.push(self.step()?);
            }
        }

        if !has_path && predicates.is_empty() {
            return Ok(primary);
        }

        // `((expr)[p1])[p2]` keeps extending the same filter's predicate
        // list; everything else is wrapped into a fresh path expression.
        let expr = match primary {
            Expr::Path(mut pe) if pe.path.is_none() && pe.filter.is_some() && steps.is_empty() => {
                pe.predicates.extend(predicates);
                return Ok(Expr::Path(pe));
            }
            other => Expr::Path(PathExpr {
                filter: Some(Box::new(other)),
                predicates,
                path: if has_path {
                    Some(LocationPath { absolute: false, steps })
                } else {
                    None
                },
            }),
        };
        Ok(expr)
    }

    fn location_path(&mut self) -> Result<LocationPath, XPathError> {
        let mut steps = Vec::new();
        let absolute = match self.peek_kind() {
            Some(TokenKind::Slash) => {
                self.bump();
                if self.starts_step() {
                    self.relative_location_path(&mut steps)?;
                }
                true
            }
            Some(TokenKind::DoubleSlash) => {
                self.bump();
                steps.push(Step::descendant_or_self_node());
                self.relative_location_path(&mut steps)?;
                true
            }
            _ => {
                self.relative_location_path(&mut steps)?;
                false
            }
        };
        Ok(LocationPath { absolute, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::Dot
                    | TokenKind::DotDot
                    | TokenKind::At
                    | TokenKind::Wildcard
                    | TokenKind::QName
                    | TokenKind::AxisName
                    | TokenKind::NodeType
                    | TokenKind::PrefixWildcard
            )
        )
    }

    fn relative_location_path(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        steps.push(self.step()?);
        loop {
            match self.peek_kind() {
                Some(TokenKind::Slash) => {
                    self.bump();
                    steps.push(self.step()?);
                }
                Some(TokenKind::DoubleSlash) => {
                    self.bump();
                    steps.push(Step::descendant_or_self_node());
                    steps.push(self.step()?);
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn step(&mut self) -> Result<Step, XPathError> {
        let axis = match self.peek_kind() {
            Some(TokenKind::Dot) => {
                self.bump();
                return Ok(Step::self_node());
            }
            Some(TokenKind::DotDot) => {
                self.bump();
                return Ok(Step::parent_node());
            }
            Some(TokenKind::At) => {
                self.bump();
                Axis::Attribute
            }
            Some(TokenKind::AxisName) => {
                let token = self.bump();
                self.expect(&TokenKind::ColonColon, "'::' after axis name")?;
                Axis::from_name(&token.text).ok_or_else(|| {
                    XPathError::invalid(format!("unknown axis '{}'", token.text))
                })?
            }
            _ => Axis::Child,
        };

        let node_test = self.node_test()?;
        let mut step = Step::new(axis, node_test);
        while self.peek_kind() == Some(&TokenKind::LBracket) {
            step.predicates.push(self.predicate()?);
        }
        Ok(step)
    }

    fn node_test(&mut self) -> Result<NodeTest, XPathError> {
        match self.peek_kind() {
            Some(TokenKind::Wildcard) => {
                self.bump();
                Ok(NodeTest::Any)
            }
            Some(TokenKind::PrefixWildcard) => {
                let token = self.bump();
                Ok(NodeTest::PrefixWildcard(token.text))
            }
            Some(TokenKind::QName) => {
                let token = self.bump();
                Ok(NodeTest::name(&token.text))
            }
            Some(TokenKind::NodeType) => {
                let token = self.bump();
                self.expect(&TokenKind::LParen, "'(' after node type")?;
                let test = match token.text.as_str() {
                    "comment" => NodeTest::Comment,
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    "processing-instruction" => {
                        let target = if self.peek_kind() == Some(&TokenKind::Literal) {
                            Some(self.bump().text)
                        } else {
                            None
                        };
                        NodeTest::ProcessingInstruction(target)
                    }
                    other => {
                        return Err(XPathError::invalid(format!("unknown node type '{other}'")));
                    }
                };
                self.expect(&TokenKind::RParen, "')' after node type")?;
                Ok(test)
            }
            Some(_) => {
                let token = self.peek().unwrap();
                Err(XPathError::invalid(format!(
                    "expected a node test, found '{}'",
                    token.text
                )))
            }
            None => Err(XPathError::invalid(
                "expected a node test, found end of expression",
            )),
        }
    }

    fn predicate(&mut self) -> Result<Expr, XPathError> {
        self.expect(&TokenKind::LBracket, "'['")?;
        let expr = self.expr()?;
        self.expect(&TokenKind::RBracket, "']' after predicate")?;
        Ok(expr)
    }

    fn primary_expr(&mut self) -> Result<Expr, XPathError> {
        match self.peek_kind() {
            Some(TokenKind::Dollar) => {
                self.bump();
                let token = self.expect(&TokenKind::QName, "variable name after '$'")?;
                Ok(Expr::Variable(token.text))
            }
            Some(TokenKind::LParen) => {
                self.bump();
                let expr = self.expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            Some(TokenKind::Literal) => Ok(Expr::Literal(self.bump().text)),
            Some(TokenKind::Number) => {
                let token = self.bump();
                let value: f64 = token.text.parse().map_err(|_| {
                    XPathError::invalid(format!("malformed number '{}'", token.text))
                })?;
                Ok(Expr::Number(value))
            }
            Some(TokenKind::FunctionName) => {
                let token = self.bump();
                self.expect(&TokenKind::LParen, "'(' after function name")?;
                let mut args = Vec::new();
                if self.peek_kind() != Some(&TokenKind::RParen) {
                    args.push(self.expr()?);
                    while self.eat(&TokenKind::Comma) {
                        args.push(self.expr()?);
                    }
                }
                self.expect(&TokenKind::RParen, "')' after function arguments")?;
                Ok(Expr::FunctionCall { name: token.text, args })
            }
            Some(_) => {
                let token = self.peek().unwrap();
                Err(XPathError::invalid(format!(
                    "unexpected token '{}'",
                    token.text
                )))
            }
            None => Err(XPathError::invalid("unexpected end of expression")),
        }
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}
