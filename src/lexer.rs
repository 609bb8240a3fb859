//! Tokenisation of XPath 1.0 expressions.
//!
//! Scanning happens in two stages. `nom` combinators cut the source into raw
//! tokens; a retagging pass then applies XPath's context-sensitive lexical
//! rules, which depend on the surrounding tokens rather than on the text:
//!
//! - `*` is the multiply operator when an operand precedes it, a name-test
//!   wildcard otherwise, and the bare names `and`/`or`/`div`/`mod` are
//!   promoted to operators under the same rule;
//! - a name becomes an axis name before `::`, a node-type or function name
//!   before `(`, and a QName otherwise.

use crate::chars;
use crate::error::XPathError;
use nom::{
    IResult,
    bytes::complete::tag,
    character::complete::{char, digit0, digit1},
    combinator::{opt, recognize},
    sequence::{delimited, pair},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    LBracket,
    RBracket,
    At,
    Comma,
    Dollar,
    Union,
    Plus,
    Minus,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Slash,
    DoubleSlash,
    ColonColon,
    Dot,
    DotDot,
    Multiply,
    And,
    Or,
    Div,
    Mod,
    /// The `*` name test.
    Wildcard,
    Number,
    Literal,
    QName,
    FunctionName,
    AxisName,
    NodeType,
    /// `prefix:*`; the text is the prefix.
    PrefixWildcard,
    /// Scanner-internal states resolved by the retagging pass.
    RawName,
    RawStar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Token { kind, text: text.into() }
    }
}

/// Tokenises `input`. The returned stream contains no `Raw*` kinds.
pub fn lex(input: &str) -> Result<Vec<Token>, XPathError> {
    let mut rest = input;
    let mut tokens = Vec::new();
    loop {
        rest = rest.trim_start_matches(chars::is_xml_whitespace);
        if rest.is_empty() {
            break;
        }
        match raw_token(rest) {
            Ok((tail, token)) => {
                rest = tail;
                tokens.push(token);
            }
            Err(_) => return Err(scan_error(rest)),
        }
    }
    retag(&mut tokens);
    log::trace!("lexed {} token(s) from {:?}", tokens.len(), input);
    Ok(tokens)
}

fn scan_error(rest: &str) -> XPathError {
    if rest.starts_with('\'') || rest.starts_with('"') {
        XPathError::invalid("unterminated string literal")
    } else {
        let ch = rest.chars().next().unwrap_or('\0');
        XPathError::invalid(format!("unexpected character '{ch}'"))
    }
}

fn raw_token(i: &str) -> IResult<&str, Token> {
    if i.starts_with('\'') || i.starts_with('"') {
        return literal(i);
    }
    if i.starts_with(|c: char| chars::is_ncname_start(c)) {
        return name(i);
    }
    if let Ok(ok) = number(i) {
        return Ok(ok);
    }
    punct(i)
}

/// `'…'` or `"…"`, no escapes.
fn literal(i: &str) -> IResult<&str, Token> {
    let quote = i.chars().next().unwrap_or('\0');
    let (rest, content) = delimited(
        char(quote),
        nom::bytes::complete::take_while(move |c| c != quote),
        char(quote),
    )(i)?;
    Ok((rest, Token::new(TokenKind::Literal, content)))
}

/// `DDD`, `DDD.DDD`, `DDD.`, `.DDD` — XPath numbers have no exponent form.
fn number(i: &str) -> IResult<&str, Token> {
    let (rest, text) = nom::branch::alt((
        recognize(pair(digit1, opt(pair(char('.'), digit0)))),
        recognize(pair(char('.'), digit1)),
    ))(i)?;
    Ok((rest, Token::new(TokenKind::Number, text)))
}

fn ncname(i: &str) -> IResult<&str, &str> {
    match i.chars().next() {
        Some(c) if chars::is_ncname_start(c) => {}
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                i,
                nom::error::ErrorKind::Alpha,
            )));
        }
    }
    let end = i
        .char_indices()
        .find(|&(_, c)| !chars::is_ncname_char(c))
        .map(|(idx, _)| idx)
        .unwrap_or(i.len());
    Ok((&i[end..], &i[..end]))
}

/// An NCName run, possibly continued as `prefix:local` or `prefix:*`.
/// A following `::` is left for the axis separator.
fn name(i: &str) -> IResult<&str, Token> {
    let (rest, first) = ncname(i)?;
    if let Some(tail) = rest.strip_prefix(":*") {
        return Ok((tail, Token::new(TokenKind::PrefixWildcard, first)));
    }
    if let Some(after_colon) = rest.strip_prefix(':') {
        if !after_colon.starts_with(':') {
            if let Ok((tail, second)) = ncname(after_colon) {
                return Ok((tail, Token::new(TokenKind::RawName, format!("{first}:{second}"))));
            }
        }
    }
    Ok((rest, Token::new(TokenKind::RawName, first)))
}

const PUNCTUATION: &[(&str, TokenKind)] = &[
    ("//", TokenKind::DoubleSlash),
    ("::", TokenKind::ColonColon),
    ("!=", TokenKind::NotEq),
    ("<=", TokenKind::LtEq),
    (">=", TokenKind::GtEq),
    ("..", TokenKind::DotDot),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("[", TokenKind::LBracket),
    ("]", TokenKind::RBracket),
    ("@", TokenKind::At),
    (",", TokenKind::Comma),
    ("$", TokenKind::Dollar),
    ("|", TokenKind::Union),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("=", TokenKind::Eq),
    ("<", TokenKind::Lt),
    (">", TokenKind::Gt),
    ("/", TokenKind::Slash),
    (".", TokenKind::Dot),
    ("*", TokenKind::RawStar),
];

fn punct(i: &str) -> IResult<&str, Token> {
    for (symbol, kind) in PUNCTUATION {
        if let Ok((rest, text)) = tag::<_, _, nom::error::Error<&str>>(*symbol)(i) {
            return Ok((rest, Token::new(kind.clone(), text)));
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        i,
        nom::error::ErrorKind::Tag,
    )))
}

/// True when the previous token leaves the lexer expecting an operand, which
/// makes a following `*` a name test and keeps `and`/`or`/`div`/`mod` plain
/// names (W3C REC-xpath-19991116 §3.7).
fn expects_operand(prev: Option<&TokenKind>) -> bool {
    let Some(prev) = prev else { return true };
    matches!(
        prev,
        TokenKind::At
            | TokenKind::ColonColon
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::Comma
            | TokenKind::Dollar
            | TokenKind::And
            | TokenKind::Or
            | TokenKind::Div
            | TokenKind::Mod
            | TokenKind::Multiply
            | TokenKind::Slash
            | TokenKind::DoubleSlash
            | TokenKind::Union
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq
    )
}

fn retag(tokens: &mut [Token]) {
    for i in 0..tokens.len() {
        let prev = if i == 0 { None } else { Some(tokens[i - 1].kind.clone()) };
        match tokens[i].kind {
            TokenKind::RawStar => {
                tokens[i].kind = if expects_operand(prev.as_ref()) {
                    TokenKind::Wildcard
                } else {
                    TokenKind::Multiply
                };
            }
            TokenKind::RawName => {
                if !expects_operand(prev.as_ref()) {
                    let operator = match tokens[i].text.as_str() {
                        "and" => Some(TokenKind::And),
                        "or" => Some(TokenKind::Or),
                        "div" => Some(TokenKind::Div),
                        "mod" => Some(TokenKind::Mod),
                        _ => None,
                    };
                    if let Some(op) = operator {
                        tokens[i].kind = op;
                        continue;
                    }
                }
                let next = tokens.get(i + 1).map(|t| t.kind.clone());
                tokens[i].kind = match next {
                    Some(TokenKind::ColonColon) => TokenKind::AxisName,
                    Some(TokenKind::LParen) => {
                        let text = tokens[i].text.as_str();
                        if matches!(text, "comment" | "text" | "node" | "processing-instruction") {
                            TokenKind::NodeType
                        } else {
                            TokenKind::FunctionName
                        }
                    }
                    _ => TokenKind::QName,
                };
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        lex(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_punctuation_and_numbers() {
        assert_eq!(
            kinds("1 + 2.5 >= .5"),
            vec![
                TokenKind::Number,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::GtEq,
                TokenKind::Number
            ]
        );
        let tokens = lex("5.").unwrap();
        assert_eq!(tokens[0].text, "5.");
    }

    #[test]
    fn test_star_disambiguation() {
        // Leading position: a name test.
        assert_eq!(kinds("*"), vec![TokenKind::Wildcard]);
        // After an operand: multiplication.
        assert_eq!(
            kinds("2*3"),
            vec![TokenKind::Number, TokenKind::Multiply, TokenKind::Number]
        );
        // After @, ::, (, [ and operators: a name test again.
        assert_eq!(kinds("@*"), vec![TokenKind::At, TokenKind::Wildcard]);
        assert_eq!(
            kinds("child::*"),
            vec![TokenKind::AxisName, TokenKind::ColonColon, TokenKind::Wildcard]
        );
        assert_eq!(
            kinds("a/*"),
            vec![TokenKind::QName, TokenKind::Slash, TokenKind::Wildcard]
        );
        assert_eq!(
            kinds("* * *"),
            vec![TokenKind::Wildcard, TokenKind::Multiply, TokenKind::Wildcard]
        );
    }

    #[test]
    fn test_operator_name_promotion() {
        assert_eq!(
            kinds("4 div 2"),
            vec![TokenKind::Number, TokenKind::Div, TokenKind::Number]
        );
        assert_eq!(
            kinds("a and b"),
            vec![TokenKind::QName, TokenKind::And, TokenKind::QName]
        );
        // In operand position the same words are ordinary names.
        assert_eq!(kinds("mod"), vec![TokenKind::QName]);
        assert_eq!(
            kinds("div div div"),
            vec![TokenKind::QName, TokenKind::Div, TokenKind::QName]
        );
    }

    #[test]
    fn test_name_classification() {
        assert_eq!(
            kinds("concat('a','b')"),
            vec![
                TokenKind::FunctionName,
                TokenKind::LParen,
                TokenKind::Literal,
                TokenKind::Comma,
                TokenKind::Literal,
                TokenKind::RParen
            ]
        );
        assert_eq!(
            kinds("text()"),
            vec![TokenKind::NodeType, TokenKind::LParen, TokenKind::RParen]
        );
        assert_eq!(
            kinds("processing-instruction('x')"),
            vec![
                TokenKind::NodeType,
                TokenKind::LParen,
                TokenKind::Literal,
                TokenKind::RParen
            ]
        );
        assert_eq!(kinds("ns:item"), vec![TokenKind::QName]);
        assert_eq!(kinds("ns:*"), vec![TokenKind::PrefixWildcard]);
        assert_eq!(
            kinds("ancestor-or-self::node()"),
            vec![
                TokenKind::AxisName,
                TokenKind::ColonColon,
                TokenKind::NodeType,
                TokenKind::LParen,
                TokenKind::RParen
            ]
        );
    }

    #[test]
    fn test_variable_names_are_not_promoted() {
        assert_eq!(kinds("$div"), vec![TokenKind::Dollar, TokenKind::QName]);
    }

    #[test]
    fn test_literals() {
        let tokens = lex(r#"'it''s' "two""#).unwrap();
        // No escapes in XPath 1.0: 'it''s' is the two literals 'it' and 's'.
        assert_eq!(tokens[0].text, "it");
        assert_eq!(tokens[1].text, "s");
        assert_eq!(tokens[2].text, "two");
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Literal));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            lex("'abc").unwrap_err(),
            XPathError::invalid("unterminated string literal")
        );
        assert!(matches!(lex("a # b"), Err(XPathError::InvalidExpression(_))));
        assert!(matches!(lex("a ! b"), Err(XPathError::InvalidExpression(_))));
    }

    #[test]
    fn test_unicode_names() {
        assert_eq!(kinds("数/λ"), vec![TokenKind::QName, TokenKind::Slash, TokenKind::QName]);
    }
}
