//! The XPath 1.0 core function library.
//!
//! All functions live in the empty namespace and dispatch by local name;
//! user resolvers are consulted first by the engine, so extensions can
//! shadow these. Arity violations report the offending function by name.

use crate::dom::{DomNode, NodeKind, XNode};
use crate::engine::Context;
use crate::error::XPathError;
use crate::nodeset::NodeSet;
use crate::value::{Value, string_to_number};

/// Dispatches `name` if it is a built-in; `None` lets the engine report an
/// unknown function.
pub fn call_builtin<'a, N: DomNode<'a>>(
    name: &str,
    ctx: &Context<'_, N>,
    args: Vec<Value<N>>,
) -> Option<Result<Value<N>, XPathError>> {
    Some(match name {
        // Node-set
        "last" => fn_last(ctx, args),
        "position" => fn_position(ctx, args),
        "count" => fn_count(args),
        "id" => fn_id(ctx, args),
        "local-name" => fn_local_name(ctx, args),
        "namespace-uri" => fn_namespace_uri(ctx, args),
        "name" => fn_name(ctx, args),
        // String
        "string" => fn_string(ctx, args),
        "concat" => fn_concat(args),
        "starts-with" => fn_starts_with(args),
        "contains" => fn_contains(args),
        "substring-before" => fn_substring_before(args),
        "substring-after" => fn_substring_after(args),
        "substring" => fn_substring(args),
        "string-length" => fn_string_length(ctx, args),
        "normalize-space" => fn_normalize_space(ctx, args),
        "translate" => fn_translate(args),
        // Boolean
        "boolean" => fn_boolean(args),
        "not" => fn_not(args),
        "true" => fn_true(args),
        "false" => fn_false(args),
        "lang" => fn_lang(ctx, args),
        // Number
        "number" => fn_number(ctx, args),
        "sum" => fn_sum(args),
        "floor" => fn_floor(args),
        "ceiling" => fn_ceiling(args),
        "round" => fn_round(args),
        _ => return None,
    })
}

fn expect_arity<N>(
    name: &str,
    args: &[Value<N>],
    min: usize,
    max: Option<usize>,
) -> Result<(), XPathError> {
    let ok = args.len() >= min && max.is_none_or(|m| args.len() <= m);
    if ok {
        return Ok(());
    }
    let expected = match (min, max) {
        (min, Some(max)) if min == max => format!("{min}"),
        (min, Some(max)) => format!("{min} to {max}"),
        (min, None) => format!("at least {min}"),
    };
    Err(XPathError::function(
        format!("{name}()"),
        format!("expected {expected} argument(s), got {}", args.len()),
    ))
}

fn context_dom_node<'a, N: DomNode<'a>>(ctx: &Context<'_, N>) -> N {
    match &ctx.node {
        XNode::Dom(n) => n.clone(),
        XNode::Namespace(ns) => ns.owner.clone(),
    }
}

/// The argument node for `name()`/`local-name()`/`namespace-uri()`: the
/// first node of the set in document order, or the context node when the
/// call has no argument.
fn optional_node_arg<'a, N: DomNode<'a>>(
    name: &str,
    ctx: &Context<'_, N>,
    mut args: Vec<Value<N>>,
) -> Result<Option<XNode<N>>, XPathError> {
    expect_arity(name, &args, 0, Some(1))?;
    if args.is_empty() {
        return Ok(Some(ctx.node.clone()));
    }
    match args.remove(0) {
        Value::NodeSet(set) => Ok(set.first()),
        other => Err(XPathError::type_error(format!(
            "{name}() argument must be a node-set, got a {}",
            other.type_name()
        ))),
    }
}

// --- Node-set functions ---

fn fn_last<'a, N: DomNode<'a>>(
    ctx: &Context<'_, N>,
    args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    expect_arity("last", &args, 0, Some(0))?;
    Ok(Value::Number(ctx.size as f64))
}

fn fn_position<'a, N: DomNode<'a>>(
    ctx: &Context<'_, N>,
    args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    expect_arity("position", &args, 0, Some(0))?;
    Ok(Value::Number(ctx.position as f64))
}

fn fn_count<'a, N: DomNode<'a>>(mut args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("count", &args, 1, Some(1))?;
    match args.remove(0) {
        Value::NodeSet(set) => Ok(Value::Number(set.len() as f64)),
        other => Err(XPathError::type_error(format!(
            "count() argument must be a node-set, got a {}",
            other.type_name()
        ))),
    }
}

/// Splits the argument on XML whitespace and resolves every token through
/// the host's id lookup. A node-set argument contributes each node's string
/// value.
fn fn_id<'a, N: DomNode<'a>>(
    ctx: &Context<'_, N>,
    mut args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    expect_arity("id", &args, 1, Some(1))?;
    let mut tokens: Vec<String> = Vec::new();
    match args.remove(0) {
        Value::NodeSet(set) => {
            for node in set.iter() {
                tokens.extend(split_xml_whitespace(&node.string_value()));
            }
        }
        other => tokens.extend(split_xml_whitespace(&other.string())),
    }
    let base = context_dom_node(ctx);
    let mut result = NodeSet::new();
    for token in tokens {
        if let Some(element) = base.element_by_id(&token) {
            result.add(XNode::Dom(element));
        }
    }
    Ok(Value::NodeSet(result))
}

fn fn_local_name<'a, N: DomNode<'a>>(
    ctx: &Context<'_, N>,
    args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    let node = optional_node_arg("local-name", ctx, args)?;
    let name = match node {
        Some(node) => match node.kind() {
            NodeKind::Element | NodeKind::Attribute | NodeKind::Namespace => {
                node.local_name().unwrap_or_default()
            }
            NodeKind::ProcessingInstruction => node.node_name(),
            _ => String::new(),
        },
        None => String::new(),
    };
    Ok(Value::String(name))
}

fn fn_namespace_uri<'a, N: DomNode<'a>>(
    ctx: &Context<'_, N>,
    args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    let node = optional_node_arg("namespace-uri", ctx, args)?;
    let uri = node
        .and_then(|node| node.namespace_uri())
        .unwrap_or_default();
    Ok(Value::String(uri))
}

fn fn_name<'a, N: DomNode<'a>>(
    ctx: &Context<'_, N>,
    args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    let node = optional_node_arg("name", ctx, args)?;
    let name = match node {
        Some(node) => match node.kind() {
            NodeKind::Element
            | NodeKind::Attribute
            | NodeKind::Namespace
            | NodeKind::ProcessingInstruction => node.node_name(),
            _ => String::new(),
        },
        None => String::new(),
    };
    Ok(Value::String(name))
}

// --- String functions ---

fn fn_string<'a, N: DomNode<'a>>(
    ctx: &Context<'_, N>,
    mut args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    expect_arity("string", &args, 0, Some(1))?;
    let s = if args.is_empty() {
        ctx.node.string_value()
    } else {
        args.remove(0).string()
    };
    Ok(Value::String(s))
}

fn fn_concat<'a, N: DomNode<'a>>(args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("concat", &args, 2, None)?;
    let result: String = args.iter().map(|v| v.string()).collect();
    Ok(Value::String(result))
}

fn fn_starts_with<'a, N: DomNode<'a>>(mut args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("starts-with", &args, 2, Some(2))?;
    let needle = args.remove(1).string();
    let haystack = args.remove(0).string();
    Ok(Value::Boolean(haystack.starts_with(&needle)))
}

fn fn_contains<'a, N: DomNode<'a>>(mut args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("contains", &args, 2, Some(2))?;
    let needle = args.remove(1).string();
    let haystack = args.remove(0).string();
    Ok(Value::Boolean(haystack.contains(&needle)))
}

fn fn_substring_before<'a, N: DomNode<'a>>(
    mut args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    expect_arity("substring-before", &args, 2, Some(2))?;
    let needle = args.remove(1).string();
    let haystack = args.remove(0).string();
    let result = match haystack.find(&needle) {
        Some(index) => haystack[..index].to_string(),
        None => String::new(),
    };
    Ok(Value::String(result))
}

fn fn_substring_after<'a, N: DomNode<'a>>(
    mut args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    expect_arity("substring-after", &args, 2, Some(2))?;
    let needle = args.remove(1).string();
    let haystack = args.remove(0).string();
    let result = match haystack.find(&needle) {
        Some(index) => haystack[index + needle.len()..].to_string(),
        None => String::new(),
    };
    Ok(Value::String(result))
}

/// 1-based, with XPath rounding of both the start and the length. NaN
/// bounds select nothing; an omitted length runs to the end.
fn fn_substring<'a, N: DomNode<'a>>(mut args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("substring", &args, 2, Some(3))?;
    let length = if args.len() == 3 {
        Some(args.remove(2).number())
    } else {
        None
    };
    let start = args.remove(1).number();
    let s = args.remove(0).string();

    let first = xpath_round(start);
    let limit = match length {
        Some(l) => first + xpath_round(l),
        None => f64::INFINITY,
    };
    let result: String = s
        .chars()
        .enumerate()
        .filter_map(|(i, c)| {
            let pos = (i + 1) as f64;
            if pos >= first && pos < limit { Some(c) } else { None }
        })
        .collect();
    Ok(Value::String(result))
}

fn fn_string_length<'a, N: DomNode<'a>>(
    ctx: &Context<'_, N>,
    mut args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    expect_arity("string-length", &args, 0, Some(1))?;
    let s = if args.is_empty() {
        ctx.node.string_value()
    } else {
        args.remove(0).string()
    };
    Ok(Value::Number(s.chars().count() as f64))
}

fn fn_normalize_space<'a, N: DomNode<'a>>(
    ctx: &Context<'_, N>,
    mut args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    expect_arity("normalize-space", &args, 0, Some(1))?;
    let s = if args.is_empty() {
        ctx.node.string_value()
    } else {
        args.remove(0).string()
    };
    Ok(Value::String(split_xml_whitespace(&s).join(" ")))
}

/// Per-character mapping; the first occurrence in the `from` string wins,
/// and positions past the end of `to` delete the character.
fn fn_translate<'a, N: DomNode<'a>>(mut args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("translate", &args, 3, Some(3))?;
    let to: Vec<char> = args.remove(2).string().chars().collect();
    let from: Vec<char> = args.remove(1).string().chars().collect();
    let source = args.remove(0).string();
    let result: String = source
        .chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(index) => to.get(index).copied(),
            None => Some(c),
        })
        .collect();
    Ok(Value::String(result))
}

// --- Boolean functions ---

fn fn_boolean<'a, N: DomNode<'a>>(mut args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("boolean", &args, 1, Some(1))?;
    Ok(Value::Boolean(args.remove(0).boolean()))
}

fn fn_not<'a, N: DomNode<'a>>(mut args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("not", &args, 1, Some(1))?;
    Ok(Value::Boolean(!args.remove(0).boolean()))
}

fn fn_true<'a, N: DomNode<'a>>(args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("true", &args, 0, Some(0))?;
    Ok(Value::Boolean(true))
}

fn fn_false<'a, N: DomNode<'a>>(args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("false", &args, 0, Some(0))?;
    Ok(Value::Boolean(false))
}

/// Searches ancestor-or-self for `xml:lang` and matches the language or a
/// prefix of it before a `-` subcode.
fn fn_lang<'a, N: DomNode<'a>>(
    ctx: &Context<'_, N>,
    mut args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    expect_arity("lang", &args, 1, Some(1))?;
    let wanted = args.remove(0).string().to_lowercase();
    let mut current = Some(context_dom_node(ctx));
    if let Some(n) = &current {
        if n.kind() != NodeKind::Element {
            current = XNode::Dom(n.clone()).parent().and_then(|p| p.as_dom().cloned());
        }
    }
    while let Some(node) = current {
        if let Some(declared) = node.attribute_ns(Some(crate::dom::XML_NAMESPACE_URI), "lang") {
            let declared = declared.to_lowercase();
            let matches = declared == wanted || declared.starts_with(&format!("{wanted}-"));
            return Ok(Value::Boolean(matches));
        }
        current = node.parent();
    }
    Ok(Value::Boolean(false))
}

// --- Number functions ---

fn fn_number<'a, N: DomNode<'a>>(
    ctx: &Context<'_, N>,
    mut args: Vec<Value<N>>,
) -> Result<Value<N>, XPathError> {
    expect_arity("number", &args, 0, Some(1))?;
    let n = if args.is_empty() {
        string_to_number(&ctx.node.string_value())
    } else {
        args.remove(0).number()
    };
    Ok(Value::Number(n))
}

/// Sums the nodes' string values as XPath numbers; a non-numeric member
/// turns the whole sum into NaN.
fn fn_sum<'a, N: DomNode<'a>>(mut args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("sum", &args, 1, Some(1))?;
    match args.remove(0) {
        Value::NodeSet(set) => {
            let sum = set
                .iter()
                .map(|node| string_to_number(&node.string_value()))
                .sum();
            Ok(Value::Number(sum))
        }
        other => Err(XPathError::type_error(format!(
            "sum() argument must be a node-set, got a {}",
            other.type_name()
        ))),
    }
}

fn fn_floor<'a, N: DomNode<'a>>(mut args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("floor", &args, 1, Some(1))?;
    Ok(Value::Number(args.remove(0).number().floor()))
}

fn fn_ceiling<'a, N: DomNode<'a>>(mut args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("ceiling", &args, 1, Some(1))?;
    Ok(Value::Number(args.remove(0).number().ceil()))
}

fn fn_round<'a, N: DomNode<'a>>(mut args: Vec<Value<N>>) -> Result<Value<N>, XPathError> {
    expect_arity("round", &args, 1, Some(1))?;
    Ok(Value::Number(xpath_round(args.remove(0).number())))
}

/// XPath rounding: halves go towards positive infinity.
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() || n == 0.0 {
        return n;
    }
    (n + 0.5).floor()
}

fn split_xml_whitespace(s: &str) -> Vec<String> {
    s.split(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
