//! Evaluation of the binary operators over the value algebra.
//!
//! Comparisons involving node-sets are existential: they hold when some
//! pair of member string values satisfies the operator (XPath 1.0 §3.4).
//! Arithmetic is IEEE-754 double arithmetic; `div` by zero produces the
//! infinities and `mod` mirrors the sign of the dividend.

use crate::ast::BinaryOp;
use crate::dom::DomNode;
use crate::error::XPathError;
use crate::value::{Value, string_to_number};

pub fn evaluate<'a, N: DomNode<'a>>(
    op: BinaryOp,
    left: Value<N>,
    right: Value<N>,
) -> Result<Value<N>, XPathError> {
    match op {
        BinaryOp::Or => Ok(Value::Boolean(left.boolean() || right.boolean())),
        BinaryOp::And => Ok(Value::Boolean(left.boolean() && right.boolean())),
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq => Ok(Value::Boolean(compare(op, &left, &right))),
        BinaryOp::Add => Ok(Value::Number(left.number() + right.number())),
        BinaryOp::Subtract => Ok(Value::Number(left.number() - right.number())),
        BinaryOp::Multiply => Ok(Value::Number(left.number() * right.number())),
        BinaryOp::Divide => Ok(Value::Number(left.number() / right.number())),
        BinaryOp::Modulo => Ok(Value::Number(left.number() % right.number())),
        BinaryOp::Union => evaluate_union(left, right),
    }
}

fn evaluate_union<'a, N: DomNode<'a>>(
    left: Value<N>,
    right: Value<N>,
) -> Result<Value<N>, XPathError> {
    let mut set = left.node_set()?;
    let right = right.node_set()?;
    set.add_all(right.unsorted().iter().cloned());
    Ok(Value::NodeSet(set))
}

fn compare<'a, N: DomNode<'a>>(op: BinaryOp, left: &Value<N>, right: &Value<N>) -> bool {
    match (left, right) {
        (Value::NodeSet(l), Value::NodeSet(r)) => {
            let right_values: Vec<String> = r.iter().map(|n| n.string_value()).collect();
            l.iter().any(|ln| {
                let lv = ln.string_value();
                right_values.iter().any(|rv| compare_strings(op, &lv, rv))
            })
        }
        (Value::NodeSet(l), Value::Boolean(b)) => compare_booleans(op, !l.is_empty(), *b),
        (Value::Boolean(b), Value::NodeSet(r)) => compare_booleans(op, *b, !r.is_empty()),
        (Value::NodeSet(l), Value::Number(n)) => l
            .iter()
            .any(|node| compare_numbers(op, string_to_number(&node.string_value()), *n)),
        (Value::Number(n), Value::NodeSet(r)) => r
            .iter()
            .any(|node| compare_numbers(op, *n, string_to_number(&node.string_value()))),
        (Value::NodeSet(l), Value::String(s)) => {
            l.iter().any(|node| compare_strings(op, &node.string_value(), s))
        }
        (Value::String(s), Value::NodeSet(r)) => {
            r.iter().any(|node| compare_strings(op, s, &node.string_value()))
        }
        (l, r) => match op {
            BinaryOp::Eq | BinaryOp::NotEq => {
                if matches!(l, Value::Boolean(_)) || matches!(r, Value::Boolean(_)) {
                    compare_booleans(op, l.boolean(), r.boolean())
                } else if matches!(l, Value::Number(_)) || matches!(r, Value::Number(_)) {
                    compare_numbers(op, l.number(), r.number())
                } else {
                    compare_raw_strings(op, &l.string(), &r.string())
                }
            }
            _ => compare_numbers(op, l.number(), r.number()),
        },
    }
}

fn compare_numbers(op: BinaryOp, a: f64, b: f64) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        BinaryOp::Lt => a < b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::GtEq => a >= b,
        _ => unreachable!("not a comparison operator"),
    }
}

/// Equality on strings compares text; the relational operators compare the
/// numeric conversions.
fn compare_strings(op: BinaryOp, a: &str, b: &str) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        _ => compare_numbers(op, string_to_number(a), string_to_number(b)),
    }
}

fn compare_raw_strings(op: BinaryOp, a: &str, b: &str) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        _ => unreachable!("relational operators compare as numbers"),
    }
}

fn compare_booleans(op: BinaryOp, a: bool, b: bool) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        _ => compare_numbers(op, a as u8 as f64, b as u8 as f64),
    }
}
