//! Predicate evaluation against documents
//!
//! Evaluates documents strictly: no type coercion, missing fields never
//! match (except `$exists: false`), arrays match when any element does.

use std::cmp::Ordering;

use serde_json::Value;

use super::ast::{LeafExpression, LeafOp, MatchExpression};
use super::values::compare_same_type;

impl MatchExpression {
    /// Checks if a document satisfies this predicate
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            MatchExpression::And(children) => children.iter().all(|c| c.matches(document)),
            MatchExpression::Or(children) => children.iter().any(|c| c.matches(document)),
            MatchExpression::Leaf(leaf) => leaf.matches(document),
        }
    }
}

impl LeafExpression {
    /// Checks if a document satisfies this single-path predicate
    pub fn matches(&self, document: &Value) -> bool {
        let values = resolve_path(document, &self.path);

        if let LeafOp::Exists(expected) = &self.op {
            return values.is_empty() != *expected;
        }

        values.iter().any(|value| match value {
            Value::Array(elements) => {
                matches_value(&self.op, value) || elements.iter().any(|e| matches_value(&self.op, e))
            }
            _ => matches_value(&self.op, value),
        })
    }
}

fn matches_value(op: &LeafOp, actual: &Value) -> bool {
    match op {
        LeafOp::Eq(expected) => compare_same_type(actual, expected) == Some(Ordering::Equal),
        LeafOp::Lt(bound) => compare_same_type(actual, bound) == Some(Ordering::Less),
        LeafOp::Lte(bound) => matches!(
            compare_same_type(actual, bound),
            Some(Ordering::Less | Ordering::Equal)
        ),
        LeafOp::Gt(bound) => compare_same_type(actual, bound) == Some(Ordering::Greater),
        LeafOp::Gte(bound) => matches!(
            compare_same_type(actual, bound),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        LeafOp::Regex(pattern) => match actual {
            Value::String(s) => pattern.is_match(s),
            _ => false,
        },
        LeafOp::Exists(_) => true,
    }
}

/// Collects every value reachable through a dotted path.
///
/// Arrays met along the way are traversed implicitly, so `a.b` over
/// `{a: [{b: 1}, {b: 2}]}` yields `1` and `2`. The terminal value is
/// returned as-is, arrays included.
pub fn resolve_path<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![document];
    for part in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(v) = map.get(part) {
                        next.push(v);
                    }
                }
                Value::Array(elements) => {
                    for element in elements {
                        if let Value::Object(map) = element {
                            if let Some(v) = map.get(part) {
                                next.push(v);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}
