//! Tree normalization: `optimize` and canonical sort
//!
//! Both are required before a tree is used as a plan cache key or planned;
//! identical predicates must produce identical trees.

use std::cmp::Ordering;

use super::ast::MatchExpression;
use super::values::compare_values;

impl MatchExpression {
    /// Flattens nested AND/AND and OR/OR and collapses single-child
    /// logical nodes. An empty AND is kept as-is.
    pub fn optimize(self) -> MatchExpression {
        match self {
            MatchExpression::And(children) => {
                let flat = flatten(children, |e| matches!(e, MatchExpression::And(_)));
                collapse(MatchExpression::And(flat))
            }
            MatchExpression::Or(children) => {
                let flat = flatten(children, |e| matches!(e, MatchExpression::Or(_)));
                collapse(MatchExpression::Or(flat))
            }
            leaf => leaf,
        }
    }

    /// Recursively orders children canonically
    pub fn sort_tree(&mut self) {
        if let Some(children) = self.children_mut() {
            for child in children.iter_mut() {
                child.sort_tree();
            }
            children.sort_by(canonical_cmp);
        }
    }

    /// `optimize` followed by `sort_tree`
    pub fn normalize(self) -> MatchExpression {
        let mut expr = self.optimize();
        expr.sort_tree();
        expr
    }
}

fn flatten(
    children: Vec<MatchExpression>,
    same_kind: impl Fn(&MatchExpression) -> bool,
) -> Vec<MatchExpression> {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        let child = child.optimize();
        if same_kind(&child) {
            if let MatchExpression::And(grand) | MatchExpression::Or(grand) = child {
                flat.extend(grand);
            }
        } else {
            flat.push(child);
        }
    }
    flat
}

fn collapse(expr: MatchExpression) -> MatchExpression {
    match expr {
        MatchExpression::And(mut c) | MatchExpression::Or(mut c) if c.len() == 1 => {
            c.pop().unwrap_or(MatchExpression::And(Vec::new()))
        }
        other => other,
    }
}

/// Canonical order: match type, then path, then operand, then children.
pub fn canonical_cmp(a: &MatchExpression, b: &MatchExpression) -> Ordering {
    let by_type = a.match_type().cmp(&b.match_type());
    if by_type != Ordering::Equal {
        return by_type;
    }

    match (a, b) {
        (MatchExpression::Leaf(x), MatchExpression::Leaf(y)) => {
            x.path.cmp(&y.path).then_with(|| {
                match (x.op.operand(), y.op.operand()) {
                    (Some(xv), Some(yv)) => compare_values(xv, yv),
                    _ => x.op.render_operand().cmp(&y.op.render_operand()),
                }
            })
        }
        _ => {
            let (xs, ys) = (a.children(), b.children());
            xs.len().cmp(&ys.len()).then_with(|| {
                xs.iter()
                    .zip(ys.iter())
                    .map(|(x, y)| canonical_cmp(x, y))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            })
        }
    }
}
