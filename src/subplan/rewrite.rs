//! OR rewriting and subplanning eligibility
//!
//! A rooted OR is planned branch by branch as-is. An AND with exactly one
//! OR child is first distributed into a rooted OR:
//!
//! ```text
//! AND(a, b, OR(c, d))  =>  OR(AND(c, a, b), AND(d, a, b))
//! ```
//!
//! then normalized, so that equal predicates give equal branch shapes.
//! An AND with several OR children is left alone and is not eligible.

use crate::expression::{MatchExpression, MatchType};
use crate::query::CanonicalQuery;

/// Whether `query` can be planned one OR branch at a time
pub fn can_use_subplanning(query: &CanonicalQuery) -> bool {
    let options = query.options();

    // Hints, min and max pin the access path.
    if options.hint.is_some() || options.has_min_max() {
        return false;
    }

    // Tailable and snapshot reads never use indexed plans.
    if options.tailable || options.snapshot {
        return false;
    }

    let filter = query.filter();
    filter.match_type() == MatchType::Or || is_contained_or(filter)
}

/// An AND with exactly one OR child
pub fn is_contained_or(expr: &MatchExpression) -> bool {
    match expr {
        MatchExpression::And(children) => {
            children
                .iter()
                .filter(|c| c.match_type() == MatchType::Or)
                .count()
                == 1
        }
        _ => false,
    }
}

/// Distributes the single OR child of an AND over the remaining children.
///
/// # Panics
///
/// If `root` is not an AND with exactly one OR child, or that OR has fewer
/// than two children. Callers check `is_contained_or` first.
pub fn rewrite_to_rooted_or(root: MatchExpression) -> MatchExpression {
    let mut children = match root {
        MatchExpression::And(children) => children,
        other => panic!("rewrite_to_rooted_or: root is not an AND: {}", other),
    };

    let or_positions: Vec<usize> = children
        .iter()
        .enumerate()
        .filter(|(_, c)| c.match_type() == MatchType::Or)
        .map(|(i, _)| i)
        .collect();
    assert!(
        or_positions.len() == 1,
        "rewrite_to_rooted_or: expected one OR child, found {}",
        or_positions.len()
    );

    let MatchExpression::Or(disjuncts) = children.remove(or_positions[0]) else {
        unreachable!("child at OR position is an OR");
    };
    assert!(
        disjuncts.len() > 1,
        "rewrite_to_rooted_or: OR has {} children",
        disjuncts.len()
    );

    let remaining = MatchExpression::And(children).clone_untagged();
    let branches = disjuncts
        .into_iter()
        .map(|disjunct| MatchExpression::and(vec![disjunct, remaining.clone()]))
        .collect();

    MatchExpression::or(branches).normalize()
}

/// The rooted-OR form of an eligible predicate.
///
/// A rooted OR comes back unchanged; a contained OR is rewritten.
pub fn to_rooted_or(expr: &MatchExpression) -> MatchExpression {
    let expr = expr.clone_untagged();
    if is_contained_or(&expr) {
        rewrite_to_rooted_or(expr)
    } else {
        expr
    }
}
