//! Index tagging
//!
//! Replays a cached index-assignment tree onto a predicate, and orders
//! tagged predicates for access planning.

use std::cmp::Ordering;

use crate::cache::PlanCacheIndexTree;
use crate::expression::{IndexTag, MatchExpression};
use crate::index::IndexMap;

use super::errors::{PlannerError, PlannerResult};

/// Tags `expr` with the assignments recorded in `tree`.
///
/// The tree must mirror the predicate node for node. Index names are
/// resolved through `index_map`, so an index missing from this attempt's
/// catalog fails tagging.
pub fn tag_according_to_cache(
    expr: &mut MatchExpression,
    tree: &PlanCacheIndexTree,
    index_map: &IndexMap,
) -> PlannerResult<()> {
    if expr.num_children() != tree.children.len() {
        return Err(PlannerError::tagging_failed(format!(
            "expression and cache tree differ in shape: {} has {} children, tree has {}",
            expr,
            expr.num_children(),
            tree.children.len()
        )));
    }

    if let Some(children) = expr.children_mut() {
        for (child, subtree) in children.iter_mut().zip(&tree.children) {
            tag_according_to_cache(child, subtree, index_map)?;
        }
    }

    let Some(assignment) = &tree.entry else {
        return Ok(());
    };

    let ordinal = index_map.get(&assignment.index_name).ok_or_else(|| {
        PlannerError::tagging_failed(format!(
            "cached index {} is not in the catalog",
            assignment.index_name
        ))
    })?;

    match expr.as_leaf() {
        Some(leaf) if leaf.op.is_indexable() => {}
        _ => {
            return Err(PlannerError::tagging_failed(format!(
                "cannot tag {} with index {}",
                expr, assignment.index_name
            )))
        }
    }
    expr.set_tag(Some(IndexTag::new(*ordinal, assignment.pos)));
    Ok(())
}

/// Reorders AND children so that tagged leaves come first, grouped by
/// (index, position), then logical children carrying tags, then the rest.
///
/// The sort is stable. OR children are never reordered.
pub fn prepare_for_access_planning(expr: &mut MatchExpression) {
    match expr {
        MatchExpression::Leaf(_) => {}
        MatchExpression::Or(children) => {
            children.iter_mut().for_each(prepare_for_access_planning);
        }
        MatchExpression::And(children) => {
            children.iter_mut().for_each(prepare_for_access_planning);
            children.sort_by(tag_order);
        }
    }
}

fn tag_order(a: &MatchExpression, b: &MatchExpression) -> Ordering {
    rank(a).cmp(&rank(b))
}

fn rank(expr: &MatchExpression) -> (u8, Option<IndexTag>) {
    match expr.tag() {
        Some(tag) => (0, Some(tag)),
        None if expr.has_tags() => (1, None),
        None => (2, None),
    }
}
