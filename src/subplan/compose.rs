//! Composition of branch winners into one plan
//!
//! Each branch's index assignment is replayed onto its OR child and
//! appended to a composite assignment tree, one child per branch in
//! branch order. The fully tagged OR is then built and analysed like any
//! other tagged predicate.

use crate::cache::{PlanCacheIndexTree, SolutionCacheData};
use crate::catalog::CatalogView;
use crate::expression::MatchExpression;
use crate::index::IndexMap;
use crate::planner::{
    analyze_data_access, build_indexed_data_access, prepare_for_access_planning,
    tag_according_to_cache, PlannerError, PlannerParams, PlannerResult,
};
use crate::query::CanonicalQuery;
use crate::solution::QuerySolution;

use super::branch::BranchPlan;

/// Tags `or_expr` with every branch winner and builds the composite plan.
///
/// # Panics
///
/// If `or_expr` is not an OR with one child per branch.
pub(crate) fn compose(
    catalog: &dyn CatalogView,
    query: &CanonicalQuery,
    params: &PlannerParams,
    index_map: &IndexMap,
    mut or_expr: MatchExpression,
    branches: &[BranchPlan],
) -> PlannerResult<QuerySolution> {
    let mut composite = PlanCacheIndexTree::new();

    assert!(
        matches!(or_expr, MatchExpression::Or(_)),
        "compose: predicate is not an OR"
    );
    let Some(children) = or_expr.children_mut() else {
        unreachable!("an OR has children");
    };
    assert_eq!(
        children.len(),
        branches.len(),
        "compose: one planned branch per OR child"
    );

    for (i, (child, branch)) in children.iter_mut().zip(branches).enumerate() {
        let rendered = child.to_string();
        let tree = branch.cache_data.indexed_tree().ok_or_else(|| {
            PlannerError::no_indexed_cache_data(format!(
                "no indexed cache data for subchild {}",
                rendered
            ))
            .with_branch(i, rendered.clone())
        })?;

        tag_according_to_cache(child, tree, index_map).map_err(|e| {
            PlannerError::tagging_failed(format!(
                "failed to extract indices from subchild {}: {}",
                rendered,
                e.message()
            ))
            .with_branch(i, rendered.clone())
        })?;

        composite.children.push(tree.clone());
    }

    revalidate(catalog, &composite)?;

    prepare_for_access_planning(&mut or_expr);
    let root = build_indexed_data_access(query, &or_expr, &params.indexes).map_err(|e| {
        if e.is_fatal() {
            e
        } else {
            PlannerError::build_failed(format!(
                "failed to build indexed data path for subplanned query: {}",
                e.message()
            ))
        }
    })?;

    let solution = analyze_data_access(query, params, root)?;
    Ok(solution.with_cache_data(SolutionCacheData::index_tags(composite)))
}

/// Every index the composite tree names must still exist
fn revalidate(catalog: &dyn CatalogView, composite: &PlanCacheIndexTree) -> PlannerResult<()> {
    if !catalog.collection_exists() {
        return Err(PlannerError::plan_killed(
            "collection dropped before the composite plan was built",
        ));
    }

    let mut names = Vec::new();
    collect_index_names(composite, &mut names);
    match names.into_iter().find(|name| !catalog.index_exists(name)) {
        Some(name) => Err(PlannerError::plan_killed(format!(
            "index {} dropped before the composite plan was built",
            name
        ))),
        None => Ok(()),
    }
}

fn collect_index_names<'t>(tree: &'t PlanCacheIndexTree, out: &mut Vec<&'t str>) {
    if let Some(entry) = &tree.entry {
        out.push(&entry.index_name);
    }
    for child in &tree.children {
        collect_index_names(child, out);
    }
}
