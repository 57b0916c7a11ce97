//! Analysis pass over a built access plan
//!
//! Adds what the query options demand on top of the data access: a
//! blocking sort when the tree does not already provide the order, the
//! projection stage, skip and limit, and a final FETCH when the output
//! would otherwise lack full documents.

use crate::query::{CanonicalQuery, Projection};
use crate::solution::{ProjectionKind, QuerySolution, QuerySolutionNode, Stage};

use super::errors::PlannerResult;
use super::params::PlannerParams;

/// Finishes `root` into a solution for `query`
pub fn analyze_data_access(
    query: &CanonicalQuery,
    params: &PlannerParams,
    root: QuerySolutionNode,
) -> PlannerResult<QuerySolution> {
    let options = query.options();
    let mut root = root;
    root.compute_properties();

    let sort = &options.sort;
    if !sort.is_empty() && !root.provides_sort(sort) {
        if sort.fields().any(|f| !root.has_field(f)) {
            root = fetched(root);
        }
        // The sort only has to keep what skip and limit will let through.
        let limit = options.limit.map(|l| l + options.skip.unwrap_or(0));
        root = QuerySolutionNode::wrap(
            Stage::Sort {
                pattern: sort.clone(),
                limit,
            },
            root,
        );
        root.compute_properties();
    }

    root = match &options.projection {
        Some(spec) => add_projection(root, spec),
        None if !root.fetched() => fetched(root),
        None => root,
    };

    if let Some(skip) = options.skip.filter(|s| *s > 0) {
        root = QuerySolutionNode::wrap(Stage::Skip(skip), root);
    }
    if let Some(limit) = options.limit {
        root = QuerySolutionNode::wrap(Stage::Limit(limit), root);
    }

    let mut solution = QuerySolution::new(root);
    solution.index_filter_applied = params.index_filters_applied;
    Ok(solution)
}

fn fetched(child: QuerySolutionNode) -> QuerySolutionNode {
    let mut node = QuerySolutionNode::wrap(Stage::Fetch, child);
    node.compute_properties();
    node
}

fn add_projection(root: QuerySolutionNode, spec: &Projection) -> QuerySolutionNode {
    let covered = !root.fetched()
        && spec
            .required_fields()
            .map_or(false, |fields| fields.iter().all(|f| root.has_field(f)))
        && reads_one_index(&root);

    let (input, kind) = if covered {
        (root, ProjectionKind::CoveredOneIndex)
    } else {
        let input = if root.fetched() { root } else { fetched(root) };
        let kind = if spec.is_inclusion_only() {
            ProjectionKind::SimpleDoc
        } else {
            ProjectionKind::Default
        };
        (input, kind)
    };

    let mut node = QuerySolutionNode::wrap(
        Stage::Projection {
            spec: spec.clone(),
            kind,
        },
        input,
    );
    node.compute_properties();
    node
}

/// A single index scan, possibly under a blocking sort
fn reads_one_index(node: &QuerySolutionNode) -> bool {
    match &node.stage {
        Stage::IndexScan { .. } => true,
        Stage::Sort { .. } => node.children.len() == 1 && reads_one_index(&node.children[0]),
        _ => false,
    }
}
