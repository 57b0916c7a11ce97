//! Enumeration planner
//!
//! Enumerates index assignments for a canonical query and turns each one
//! into a complete candidate solution:
//!
//! 1. Tag an untagged clone of the filter with the assignment
//! 2. Capture the tags as a `PlanCacheIndexTree`
//! 3. Order the tagged tree for access planning
//! 4. Build the access plan and run the analysis pass
//!
//! When no indexed solution exists the planner answers with a single
//! collection scan.

use crate::cache::{PlanCacheIndexTree, SolutionCacheData};
use crate::expression::{IndexTag, MatchExpression};
use crate::index::{IndexBounds, IndexEntry, SortDirection};
use crate::observability::{Event, Logger};
use crate::query::CanonicalQuery;
use crate::solution::{QuerySolution, QuerySolutionNode, Stage};

use super::access::build_indexed_data_access;
use super::analysis::analyze_data_access;
use super::errors::{PlannerError, PlannerResult};
use super::params::PlannerParams;
use super::tagging::prepare_for_access_planning;

/// Produces candidate solutions for a query
pub trait QueryEnumerator {
    fn plan(&self, query: &CanonicalQuery, params: &PlannerParams)
        -> PlannerResult<Vec<QuerySolution>>;
}

/// Child-index path from the root to a leaf, and the tag it receives
type Assignment = Vec<(Vec<usize>, IndexTag)>;

/// The built-in enumeration planner
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryPlanner;

impl QueryPlanner {
    pub fn new() -> Self {
        Self
    }

    fn indexed_solution(
        &self,
        query: &CanonicalQuery,
        params: &PlannerParams,
        assignment: &Assignment,
    ) -> PlannerResult<QuerySolution> {
        let mut tagged = query.filter().clone_untagged();
        for (path, tag) in assignment {
            let node = node_at_mut(&mut tagged, path).ok_or_else(|| {
                PlannerError::tagging_failed(format!("no node at {:?} in {}", path, query.filter()))
            })?;
            if !node.set_tag(Some(*tag)) {
                return Err(PlannerError::tagging_failed(format!(
                    "cannot tag logical node {}",
                    node
                )));
            }
        }

        // Captured before reordering so it mirrors the canonical filter.
        let tree = PlanCacheIndexTree::from_tagged(&tagged, &params.indexes)?;
        prepare_for_access_planning(&mut tagged);

        let root = build_indexed_data_access(query, &tagged, &params.indexes)?;
        let solution = analyze_data_access(query, params, root)?;

        let mut data = SolutionCacheData::index_tags(tree);
        data.index_filter_applied = params.index_filters_applied;
        Ok(solution.with_cache_data(data))
    }

    fn collection_scan(
        &self,
        query: &CanonicalQuery,
        params: &PlannerParams,
    ) -> PlannerResult<QuerySolution> {
        let filter = query.filter();
        let scan = QuerySolutionNode::leaf(Stage::CollectionScan {
            direction: SortDirection::Asc,
        })
        .with_filter((!filter.is_trivially_true()).then(|| filter.clone_untagged()));

        let mut data = SolutionCacheData::collection_scan();
        data.index_filter_applied = params.index_filters_applied;
        Ok(analyze_data_access(query, params, scan)?.with_cache_data(data))
    }

    /// Full scan of a hinted index with the whole filter applied after fetch
    fn hinted_scan(
        &self,
        query: &CanonicalQuery,
        params: &PlannerParams,
        index: &IndexEntry,
    ) -> PlannerResult<QuerySolution> {
        let filter = query.filter();
        let scan = QuerySolutionNode::leaf(Stage::IndexScan {
            index: index.clone(),
            bounds: IndexBounds::all_values(&index.key_pattern),
            direction: SortDirection::Asc,
        });
        let fetch = QuerySolutionNode::wrap(Stage::Fetch, scan)
            .with_filter((!filter.is_trivially_true()).then(|| filter.clone_untagged()));
        analyze_data_access(query, params, fetch)
    }
}

impl QueryEnumerator for QueryPlanner {
    fn plan(
        &self,
        query: &CanonicalQuery,
        params: &PlannerParams,
    ) -> PlannerResult<Vec<QuerySolution>> {
        let hinted = match &query.options().hint {
            Some(name) => Some(params.indexes.find(name).ok_or_else(|| {
                PlannerError::bad_value(format!(
                    "hint provided does not correspond to an existing index: {}",
                    name
                ))
            })?),
            None => None,
        };

        let enumerator = Enumerator {
            params,
            only: hinted.map(|(ordinal, _)| ordinal),
        };
        let assignments = enumerator.enumerate(query.filter());

        let mut solutions = Vec::new();
        for assignment in assignments.iter().take(params.max_indexed_solutions) {
            match self.indexed_solution(query, params, assignment) {
                Ok(solution) => solutions.push(solution),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => Logger::trace(
                    Event::PlannerAssignmentRejected.as_str(),
                    &[("query", &query.to_string()), ("reason", &e.to_string())],
                ),
            }
        }

        if let Some((_, index)) = hinted {
            if solutions.is_empty() {
                solutions.push(self.hinted_scan(query, params, index)?);
            }
            return Ok(solutions);
        }

        if solutions.is_empty() || params.include_collection_scan {
            solutions.push(self.collection_scan(query, params)?);
        }
        Ok(solutions)
    }
}

/// Walks the filter and lists index assignments
struct Enumerator<'a> {
    params: &'a PlannerParams,
    /// Restricts enumeration to one index ordinal
    only: Option<usize>,
}

impl Enumerator<'_> {
    fn indexes(&self) -> impl Iterator<Item = (usize, &IndexEntry)> + '_ {
        self.params
            .indexes
            .iter()
            .enumerate()
            .filter(move |(ordinal, _)| self.only.map_or(true, |o| o == *ordinal))
    }

    fn enumerate(&self, expr: &MatchExpression) -> Vec<Assignment> {
        match expr {
            MatchExpression::Leaf(leaf) if leaf.op.is_indexable() => self
                .indexes()
                .filter(|(_, index)| index.first_field() == Some(leaf.path.as_str()))
                .map(|(ordinal, _)| vec![(Vec::new(), IndexTag::new(ordinal, 0))])
                .collect(),
            MatchExpression::Leaf(_) => Vec::new(),
            MatchExpression::And(children) => self.enumerate_and(children),
            MatchExpression::Or(children) => self.enumerate_or(children),
        }
    }

    fn enumerate_and(&self, children: &[MatchExpression]) -> Vec<Assignment> {
        let mut single = Vec::new();
        for (ordinal, index) in self.indexes() {
            let Some(first) = index.first_field() else {
                continue;
            };
            let leads = children
                .iter()
                .any(|c| indexable_path(c) == Some(first));
            if !leads {
                continue;
            }

            let mut assignment = Assignment::new();
            for (pos, field) in index.key_pattern.fields().enumerate() {
                let matching = children
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| indexable_path(c) == Some(field));
                for (i, _) in matching {
                    assignment.push((vec![i], IndexTag::new(ordinal, pos)));
                    if index.multikey {
                        break;
                    }
                }
            }
            single.push((ordinal, assignment));
        }

        let mut out: Vec<Assignment> = single.iter().map(|(_, a)| a.clone()).collect();

        for (i, child) in children.iter().enumerate() {
            if child.is_logical() {
                out.extend(self.enumerate(child).into_iter().map(|a| prefixed(i, a)));
            }
        }

        if self.params.enable_index_intersection {
            if let Some(both) = first_disjoint_pair(&single) {
                out.push(both);
            }
        }
        out
    }

    fn enumerate_or(&self, children: &[MatchExpression]) -> Vec<Assignment> {
        let per_child: Vec<Vec<Assignment>> =
            children.iter().map(|c| self.enumerate(c)).collect();
        if per_child.iter().any(Vec::is_empty) {
            return Vec::new();
        }

        // Advance every child in lockstep; exhausted children repeat their
        // last assignment.
        let rounds = per_child.iter().map(Vec::len).max().unwrap_or(0);
        (0..rounds)
            .map(|round| {
                per_child
                    .iter()
                    .enumerate()
                    .flat_map(|(i, options)| {
                        let choice = &options[round.min(options.len() - 1)];
                        prefixed(i, choice.clone())
                    })
                    .collect()
            })
            .collect()
    }
}

fn indexable_path(expr: &MatchExpression) -> Option<&str> {
    expr.as_leaf()
        .filter(|leaf| leaf.op.is_indexable())
        .map(|leaf| leaf.path.as_str())
}

fn prefixed(child: usize, assignment: Assignment) -> Assignment {
    assignment
        .into_iter()
        .map(|(mut path, tag)| {
            path.insert(0, child);
            (path, tag)
        })
        .collect()
}

/// Two single-index assignments on different indexes over different
/// children, merged
fn first_disjoint_pair(single: &[(usize, Assignment)]) -> Option<Assignment> {
    for (i, (left_index, left)) in single.iter().enumerate() {
        for (right_index, right) in &single[i + 1..] {
            if left_index == right_index {
                continue;
            }
            let overlaps = left
                .iter()
                .any(|(lp, _)| right.iter().any(|(rp, _)| lp == rp));
            if !overlaps {
                let mut both = left.clone();
                both.extend(right.iter().cloned());
                return Some(both);
            }
        }
    }
    None
}

fn node_at_mut<'a>(expr: &'a mut MatchExpression, path: &[usize]) -> Option<&'a mut MatchExpression> {
    match path.split_first() {
        None => Some(expr),
        Some((first, rest)) => {
            let child = expr.children_mut()?.get_mut(*first)?;
            node_at_mut(child, rest)
        }
    }
}
