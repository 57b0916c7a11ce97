//! Access-plan construction from a tagged predicate
//!
//! Tagged leaves become index scans. Leaves of one AND tagged with the
//! same index share a single scan with compound bounds. Whatever the
//! scans do not answer becomes a residual filter on a FETCH.

use crate::expression::{IndexTag, LeafExpression, MatchExpression};
use crate::index::{IndexBounds, IndexCatalog, IndexEntry, SortDirection};
use crate::query::CanonicalQuery;
use crate::solution::{QuerySolutionNode, Stage};

use super::errors::{PlannerError, PlannerResult};

/// Builds the access plan for a fully tagged predicate.
///
/// Properties of the returned tree are not computed.
pub fn build_indexed_data_access(
    query: &CanonicalQuery,
    expr: &MatchExpression,
    indexes: &IndexCatalog,
) -> PlannerResult<QuerySolutionNode> {
    match expr {
        MatchExpression::Leaf(leaf) => {
            let tag = leaf.tag.ok_or_else(|| {
                PlannerError::build_failed(format!("leaf {} has no index tag", expr))
            })?;
            let mut scan = ScanBuilder::new(tag.index, indexes)?;
            scan.add(leaf, tag)?;
            Ok(scan.finish())
        }
        MatchExpression::And(children) => build_and(query, children, indexes),
        MatchExpression::Or(children) => build_or(query, children, indexes),
    }
}

/// Accumulates bounds for one index scan
struct ScanBuilder {
    ordinal: usize,
    index: IndexEntry,
    bounds: IndexBounds,
    constrained: Vec<bool>,
}

impl ScanBuilder {
    fn new(ordinal: usize, indexes: &IndexCatalog) -> PlannerResult<Self> {
        let index = indexes.get(ordinal).ok_or_else(|| {
            PlannerError::build_failed(format!("no index with ordinal {}", ordinal))
        })?;
        Ok(Self {
            ordinal,
            bounds: IndexBounds::all_values(&index.key_pattern),
            constrained: vec![false; index.key_pattern.len()],
            index: index.clone(),
        })
    }

    /// Narrows the bounds by `leaf`. Returns false when the leaf has to be
    /// checked after the scan instead.
    fn add(&mut self, leaf: &LeafExpression, tag: IndexTag) -> PlannerResult<bool> {
        let field = self.index.key_pattern.specs().get(tag.pos).map(|s| &s.field);
        if field != Some(&leaf.path) {
            return Err(PlannerError::build_failed(format!(
                "index {} has no field {} at position {}",
                self.index.name, leaf.path, tag.pos
            )));
        }

        // Bounds on one multikey field cannot be intersected.
        if self.index.multikey && self.constrained[tag.pos] {
            return Ok(false);
        }

        if !self.bounds.constrain(tag.pos, &leaf.op) {
            return Err(PlannerError::build_failed(format!(
                "leaf {}: {} cannot be expressed as index bounds",
                leaf.path,
                leaf.op.render_operand()
            )));
        }
        self.constrained[tag.pos] = true;
        Ok(true)
    }

    fn finish(self) -> QuerySolutionNode {
        QuerySolutionNode::leaf(Stage::IndexScan {
            index: self.index,
            bounds: self.bounds,
            direction: SortDirection::Asc,
        })
    }
}

fn build_and(
    query: &CanonicalQuery,
    children: &[MatchExpression],
    indexes: &IndexCatalog,
) -> PlannerResult<QuerySolutionNode> {
    let mut scans: Vec<ScanBuilder> = Vec::new();
    let mut nested = Vec::new();
    let mut residual = Vec::new();

    for child in children {
        match child {
            MatchExpression::Leaf(leaf) => {
                let Some(tag) = leaf.tag else {
                    residual.push(child.clone_untagged());
                    continue;
                };
                let scan = match scans.iter().position(|s| s.ordinal == tag.index) {
                    Some(i) => &mut scans[i],
                    None => {
                        scans.push(ScanBuilder::new(tag.index, indexes)?);
                        let last = scans.len() - 1;
                        &mut scans[last]
                    }
                };
                if !scan.add(leaf, tag)? {
                    residual.push(child.clone_untagged());
                }
            }
            _ if child.has_tags() => nested.push(build_indexed_data_access(query, child, indexes)?),
            _ => residual.push(child.clone_untagged()),
        }
    }

    let mut nodes: Vec<QuerySolutionNode> = scans
        .into_iter()
        .map(ScanBuilder::finish)
        .chain(nested)
        .collect();

    let root = match nodes.len() {
        0 => {
            return Err(PlannerError::build_failed(
                "AND has no index-tagged child to scan",
            ))
        }
        1 => nodes.remove(0),
        _ => {
            nodes.iter_mut().for_each(QuerySolutionNode::compute_properties);
            let stage = if nodes.iter().all(QuerySolutionNode::sorted_by_record_id) {
                Stage::AndSorted
            } else {
                Stage::AndHash
            };
            QuerySolutionNode::new(stage, nodes)
        }
    };

    let filter = match residual.len() {
        0 => return Ok(root),
        1 => residual.remove(0),
        _ => MatchExpression::and(residual),
    };
    Ok(QuerySolutionNode::wrap(Stage::Fetch, root).with_filter(Some(filter)))
}

fn build_or(
    query: &CanonicalQuery,
    children: &[MatchExpression],
    indexes: &IndexCatalog,
) -> PlannerResult<QuerySolutionNode> {
    let mut nodes = children
        .iter()
        .map(|c| build_indexed_data_access(query, c, indexes))
        .collect::<PlannerResult<Vec<_>>>()?;
    nodes.iter_mut().for_each(QuerySolutionNode::compute_properties);

    let sort = &query.options().sort;
    let stage = if !sort.is_empty() && nodes.iter().all(|n| n.provides_sort(sort)) {
        Stage::MergeSort {
            sort: sort.clone(),
            dedup: true,
        }
    } else {
        Stage::Or { dedup: true }
    };
    Ok(QuerySolutionNode::new(stage, nodes))
}
