//! Physical access-plan nodes
//!
//! `QuerySolutionNode` is a single-owner tree over a closed set of stage
//! kinds. Derived properties are computed bottom-up by
//! `compute_properties`, which must run before any property is read.

use std::collections::BTreeSet;

use crate::expression::MatchExpression;
use crate::index::{IndexBounds, IndexEntry, SortDirection, SortPattern};
use crate::query::Projection;

/// How a projection obtains its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    /// Built from the key data of a single index scan
    CoveredOneIndex,
    /// Inclusion-only over full documents
    SimpleDoc,
    /// Anything else
    Default,
}

impl ProjectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectionKind::CoveredOneIndex => "COVERED_ONE_INDEX",
            ProjectionKind::SimpleDoc => "SIMPLE_DOC",
            ProjectionKind::Default => "DEFAULT",
        }
    }
}

/// Stage kind and its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    CollectionScan {
        direction: SortDirection,
    },
    IndexScan {
        index: IndexEntry,
        bounds: IndexBounds,
        direction: SortDirection,
    },
    Fetch,
    /// Hashed intersection; buffers every child but the last
    AndHash,
    /// Streaming intersection over record-id ordered children
    AndSorted,
    Or {
        dedup: bool,
    },
    MergeSort {
        sort: SortPattern,
        dedup: bool,
    },
    /// Blocking sort
    Sort {
        pattern: SortPattern,
        limit: Option<u64>,
    },
    Limit(u64),
    Skip(u64),
    Projection {
        spec: Projection,
        kind: ProjectionKind,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::CollectionScan { .. } => "COLLSCAN",
            Stage::IndexScan { .. } => "IXSCAN",
            Stage::Fetch => "FETCH",
            Stage::AndHash => "AND_HASH",
            Stage::AndSorted => "AND_SORTED",
            Stage::Or { .. } => "OR",
            Stage::MergeSort { .. } => "SORT_MERGE",
            Stage::Sort { .. } => "SORT",
            Stage::Limit(_) => "LIMIT",
            Stage::Skip(_) => "SKIP",
            Stage::Projection { .. } => "PROJECTION",
        }
    }

    /// Stages that buffer or reorder before producing output
    pub fn is_blocking(&self) -> bool {
        matches!(self, Stage::AndHash | Stage::Sort { .. })
    }
}

/// Derived properties of a node's output stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    /// Output carries full documents
    pub fetched: bool,
    /// Fields available without a fetch; ignored when `fetched`
    pub provided_fields: BTreeSet<String>,
    /// Output is in record-id order
    pub sorted_by_record_id: bool,
    /// Every sort order the output satisfies
    pub sort_orders: BTreeSet<SortPattern>,
}

/// One node of an access plan
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySolutionNode {
    pub stage: Stage,
    pub children: Vec<QuerySolutionNode>,
    /// Residual predicate applied to this node's output
    pub filter: Option<MatchExpression>,
    props: Option<Properties>,
}

impl QuerySolutionNode {
    pub fn new(stage: Stage, children: Vec<QuerySolutionNode>) -> Self {
        Self {
            stage,
            children,
            filter: None,
            props: None,
        }
    }

    pub fn leaf(stage: Stage) -> Self {
        Self::new(stage, Vec::new())
    }

    /// Wraps `child` in a single-child stage
    pub fn wrap(stage: Stage, child: QuerySolutionNode) -> Self {
        Self::new(stage, vec![child])
    }

    pub fn with_filter(mut self, filter: Option<MatchExpression>) -> Self {
        self.filter = filter;
        self
    }

    /// Computes properties for the whole subtree, children first
    pub fn compute_properties(&mut self) {
        for child in &mut self.children {
            child.compute_properties();
        }
        self.props = Some(self.derive_properties());
    }

    pub fn properties_computed(&self) -> bool {
        self.props.is_some()
    }

    fn props(&self) -> &Properties {
        match &self.props {
            Some(props) => props,
            None => panic!(
                "properties of {} read before compute_properties",
                self.stage.name()
            ),
        }
    }

    pub fn fetched(&self) -> bool {
        self.props().fetched
    }

    pub fn has_field(&self, field: &str) -> bool {
        let props = self.props();
        props.fetched || props.provided_fields.contains(field)
    }

    pub fn sorted_by_record_id(&self) -> bool {
        self.props().sorted_by_record_id
    }

    pub fn sort_orders(&self) -> &BTreeSet<SortPattern> {
        &self.props().sort_orders
    }

    pub fn provides_sort(&self, sort: &SortPattern) -> bool {
        sort.is_empty() || self.sort_orders().contains(sort)
    }

    /// True if this node or any descendant satisfies `pred`
    pub fn any_node(&self, pred: &impl Fn(&QuerySolutionNode) -> bool) -> bool {
        pred(self) || self.children.iter().any(|c| c.any_node(pred))
    }

    pub fn has_blocking_stage(&self) -> bool {
        self.any_node(&|n| n.stage.is_blocking())
    }

    /// Calls `f` for every node in pre-order
    pub fn for_each<'a>(&'a self, f: &mut impl FnMut(&'a QuerySolutionNode)) {
        f(self);
        for child in &self.children {
            child.for_each(f);
        }
    }

    /// Names of every index scanned by the subtree, in pre-order
    pub fn index_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.for_each(&mut |n| {
            if let Stage::IndexScan { index, .. } = &n.stage {
                names.push(index.name.as_str());
            }
        });
        names
    }

    fn child_props(&self) -> impl Iterator<Item = &Properties> {
        self.children.iter().map(QuerySolutionNode::props)
    }

    fn first_child_props(&self) -> Properties {
        self.children
            .first()
            .map(|c| c.props().clone())
            .unwrap_or_default()
    }

    fn derive_properties(&self) -> Properties {
        match &self.stage {
            Stage::CollectionScan { .. } => Properties {
                fetched: true,
                ..Properties::default()
            },
            Stage::IndexScan {
                index,
                bounds,
                direction,
            } => index_scan_properties(index, bounds, *direction),
            Stage::Fetch => {
                let child = self.first_child_props();
                Properties {
                    fetched: true,
                    provided_fields: BTreeSet::new(),
                    sorted_by_record_id: child.sorted_by_record_id,
                    sort_orders: child.sort_orders,
                }
            }
            Stage::AndHash | Stage::AndSorted => {
                let fetched = self.child_props().any(|p| p.fetched);
                let provided_fields = self
                    .child_props()
                    .flat_map(|p| p.provided_fields.iter().cloned())
                    .collect();
                let (sorted_by_record_id, sort_orders) = match self.stage {
                    Stage::AndSorted => (true, BTreeSet::new()),
                    _ => (
                        false,
                        self.children
                            .last()
                            .map(|c| c.props().sort_orders.clone())
                            .unwrap_or_default(),
                    ),
                };
                Properties {
                    fetched,
                    provided_fields,
                    sorted_by_record_id,
                    sort_orders,
                }
            }
            Stage::Or { .. } | Stage::MergeSort { .. } => {
                let fetched = !self.children.is_empty() && self.child_props().all(|p| p.fetched);
                let provided_fields = intersect_fields(self.child_props());
                let sort_orders = match &self.stage {
                    Stage::MergeSort { sort, .. } => BTreeSet::from([sort.clone()]),
                    _ => BTreeSet::new(),
                };
                Properties {
                    fetched,
                    provided_fields,
                    sorted_by_record_id: false,
                    sort_orders,
                }
            }
            Stage::Sort { pattern, .. } => {
                let child = self.first_child_props();
                Properties {
                    fetched: child.fetched,
                    provided_fields: child.provided_fields,
                    sorted_by_record_id: false,
                    sort_orders: BTreeSet::from([pattern.clone()]),
                }
            }
            Stage::Limit(_) | Stage::Skip(_) => self.first_child_props(),
            Stage::Projection { spec, .. } => {
                let child = self.first_child_props();
                let provided_fields = match spec {
                    Projection::Include(fields) => fields.iter().cloned().collect(),
                    Projection::Exclude(_) => child.provided_fields,
                };
                Properties {
                    fetched: child.fetched && !spec.is_inclusion_only(),
                    provided_fields,
                    sorted_by_record_id: child.sorted_by_record_id,
                    sort_orders: child.sort_orders,
                }
            }
        }
    }
}

fn index_scan_properties(
    index: &IndexEntry,
    bounds: &IndexBounds,
    direction: SortDirection,
) -> Properties {
    let provided_fields = if index.multikey {
        BTreeSet::new()
    } else {
        index.key_pattern.fields().map(str::to_string).collect()
    };

    let pattern = match direction {
        SortDirection::Asc => index.key_pattern.clone(),
        SortDirection::Desc => index.key_pattern.reversed(),
    };
    let mut sort_orders = BTreeSet::new();
    // Leading equality fields do not disturb the order of what follows.
    for start in 0..=bounds.equality_prefix_len().min(pattern.len()) {
        let suffix = pattern.suffix(start);
        for len in 1..=suffix.len() {
            sort_orders.insert(suffix.prefix(len));
        }
    }

    Properties {
        fetched: false,
        provided_fields,
        sorted_by_record_id: bounds.is_point_scan(),
        sort_orders,
    }
}

fn intersect_fields<'a>(props: impl Iterator<Item = &'a Properties>) -> BTreeSet<String> {
    // Fetched children provide every field.
    let mut acc: Option<BTreeSet<String>> = None;
    for p in props.filter(|p| !p.fetched) {
        acc = Some(match acc {
            None => p.provided_fields.clone(),
            Some(fields) => fields.intersection(&p.provided_fields).cloned().collect(),
        });
    }
    acc.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::LeafOp;
    use serde_json::json;

    fn ixscan(name: &str, field: &str, op: Option<LeafOp>) -> QuerySolutionNode {
        let pattern = SortPattern::ascending([field]);
        let mut bounds = IndexBounds::all_values(&pattern);
        if let Some(op) = op {
            bounds.constrain(0, &op);
        }
        QuerySolutionNode::leaf(Stage::IndexScan {
            index: IndexEntry::new(name, pattern),
            bounds,
            direction: SortDirection::Asc,
        })
    }

    #[test]
    fn test_index_scan_properties() {
        let mut node = ixscan("a_1", "a", Some(LeafOp::Eq(json!(5))));
        node.compute_properties();
        assert!(!node.fetched());
        assert!(node.has_field("a"));
        assert!(!node.has_field("b"));
        assert!(node.sorted_by_record_id());
        assert!(node.provides_sort(&SortPattern::ascending(["a"])));
    }

    #[test]
    fn test_range_scan_not_record_id_ordered() {
        let mut node = ixscan("a_1", "a", Some(LeafOp::Gt(json!(5))));
        node.compute_properties();
        assert!(!node.sorted_by_record_id());
    }

    #[test]
    fn test_fetch_over_or() {
        let mut node = QuerySolutionNode::wrap(
            Stage::Fetch,
            QuerySolutionNode::new(
                Stage::Or { dedup: true },
                vec![
                    ixscan("a_1", "a", Some(LeafOp::Eq(json!(1)))),
                    ixscan("b_1", "b", Some(LeafOp::Eq(json!(2)))),
                ],
            ),
        );
        node.compute_properties();
        assert!(node.fetched());
        assert!(!node.children[0].fetched());
        assert!(!node.children[0].has_field("a"));
        assert!(node.sort_orders().is_empty());
        assert!(!node.has_blocking_stage());
        assert_eq!(node.index_names(), vec!["a_1", "b_1"]);
    }

    #[test]
    fn test_blocking_stages() {
        let node = QuerySolutionNode::new(
            Stage::AndHash,
            vec![ixscan("a_1", "a", None), ixscan("b_1", "b", None)],
        );
        assert!(node.has_blocking_stage());

        let sort = QuerySolutionNode::wrap(
            Stage::Sort {
                pattern: SortPattern::ascending(["a"]),
                limit: None,
            },
            QuerySolutionNode::leaf(Stage::CollectionScan {
                direction: SortDirection::Asc,
            }),
        );
        assert!(sort.has_blocking_stage());
    }

    #[test]
    fn test_compound_equality_prefix_sorts() {
        let pattern = SortPattern::ascending(["a", "b"]);
        let mut bounds = IndexBounds::all_values(&pattern);
        bounds.constrain(0, &LeafOp::Eq(json!(1)));
        let mut node = QuerySolutionNode::leaf(Stage::IndexScan {
            index: IndexEntry::new("a_1_b_1", pattern),
            bounds,
            direction: SortDirection::Asc,
        });
        node.compute_properties();
        assert!(node.provides_sort(&SortPattern::ascending(["b"])));
        assert!(node.provides_sort(&SortPattern::ascending(["a", "b"])));
        assert!(!node.provides_sort(&SortPattern::ascending(["b", "a"])));
    }

    #[test]
    #[should_panic(expected = "before compute_properties")]
    fn test_reading_properties_early_panics() {
        let node = ixscan("a_1", "a", None);
        node.fetched();
    }
}
