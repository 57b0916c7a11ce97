//! Index-assignment trees
//!
//! A `PlanCacheIndexTree` mirrors a predicate tree node for node and
//! records which index (by name) and key position answers each leaf. It is
//! what a cache entry stores and what tagging replays.

use std::fmt;

use crate::expression::MatchExpression;
use crate::index::IndexCatalog;
use crate::planner::{PlannerError, PlannerResult};

/// Index and key position answering one leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexAssignment {
    pub index_name: String,
    pub pos: usize,
}

/// Index assignments shaped like the predicate they came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanCacheIndexTree {
    pub entry: Option<IndexAssignment>,
    pub children: Vec<PlanCacheIndexTree>,
}

impl PlanCacheIndexTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assigned(index_name: impl Into<String>, pos: usize) -> Self {
        Self {
            entry: Some(IndexAssignment {
                index_name: index_name.into(),
                pos,
            }),
            children: Vec::new(),
        }
    }

    /// Captures the tags of a tagged predicate
    pub fn from_tagged(expr: &MatchExpression, indexes: &IndexCatalog) -> PlannerResult<Self> {
        let entry = match expr.tag() {
            Some(tag) => {
                let index = indexes.get(tag.index).ok_or_else(|| {
                    PlannerError::tagging_failed(format!(
                        "tag references unknown index ordinal {}",
                        tag.index
                    ))
                })?;
                Some(IndexAssignment {
                    index_name: index.name.clone(),
                    pos: tag.pos,
                })
            }
            None => None,
        };
        let children = expr
            .children()
            .iter()
            .map(|c| Self::from_tagged(c, indexes))
            .collect::<PlannerResult<Vec<_>>>()?;
        Ok(Self { entry, children })
    }

    /// True if any node carries an assignment
    pub fn has_assignments(&self) -> bool {
        self.entry.is_some() || self.children.iter().any(Self::has_assignments)
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "---".repeat(depth);
        match &self.entry {
            Some(a) => writeln!(f, "{}Leaf {}, pos: {}", indent, a.index_name, a.pos)?,
            None if self.children.is_empty() => writeln!(f, "{}Leaf (untagged)", indent)?,
            None => writeln!(f, "{}Node", indent)?,
        }
        for child in &self.children {
            child.render(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for PlanCacheIndexTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

/// Kind of a cached solution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionType {
    /// Replay by tagging the predicate with the stored assignments
    UseIndexTags,
    /// Plain collection scan; nothing to replay
    CollectionScan,
}

impl SolutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolutionType::UseIndexTags => "USE_INDEX_TAGS",
            SolutionType::CollectionScan => "COLLSCAN",
        }
    }
}

/// What the plan cache stores for one solution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionCacheData {
    pub tree: Option<PlanCacheIndexTree>,
    pub solution_type: SolutionType,
    pub index_filter_applied: bool,
}

impl SolutionCacheData {
    pub fn index_tags(tree: PlanCacheIndexTree) -> Self {
        Self {
            tree: Some(tree),
            solution_type: SolutionType::UseIndexTags,
            index_filter_applied: false,
        }
    }

    pub fn collection_scan() -> Self {
        Self {
            tree: None,
            solution_type: SolutionType::CollectionScan,
            index_filter_applied: false,
        }
    }

    /// Index-tagged data with a tree to replay
    pub fn indexed_tree(&self) -> Option<&PlanCacheIndexTree> {
        match self.solution_type {
            SolutionType::UseIndexTags => self.tree.as_ref(),
            SolutionType::CollectionScan => None,
        }
    }
}
