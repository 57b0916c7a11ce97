//! Complete access plans

use std::fmt;

use crate::cache::SolutionCacheData;

use super::node::{QuerySolutionNode, Stage};

/// An access plan ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySolution {
    pub root: QuerySolutionNode,
    /// A hashed intersection or explicit sort is present
    pub has_blocking_stage: bool,
    pub index_filter_applied: bool,
    /// Data for replaying this plan from the cache
    pub cache_data: Option<SolutionCacheData>,
}

impl QuerySolution {
    /// Takes ownership of `root` and computes its properties
    pub fn new(mut root: QuerySolutionNode) -> Self {
        root.compute_properties();
        let has_blocking_stage = root.has_blocking_stage();
        Self {
            root,
            has_blocking_stage,
            index_filter_applied: false,
            cache_data: None,
        }
    }

    pub fn with_cache_data(mut self, cache_data: SolutionCacheData) -> Self {
        self.cache_data = Some(cache_data);
        self
    }

    /// True if the plan reads the collection without an index
    pub fn is_collection_scan(&self) -> bool {
        self.root
            .any_node(&|n| matches!(n.stage, Stage::CollectionScan { .. }))
    }

    pub fn uses_index(&self, name: &str) -> bool {
        self.root.index_names().contains(&name)
    }

    pub fn summary(&self) -> String {
        self.root.summary()
    }
}

impl fmt::Display for QuerySolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
