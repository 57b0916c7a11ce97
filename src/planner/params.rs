//! Inputs to one planning call besides the query itself

use crate::config::EnumerationConfig;
use crate::index::IndexCatalog;

/// Index catalog and enumeration limits for a planning call
#[derive(Debug, Clone)]
pub struct PlannerParams {
    /// Indexes visible to this planning attempt, in declaration order
    pub indexes: IndexCatalog,
    /// Consider two-index intersections
    pub enable_index_intersection: bool,
    /// Upper bound on indexed candidates per call
    pub max_indexed_solutions: usize,
    /// The catalog was narrowed by an index filter
    pub index_filters_applied: bool,
    /// Emit a collection scan candidate even when indexed plans exist
    pub include_collection_scan: bool,
}

impl PlannerParams {
    pub fn new(indexes: IndexCatalog) -> Self {
        Self::from_config(indexes, &EnumerationConfig::default())
    }

    pub fn from_config(indexes: IndexCatalog, config: &EnumerationConfig) -> Self {
        Self {
            indexes,
            enable_index_intersection: config.enable_index_intersection,
            max_indexed_solutions: config.max_indexed_solutions,
            index_filters_applied: false,
            include_collection_scan: false,
        }
    }

    pub fn with_collection_scan(mut self) -> Self {
        self.include_collection_scan = true;
        self
    }

    pub fn with_index_filters_applied(mut self) -> Self {
        self.index_filters_applied = true;
        self
    }
}
