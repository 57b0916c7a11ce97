//! Query options that accompany a predicate

use serde_json::Value;

use crate::index::SortPattern;

use super::projection::Projection;

/// Options of a find-style query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Forced index name
    pub hint: Option<String>,
    /// Lower key bound override
    pub min: Option<Value>,
    /// Upper key bound override
    pub max: Option<Value>,
    pub tailable: bool,
    pub snapshot: bool,
    pub explain: bool,
    /// Requested output order; empty when unsorted
    pub sort: SortPattern,
    pub projection: Option<Projection>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    /// Collation name, inherited by branch sub-queries
    pub collation: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hint(mut self, index: impl Into<String>) -> Self {
        self.hint = Some(index.into());
        self
    }

    pub fn with_min(mut self, min: Value) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: Value) -> Self {
        self.max = Some(max);
        self
    }

    pub fn tailable(mut self) -> Self {
        self.tailable = true;
        self
    }

    pub fn snapshot(mut self) -> Self {
        self.snapshot = true;
        self
    }

    pub fn explain(mut self) -> Self {
        self.explain = true;
        self
    }

    pub fn with_sort(mut self, sort: SortPattern) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Min and max are special cases of a hint
    pub fn has_min_max(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Options a branch sub-query inherits from its parent.
    ///
    /// Projection, sort, collation and explain carry over. Access-path
    /// overrides and result windowing stay with the parent.
    pub fn for_subquery(&self) -> Self {
        Self {
            sort: self.sort.clone(),
            projection: self.projection.clone(),
            collation: self.collation.clone(),
            explain: self.explain,
            ..Self::default()
        }
    }
}
