//! Plan cache
//!
//! Planning reads and writes through the `PlanCache` trait only. Entries
//! are keyed by query shape and hold index-assignment trees, never plan
//! trees.

mod index_tree;
mod plan_cache;

pub use index_tree::{IndexAssignment, PlanCacheIndexTree, SolutionCacheData, SolutionType};
pub use plan_cache::{
    should_cache_query, CachedSolution, CachingMode, InMemoryPlanCache, PlanCache, PlanCacheKey,
};
