//! Plan cache interface and in-memory store

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crate::query::CanonicalQuery;

use super::index_tree::SolutionCacheData;

/// Cache key: the shape of a canonical query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanCacheKey(String);

impl PlanCacheKey {
    pub fn from_query(query: &CanonicalQuery) -> Self {
        Self(query.shape())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlanCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cache hit
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSolution {
    pub key: PlanCacheKey,
    /// Winning plan first
    pub planner_data: Vec<SolutionCacheData>,
    /// Ranker score that earned the entry
    pub score: f64,
}

impl CachedSolution {
    pub fn winner(&self) -> Option<&SolutionCacheData> {
        self.planner_data.first()
    }
}

/// Plan cache as seen by planning. Eviction is the store's concern.
pub trait PlanCache {
    fn get(&self, key: &PlanCacheKey) -> Option<CachedSolution>;

    fn add(&self, key: PlanCacheKey, data: SolutionCacheData, score: f64);
}

/// When a ranker may write its winner to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachingMode {
    Always,
    /// Only when the winner is clearly ahead and produced results
    Sometimes,
    Never,
}

/// Whether plans for `query` may be read from or written to the cache
pub fn should_cache_query(query: &CanonicalQuery) -> bool {
    let options = query.options();
    if options.hint.is_some() || options.has_min_max() {
        return false;
    }
    if options.explain || options.tailable || options.snapshot {
        return false;
    }
    !(query.filter().is_trivially_true() && options.sort.is_empty())
}

/// Mutex-guarded map; never evicts
#[derive(Debug, Default)]
pub struct InMemoryPlanCache {
    entries: Mutex<HashMap<PlanCacheKey, CachedSolution>>,
}

impl InMemoryPlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &PlanCacheKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PlanCacheKey, CachedSolution>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl PlanCache for InMemoryPlanCache {
    fn get(&self, key: &PlanCacheKey) -> Option<CachedSolution> {
        self.lock().get(key).cloned()
    }

    fn add(&self, key: PlanCacheKey, data: SolutionCacheData, score: f64) {
        let entry = CachedSolution {
            key: key.clone(),
            planner_data: vec![data],
            score,
        };
        self.lock().insert(key, entry);
    }
}
