//! Planning metrics
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

/// Registry of planning counters.
///
/// All counters use Relaxed ordering.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Subplanning attempts started
    subplans_attempted: AtomicU64,
    /// Attempts that produced a composite plan
    subplans_composed: AtomicU64,
    /// Attempts that fell back to whole-query planning
    whole_query_fallbacks: AtomicU64,
    /// PlanKilled / ExceededTimeLimit outcomes
    fatal_failures: AtomicU64,
    /// Branches answered from the plan cache
    branch_cache_hits: AtomicU64,
    /// Branches that needed the ranker
    branches_ranked: AtomicU64,
    /// Plan cache writes
    plan_cache_writes: AtomicU64,
    /// Trial work units across all candidates
    trial_works: AtomicU64,
    /// Trial yields
    trial_yields: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_subplans_attempted(&self) {
        self.subplans_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_subplans_composed(&self) {
        self.subplans_composed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_whole_query_fallbacks(&self) {
        self.whole_query_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_fatal_failures(&self) {
        self.fatal_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_branch_cache_hits(&self) {
        self.branch_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_branches_ranked(&self) {
        self.branches_ranked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_plan_cache_writes(&self) {
        self.plan_cache_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds trial work units
    pub fn add_trial_works(&self, works: u64) {
        self.trial_works.fetch_add(works, Ordering::Relaxed);
    }

    pub fn increment_trial_yields(&self) {
        self.trial_yields.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"{{"subplans_attempted":{},"subplans_composed":{},"whole_query_fallbacks":{},"fatal_failures":{},"branch_cache_hits":{},"branches_ranked":{},"plan_cache_writes":{},"trial_works":{},"trial_yields":{}}}"#,
            s.subplans_attempted,
            s.subplans_composed,
            s.whole_query_fallbacks,
            s.fatal_failures,
            s.branch_cache_hits,
            s.branches_ranked,
            s.plan_cache_writes,
            s.trial_works,
            s.trial_yields,
        )
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            subplans_attempted: self.subplans_attempted.load(Ordering::Relaxed),
            subplans_composed: self.subplans_composed.load(Ordering::Relaxed),
            whole_query_fallbacks: self.whole_query_fallbacks.load(Ordering::Relaxed),
            fatal_failures: self.fatal_failures.load(Ordering::Relaxed),
            branch_cache_hits: self.branch_cache_hits.load(Ordering::Relaxed),
            branches_ranked: self.branches_ranked.load(Ordering::Relaxed),
            plan_cache_writes: self.plan_cache_writes.load(Ordering::Relaxed),
            trial_works: self.trial_works.load(Ordering::Relaxed),
            trial_yields: self.trial_yields.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub subplans_attempted: u64,
    pub subplans_composed: u64,
    pub whole_query_fallbacks: u64,
    pub fatal_failures: u64,
    pub branch_cache_hits: u64,
    pub branches_ranked: u64,
    pub plan_cache_writes: u64,
    pub trial_works: u64,
    pub trial_yields: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let snapshot = MetricsRegistry::new().snapshot();
        assert_eq!(snapshot.subplans_attempted, 0);
        assert_eq!(snapshot.trial_works, 0);
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();
        registry.increment_subplans_attempted();
        registry.increment_subplans_attempted();
        registry.increment_whole_query_fallbacks();
        registry.add_trial_works(42);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.subplans_attempted, 2);
        assert_eq!(snapshot.whole_query_fallbacks, 1);
        assert_eq!(snapshot.trial_works, 42);
    }

    #[test]
    fn test_to_json() {
        let registry = MetricsRegistry::new();
        registry.increment_branch_cache_hits();

        let parsed: serde_json::Value = serde_json::from_str(&registry.to_json()).unwrap();
        assert_eq!(parsed["branch_cache_hits"], 1);
        assert_eq!(parsed["fatal_failures"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        reg.increment_trial_yields();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.snapshot().trial_yields, 800);
    }
}
