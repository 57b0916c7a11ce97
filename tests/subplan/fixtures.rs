//! Collections, queries and planning environments for the suites

use serde_json::json;
use subplanner::cache::InMemoryPlanCache;
use subplanner::catalog::{Collection, RecordId};
use subplanner::config::SubplannerConfig;
use subplanner::expression::MatchExpression;
use subplanner::index::{IndexEntry, SortPattern};
use subplanner::observability::MetricsRegistry;
use subplanner::query::{CanonicalQuery, OperationContext, QueryOptions};
use subplanner::ranker::execute_to_completion;
use subplanner::solution::QuerySolution;
use subplanner::subplan::PlanningEnv;

/// Everything a planning call borrows, owned in one place
pub struct Harness {
    pub ctx: OperationContext,
    pub collection: Collection,
    pub cache: InMemoryPlanCache,
    pub config: SubplannerConfig,
    pub metrics: MetricsRegistry,
}

impl Harness {
    pub fn new(collection: Collection) -> Self {
        Self {
            ctx: OperationContext::new(),
            collection,
            cache: InMemoryPlanCache::new(),
            config: SubplannerConfig::default(),
            metrics: MetricsRegistry::new(),
        }
    }

    pub fn with_config(mut self, config: SubplannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_ctx(mut self, ctx: OperationContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn env(&self) -> PlanningEnv<'_> {
        PlanningEnv::new(
            &self.ctx,
            &self.collection,
            &self.cache,
            &self.config,
            &self.metrics,
        )
    }
}

pub fn index(name: &str, fields: &[&str]) -> IndexEntry {
    IndexEntry::new(name, SortPattern::ascending(fields.iter().copied()))
}

/// 100 documents: `a` unique, `b` alternating 0/1, `c` cycling 0..10,
/// `d` unindexed
pub fn numbers() -> Collection {
    let docs = (0..100)
        .map(|i| json!({"a": i, "b": i % 2, "c": i % 10, "d": i % 7}))
        .collect();
    Collection::with_documents(
        "numbers",
        docs,
        vec![index("a_1", &["a"]), index("b_1", &["b"]), index("c_1", &["c"])],
    )
}

/// Documents with two indexed fields of mixed types
pub fn fields() -> Collection {
    let docs = (0..40)
        .map(|i| {
            let label = if i % 4 == 0 { "x" } else { "y" };
            json!({"field1": i % 8, "field2": label, "other": i})
        })
        .collect();
    Collection::with_documents(
        "fields",
        docs,
        vec![
            index("field1_1", &["field1"]),
            index("field2_1", &["field2"]),
        ],
    )
}

/// Documents for the contained-OR scenarios; only `z` and `w` are indexed
pub fn coordinates() -> Collection {
    let docs = (0..60)
        .map(|i| json!({"x": i % 2, "y": i % 3, "z": i % 5, "w": i % 4}))
        .collect();
    Collection::with_documents(
        "coordinates",
        docs,
        vec![index("z_1", &["z"]), index("w_1", &["w"])],
    )
}

pub fn query(filter: MatchExpression) -> CanonicalQuery {
    CanonicalQuery::canonicalize(filter, QueryOptions::new()).unwrap()
}

pub fn query_with(filter: MatchExpression, options: QueryOptions) -> CanonicalQuery {
    CanonicalQuery::canonicalize(filter, options).unwrap()
}

/// Record ids the solution produces, sorted
pub fn executed_ids(solution: &QuerySolution, collection: &Collection) -> Vec<RecordId> {
    let mut ids: Vec<RecordId> = execute_to_completion(&solution.root, collection)
        .unwrap()
        .into_iter()
        .filter_map(|m| m.record_id)
        .collect();
    ids.sort_unstable();
    ids
}

/// Record ids whose document matches `filter`, sorted
pub fn matching_ids(filter: &MatchExpression, collection: &Collection) -> Vec<RecordId> {
    collection
        .record_ids()
        .filter(|rid| collection.record(*rid).map_or(false, |doc| filter.matches(doc)))
        .collect()
}
