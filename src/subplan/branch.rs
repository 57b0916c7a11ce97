//! Planning of a single OR branch
//!
//! A branch becomes its own canonical query. Its winning plan comes from
//! the plan cache when possible, otherwise from enumeration, ranking the
//! candidates when there is more than one. Only a winner with index-tagged
//! cache data can be composed.

use std::fmt;

use crate::cache::{should_cache_query, CachingMode, PlanCacheKey, SolutionCacheData};
use crate::expression::MatchExpression;
use crate::observability::{Event, Logger};
use crate::planner::{PlannerError, PlannerParams, PlannerResult};
use crate::query::CanonicalQuery;
use crate::ranker::WorkingSet;

use super::env::PlanningEnv;

/// Where a branch's winning plan came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchSource {
    /// Plan cache hit; no enumeration ran
    FromCache,
    /// Enumeration produced exactly one candidate
    Single,
    /// The ranker picked among several candidates
    Ranked,
}

impl BranchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchSource::FromCache => "cache",
            BranchSource::Single => "single",
            BranchSource::Ranked => "ranked",
        }
    }
}

impl fmt::Display for BranchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A planned branch
#[derive(Debug, Clone)]
pub struct BranchPlan {
    pub query: CanonicalQuery,
    pub source: BranchSource,
    /// Index-tagged assignment of the winner
    pub cache_data: SolutionCacheData,
}

/// Plans branch `index`, the OR child `branch` of `parent`.
///
/// Errors carry no branch context; the caller attaches it.
pub(crate) fn plan_branch(
    env: &PlanningEnv<'_>,
    parent: &CanonicalQuery,
    index: usize,
    branch: &MatchExpression,
    params: &PlannerParams,
    ws: &mut WorkingSet,
) -> PlannerResult<BranchPlan> {
    let query = CanonicalQuery::canonicalize_subquery(parent, branch)?;
    let branch_no = index.to_string();

    if should_cache_query(&query) {
        let key = PlanCacheKey::from_query(&query);
        if let Some(data) = env.cache.get(&key).and_then(|hit| hit.winner().cloned()) {
            env.metrics.increment_branch_cache_hits();
            Logger::trace(
                Event::SubplanBranchCacheHit.as_str(),
                &[("branch", &branch_no), ("key", key.as_str())],
            );
            return adopt(query, BranchSource::FromCache, Some(data));
        }
    }

    let mut solutions = env.enumerator.plan(&query, params)?;
    Logger::trace(
        Event::SubplanBranchPlanned.as_str(),
        &[
            ("branch", &branch_no),
            ("candidates", &solutions.len().to_string()),
        ],
    );

    match solutions.len() {
        0 => Err(PlannerError::no_query_solutions(format!(
            "no solutions for subchild {}",
            query
        ))),
        1 => {
            let winner = solutions.remove(0);
            adopt(query, BranchSource::Single, winner.cache_data)
        }
        _ => {
            ws.clear();
            env.metrics.increment_branches_ranked();
            // Only a clear winner of a branch trial is cached.
            let decision = env.ranker.pick_best_plan(
                &query,
                solutions,
                ws,
                &env.trial_context(),
                CachingMode::Sometimes,
            )?;
            adopt(query, BranchSource::Ranked, decision.winner.cache_data)
        }
    }
}

fn adopt(
    query: CanonicalQuery,
    source: BranchSource,
    cache_data: Option<SolutionCacheData>,
) -> PlannerResult<BranchPlan> {
    match cache_data {
        Some(data) if data.indexed_tree().is_some() => Ok(BranchPlan {
            query,
            source,
            cache_data: data,
        }),
        _ => Err(PlannerError::no_indexed_cache_data(format!(
            "no indexed cache data for subchild {}",
            query
        ))),
    }
}
