//! OR-query subplanner
//!
//! A query whose predicate is a rooted OR, or an AND with exactly one OR
//! child, is planned one branch at a time. Each branch gets its own
//! indexed winner (from the plan cache, enumeration, or a ranking trial)
//! and the winners' index assignments are composed into one plan over the
//! whole OR.
//!
//! # Failure handling
//!
//! Subplanning only ever optimizes. Any recoverable failure discards the
//! attempt and plans the original query whole. `PlanKilled` and
//! `ExceededTimeLimit` end the attempt with no fallback.
//!
//! # Interruption
//!
//! The operation's kill flag and deadline are polled before every branch,
//! before composition, and at every yield of a ranking trial. Each of
//! those points first runs the matching `PlanningHooks` callback.

mod branch;
mod compose;
mod env;
mod explain;
mod fallback;
mod hooks;
mod rewrite;
mod stage;

pub use branch::{BranchPlan, BranchSource};
pub use env::PlanningEnv;
pub use explain::ExplainPlan;
pub use hooks::{NoopHooks, PlanningHooks};
pub use rewrite::{can_use_subplanning, is_contained_or, rewrite_to_rooted_or, to_rooted_or};
pub use stage::{PlanOrigin, SubplanOutcome, SubplanStage, SubplanState};

use crate::planner::PlannerResult;
use crate::query::CanonicalQuery;
use crate::ranker::WorkingSet;

/// Chooses the plan for `query`.
///
/// Subplans when enabled and the query is eligible, otherwise plans the
/// query whole.
pub fn choose_plan(env: &PlanningEnv<'_>, query: &CanonicalQuery) -> PlannerResult<SubplanOutcome> {
    if env.config.enable_subplanning && can_use_subplanning(query) {
        return SubplanStage::new(env, query).pick_best_plan();
    }

    let params = env.planner_params();
    let mut ws = WorkingSet::new();
    let solution = fallback::plan_whole_query(env, query, &params, &mut ws)?;
    Ok(SubplanOutcome {
        solution,
        origin: PlanOrigin::WholeQuery,
        branches: Vec::new(),
        fallback_reason: None,
    })
}
