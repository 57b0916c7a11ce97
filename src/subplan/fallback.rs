//! Whole-query planning
//!
//! Plans the original, unrewritten query in one piece. Used directly for
//! queries that cannot be subplanned and as the fallback when subplanning
//! fails recoverably.

use crate::cache::CachingMode;
use crate::observability::{Event, Logger};
use crate::planner::{PlannerError, PlannerParams, PlannerResult};
use crate::query::CanonicalQuery;
use crate::ranker::WorkingSet;
use crate::solution::QuerySolution;

use super::env::PlanningEnv;

pub(crate) fn plan_whole_query(
    env: &PlanningEnv<'_>,
    query: &CanonicalQuery,
    params: &PlannerParams,
    ws: &mut WorkingSet,
) -> PlannerResult<QuerySolution> {
    ws.clear();

    let mut solutions = env.enumerator.plan(query, params)?;
    let candidates = solutions.len().to_string();

    let solution = match solutions.len() {
        0 => {
            return Err(PlannerError::no_query_solutions(format!(
                "error processing query: {} No query solutions",
                query
            )))
        }
        1 => solutions.remove(0),
        _ => {
            for solution in &mut solutions {
                if let Some(data) = solution.cache_data.as_mut() {
                    data.index_filter_applied = params.index_filters_applied;
                }
            }
            env.ranker
                .pick_best_plan(query, solutions, ws, &env.trial_context(), CachingMode::Always)?
                .winner
        }
    };

    Logger::trace(
        Event::WholeQueryPlanned.as_str(),
        &[
            ("query", &query.to_string()),
            ("candidates", &candidates),
            ("plan", &solution.summary()),
        ],
    );
    Ok(solution)
}
