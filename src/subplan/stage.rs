//! Subplan orchestrator
//!
//! Lifecycle:
//!
//! ```text
//! Created ──► BranchesPlanned ──► Composed
//!    │              │
//!    ├──────────────┴──► WholeQueryFallback ──► Composed | Failed
//!    └──────────────┴──► Failed
//! ```
//!
//! - Recoverable errors lead to whole-query planning of the original query
//! - `PlanKilled` and `ExceededTimeLimit` lead straight to `Failed`
//! - `Composed` and `Failed` are terminal

use std::fmt;

use crate::expression::MatchExpression;
use crate::index::IndexMap;
use crate::observability::{Event, Logger, ObservationScope};
use crate::planner::{PlannerError, PlannerParams, PlannerResult};
use crate::query::CanonicalQuery;
use crate::ranker::WorkingSet;
use crate::solution::QuerySolution;

use super::branch::{plan_branch, BranchPlan, BranchSource};
use super::compose::compose;
use super::env::PlanningEnv;
use super::fallback::plan_whole_query;
use super::rewrite::{can_use_subplanning, to_rooted_or};

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubplanState {
    Created,
    /// Every branch has an indexed winner
    BranchesPlanned,
    /// A final plan was adopted
    Composed,
    /// Subplanning failed recoverably; planning the whole query
    WholeQueryFallback,
    Failed,
}

impl SubplanState {
    pub fn state_name(&self) -> &'static str {
        match self {
            SubplanState::Created => "Created",
            SubplanState::BranchesPlanned => "BranchesPlanned",
            SubplanState::Composed => "Composed",
            SubplanState::WholeQueryFallback => "WholeQueryFallback",
            SubplanState::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubplanState::Composed | SubplanState::Failed)
    }

    fn can_transition_to(&self, next: SubplanState) -> bool {
        use SubplanState::*;
        matches!(
            (self, next),
            (Created, BranchesPlanned | WholeQueryFallback | Failed)
                | (BranchesPlanned, Composed | WholeQueryFallback | Failed)
                | (WholeQueryFallback, Composed | Failed)
        )
    }
}

impl fmt::Display for SubplanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_name())
    }
}

/// How the final plan was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOrigin {
    /// Composite of per-branch winners
    Subplanned,
    /// Whole-query planning of the original predicate
    WholeQuery,
}

impl PlanOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanOrigin::Subplanned => "subplanned",
            PlanOrigin::WholeQuery => "whole_query",
        }
    }
}

/// A chosen plan and how it was reached
#[derive(Debug, Clone)]
pub struct SubplanOutcome {
    pub solution: QuerySolution,
    pub origin: PlanOrigin,
    /// Source of each branch winner, in branch order; empty for whole-query plans
    pub branches: Vec<BranchSource>,
    /// The recoverable error that caused a fallback
    pub fallback_reason: Option<PlannerError>,
}

/// One subplanning attempt for one query
pub struct SubplanStage<'a> {
    env: &'a PlanningEnv<'a>,
    query: &'a CanonicalQuery,
    params: PlannerParams,
    index_map: IndexMap,
    state: SubplanState,
    or_expression: Option<MatchExpression>,
    branches: Vec<BranchPlan>,
    ws: WorkingSet,
}

impl<'a> SubplanStage<'a> {
    /// Snapshots the collection's live indexes for the whole attempt.
    pub fn new(env: &'a PlanningEnv<'a>, query: &'a CanonicalQuery) -> Self {
        let params = env.planner_params();
        let index_map = params.indexes.index_map();
        Self {
            env,
            query,
            params,
            index_map,
            state: SubplanState::Created,
            or_expression: None,
            branches: Vec::new(),
            ws: WorkingSet::new(),
        }
    }

    pub fn can_use_subplanning(query: &CanonicalQuery) -> bool {
        can_use_subplanning(query)
    }

    pub fn state(&self) -> SubplanState {
        self.state
    }

    /// Branches planned so far
    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// Whether branch `i` reused a cached plan
    pub fn branch_planned_from_cache(&self, i: usize) -> bool {
        self.branches
            .get(i)
            .map_or(false, |b| b.source == BranchSource::FromCache)
    }

    /// Runs the attempt to a terminal state.
    ///
    /// # Panics
    ///
    /// If called more than once, or for a query that cannot be subplanned.
    pub fn pick_best_plan(&mut self) -> PlannerResult<SubplanOutcome> {
        assert_eq!(
            self.state,
            SubplanState::Created,
            "pick_best_plan called on a finished attempt"
        );
        assert!(
            can_use_subplanning(self.query),
            "query is not eligible for subplanning: {}",
            self.query
        );

        let op_id = self.env.ctx.op_id().to_string();
        let query_text = self.query.to_string();
        let scope =
            ObservationScope::with_fields("SUBPLAN", &[("op_id", &op_id), ("query", &query_text)]);
        self.env.metrics.increment_subplans_attempted();

        let result = self.run();
        match &result {
            Ok(outcome) => scope.complete_with_fields(&[
                ("origin", outcome.origin.as_str()),
                ("plan", &outcome.solution.summary()),
            ]),
            Err(e) => scope.fail(&e.to_string()),
        }
        result
    }

    fn run(&mut self) -> PlannerResult<SubplanOutcome> {
        if let Err(e) = self.plan_subqueries() {
            return self.recover(e);
        }
        self.transition(SubplanState::BranchesPlanned);

        match self.choose_plan_for_subqueries() {
            Ok(solution) => {
                self.transition(SubplanState::Composed);
                self.env.metrics.increment_subplans_composed();
                Logger::info(
                    Event::SubplanComposed.as_str(),
                    &[
                        ("branches", &self.branches.len().to_string()),
                        ("plan", &solution.summary()),
                        ("blocking", &solution.has_blocking_stage.to_string()),
                    ],
                );
                Ok(SubplanOutcome {
                    solution,
                    origin: PlanOrigin::Subplanned,
                    branches: self.branches.iter().map(|b| b.source).collect(),
                    fallback_reason: None,
                })
            }
            Err(e) => self.recover(e),
        }
    }

    /// Plans every branch of the rooted OR, in order
    fn plan_subqueries(&mut self) -> PlannerResult<()> {
        let or_expression = to_rooted_or(self.query.filter());

        for (i, entry) in self.params.indexes.iter().enumerate() {
            Logger::trace(
                Event::SubplanIndex.as_str(),
                &[
                    ("ordinal", &i.to_string()),
                    ("name", &entry.name),
                    ("key_pattern", &entry.key_pattern.to_string()),
                    ("multikey", &entry.multikey.to_string()),
                ],
            );
        }

        assert!(
            or_expression.num_children() > 0,
            "rooted OR without branches: {}",
            or_expression
        );

        for (i, branch) in or_expression.children().iter().enumerate() {
            let rendered = branch.to_string();

            self.env.hooks.before_branch(i, self.env.ctx)?;
            self.env.ctx.check_for_interrupt()?;

            let planned = plan_branch(
                self.env,
                self.query,
                i,
                branch,
                &self.params,
                &mut self.ws,
            )
            .map_err(|e| e.with_branch(i, rendered.clone()));

            match planned {
                Ok(plan) => self.branches.push(plan),
                Err(e) => {
                    Logger::trace(
                        Event::SubplanBranchFailed.as_str(),
                        &[
                            ("branch", &i.to_string()),
                            ("code", e.code().code()),
                            ("reason", e.message()),
                        ],
                    );
                    return Err(e);
                }
            }
        }

        self.or_expression = Some(or_expression);
        Ok(())
    }

    /// Tags and builds the composite plan from the branch winners
    fn choose_plan_for_subqueries(&mut self) -> PlannerResult<QuerySolution> {
        self.env.hooks.before_compose(self.env.ctx)?;
        self.env.ctx.check_for_interrupt()?;

        let Some(or_expression) = self.or_expression.take() else {
            panic!("composition before branch planning");
        };
        compose(
            self.env.collection,
            self.query,
            &self.params,
            &self.index_map,
            or_expression,
            &self.branches,
        )
    }

    /// Fatal errors fail the attempt; anything else falls back
    fn recover(&mut self, error: PlannerError) -> PlannerResult<SubplanOutcome> {
        if error.is_fatal() {
            self.transition(SubplanState::Failed);
            self.env.metrics.increment_fatal_failures();
            return Err(error);
        }
        self.choose_plan_whole_query(error)
    }

    fn choose_plan_whole_query(&mut self, reason: PlannerError) -> PlannerResult<SubplanOutcome> {
        self.transition(SubplanState::WholeQueryFallback);
        self.env.metrics.increment_whole_query_fallbacks();
        Logger::info(
            Event::SubplanFallback.as_str(),
            &[("code", reason.code().code()), ("reason", &reason.to_string())],
        );

        self.or_expression = None;
        self.branches.clear();

        match plan_whole_query(self.env, self.query, &self.params, &mut self.ws) {
            Ok(solution) => {
                self.transition(SubplanState::Composed);
                Ok(SubplanOutcome {
                    solution,
                    origin: PlanOrigin::WholeQuery,
                    branches: Vec::new(),
                    fallback_reason: Some(reason),
                })
            }
            Err(e) => {
                self.transition(SubplanState::Failed);
                if e.is_fatal() {
                    self.env.metrics.increment_fatal_failures();
                    Err(e)
                } else {
                    Err(PlannerError::cannot_satisfy_query(&e))
                }
            }
        }
    }

    fn transition(&mut self, next: SubplanState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal subplan transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use SubplanState::*;
        assert!(Created.can_transition_to(BranchesPlanned));
        assert!(Created.can_transition_to(WholeQueryFallback));
        assert!(BranchesPlanned.can_transition_to(Failed));
        assert!(WholeQueryFallback.can_transition_to(Composed));
        assert!(!Composed.can_transition_to(WholeQueryFallback));
        assert!(!Failed.can_transition_to(Composed));
        assert!(!Created.can_transition_to(Composed));
        assert!(!WholeQueryFallback.can_transition_to(WholeQueryFallback));
    }

    #[test]
    fn test_terminal_states() {
        assert!(SubplanState::Composed.is_terminal());
        assert!(SubplanState::Failed.is_terminal());
        assert!(!SubplanState::WholeQueryFallback.is_terminal());
    }
}
