//! Injectable hooks, enumerators and rankers for the suites

use std::cell::Cell;
use std::thread;
use std::time::Duration;

use subplanner::cache::CachingMode;
use subplanner::catalog::Collection;
use subplanner::planner::{PlannerParams, PlannerResult, QueryEnumerator, QueryPlanner};
use subplanner::query::{CanonicalQuery, OperationContext};
use subplanner::ranker::{CandidateStats, PlanRanker, RankingDecision, TrialContext, WorkingSet};
use subplanner::solution::QuerySolution;
use subplanner::subplan::PlanningHooks;

/// Counts every hook invocation
#[derive(Default)]
pub struct CountingHooks {
    pub branches: Cell<usize>,
    pub yields: Cell<usize>,
    pub composes: Cell<usize>,
}

impl PlanningHooks for CountingHooks {
    fn before_branch(&self, _branch: usize, _ctx: &OperationContext) -> PlannerResult<()> {
        self.branches.set(self.branches.get() + 1);
        Ok(())
    }

    fn on_trial_yield(&self, _ctx: &OperationContext) -> PlannerResult<()> {
        self.yields.set(self.yields.get() + 1);
        Ok(())
    }

    fn before_compose(&self, _ctx: &OperationContext) -> PlannerResult<()> {
        self.composes.set(self.composes.get() + 1);
        Ok(())
    }
}

/// Drops an index once every branch is planned
pub struct DropIndexBeforeCompose<'a> {
    pub collection: &'a Collection,
    pub index: &'static str,
}

impl PlanningHooks for DropIndexBeforeCompose<'_> {
    fn before_compose(&self, _ctx: &OperationContext) -> PlannerResult<()> {
        self.collection.drop_index(self.index);
        Ok(())
    }
}

/// Drops an index at the first trial yield
pub struct DropIndexOnYield<'a> {
    pub collection: &'a Collection,
    pub index: &'static str,
}

impl PlanningHooks for DropIndexOnYield<'_> {
    fn on_trial_yield(&self, _ctx: &OperationContext) -> PlannerResult<()> {
        self.collection.drop_index(self.index);
        Ok(())
    }
}

/// Stalls at every trial yield
pub struct StallOnYield {
    pub pause: Duration,
}

impl PlanningHooks for StallOnYield {
    fn on_trial_yield(&self, _ctx: &OperationContext) -> PlannerResult<()> {
        thread::sleep(self.pause);
        Ok(())
    }
}

/// Drops the whole collection before composition
pub struct DropCollectionBeforeCompose<'a> {
    pub collection: &'a Collection,
}

impl PlanningHooks for DropCollectionBeforeCompose<'_> {
    fn before_compose(&self, _ctx: &OperationContext) -> PlannerResult<()> {
        self.collection.drop_collection();
        Ok(())
    }
}

/// Kills the operation right before branch `branch`
pub struct KillBeforeBranch {
    pub branch: usize,
}

impl PlanningHooks for KillBeforeBranch {
    fn before_branch(&self, branch: usize, ctx: &OperationContext) -> PlannerResult<()> {
        if branch == self.branch {
            ctx.kill();
        }
        Ok(())
    }
}

/// The built-in planner, always offering a collection scan too
pub struct WithCollectionScan;

impl QueryEnumerator for WithCollectionScan {
    fn plan(
        &self,
        query: &CanonicalQuery,
        params: &PlannerParams,
    ) -> PlannerResult<Vec<QuerySolution>> {
        QueryPlanner::new().plan(query, &params.clone().with_collection_scan())
    }
}

/// Picks the last candidate without running a trial
pub struct PickLast;

impl PlanRanker for PickLast {
    fn pick_best_plan(
        &self,
        _query: &CanonicalQuery,
        mut candidates: Vec<QuerySolution>,
        _ws: &mut WorkingSet,
        _trial: &TrialContext<'_>,
        _mode: CachingMode,
    ) -> PlannerResult<RankingDecision> {
        let winner_index = candidates.len() - 1;
        let stats = vec![CandidateStats::default(); candidates.len()];
        let winner = candidates.remove(winner_index);
        Ok(RankingDecision {
            winner,
            winner_index,
            stats,
            cached: false,
        })
    }
}

/// Finds no candidates for anything
pub struct NoSolutions;

impl QueryEnumerator for NoSolutions {
    fn plan(
        &self,
        _query: &CanonicalQuery,
        _params: &PlannerParams,
    ) -> PlannerResult<Vec<QuerySolution>> {
        Ok(Vec::new())
    }
}
