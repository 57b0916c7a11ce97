//! Injectable planning hooks
//!
//! Hooks run at the points where planning may be interrupted: before each
//! branch, at every trial yield, and before composition. A hook may delay,
//! kill the operation, or change the catalog; an error it returns is
//! classified like any other planning error.

use crate::planner::PlannerResult;
use crate::query::OperationContext;

/// Callbacks at the interruption points of one planning attempt
pub trait PlanningHooks {
    /// Before branch `branch` is planned
    fn before_branch(&self, _branch: usize, _ctx: &OperationContext) -> PlannerResult<()> {
        Ok(())
    }

    /// At each yield of a ranking trial, before revalidation
    fn on_trial_yield(&self, _ctx: &OperationContext) -> PlannerResult<()> {
        Ok(())
    }

    /// After every branch is planned, before tagging and building
    fn before_compose(&self, _ctx: &OperationContext) -> PlannerResult<()> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl PlanningHooks for NoopHooks {}
