//! Operation context: identity, deadline and kill flag
//!
//! Cloning shares the kill flag, so a clone handed to another thread can
//! interrupt the planning operation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::planner::{PlannerError, PlannerResult};

/// Execution context of one planning operation
#[derive(Debug, Clone)]
pub struct OperationContext {
    op_id: Uuid,
    deadline: Option<Instant>,
    killed: Arc<AtomicBool>,
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationContext {
    pub fn new() -> Self {
        Self {
            op_id: Uuid::new_v4(),
            deadline: None,
            killed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_time_limit(self, limit: Duration) -> Self {
        self.with_deadline(Instant::now() + limit)
    }

    pub fn op_id(&self) -> Uuid {
        self.op_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Marks the operation killed
    pub fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Polls the kill flag and the deadline.
    ///
    /// A kill reports `PlanKilled`, an expired deadline `ExceededTimeLimit`.
    pub fn check_for_interrupt(&self) -> PlannerResult<()> {
        if self.is_killed() {
            return Err(PlannerError::plan_killed(format!(
                "operation {} was killed",
                self.op_id
            )));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(PlannerError::exceeded_time_limit(format!(
                    "operation {} exceeded time limit",
                    self.op_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlannerErrorCode;

    #[test]
    fn test_fresh_context_is_not_interrupted() {
        assert!(OperationContext::new().check_for_interrupt().is_ok());
    }

    #[test]
    fn test_kill_is_shared_between_clones() {
        let ctx = OperationContext::new();
        let handle = ctx.clone();
        handle.kill();

        let err = ctx.check_for_interrupt().unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::SubplanPlanKilled);
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = OperationContext::new().with_deadline(Instant::now());
        let err = ctx.check_for_interrupt().unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::SubplanExceededTimeLimit);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_future_deadline() {
        let ctx = OperationContext::new().with_time_limit(Duration::from_secs(3600));
        assert!(ctx.check_for_interrupt().is_ok());
    }
}
