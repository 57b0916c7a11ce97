//! Observable planning events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events of the planning path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Subplanning
    /// Catalog entry visible to this planning attempt
    SubplanIndex,
    /// A branch reused a cached plan
    SubplanBranchCacheHit,
    /// A branch has a winning plan
    SubplanBranchPlanned,
    /// A branch could not be planned
    SubplanBranchFailed,
    /// Composite plan built from branch winners
    SubplanComposed,
    /// Subplanning abandoned for whole-query planning
    SubplanFallback,

    // Enumeration
    /// An index assignment could not be built into a solution
    PlannerAssignmentRejected,

    // Ranking
    /// Candidate trial started
    RankerTrialBegin,
    /// Candidate trial finished
    RankerTrialComplete,
    /// Trial yielded and revalidated state
    RankerYield,
    /// Winner written to the plan cache
    PlanCacheWrite,

    // Whole query
    /// Whole-query planning produced a plan
    WholeQueryPlanned,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::SubplanIndex => "SUBPLAN_INDEX",
            Event::SubplanBranchCacheHit => "SUBPLAN_BRANCH_CACHE_HIT",
            Event::SubplanBranchPlanned => "SUBPLAN_BRANCH_PLANNED",
            Event::SubplanBranchFailed => "SUBPLAN_BRANCH_FAILED",
            Event::SubplanComposed => "SUBPLAN_COMPOSED",
            Event::SubplanFallback => "SUBPLAN_FALLBACK",

            Event::PlannerAssignmentRejected => "PLANNER_ASSIGNMENT_REJECTED",

            Event::RankerTrialBegin => "RANKER_TRIAL_BEGIN",
            Event::RankerTrialComplete => "RANKER_TRIAL_COMPLETE",
            Event::RankerYield => "RANKER_YIELD",
            Event::PlanCacheWrite => "PLAN_CACHE_WRITE",

            Event::WholeQueryPlanned => "WHOLE_QUERY_PLANNED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
