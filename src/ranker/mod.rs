//! Plan execution and ranking
//!
//! Candidate plans are executed step by step against the collection in
//! a shared working set. `MultiPlanRanker` runs a bounded trial across
//! candidates and picks the most productive one; `execute_to_completion`
//! drains a single plan and is what callers use to read results.

mod multi_plan;
mod stages;
mod working_set;

pub use multi_plan::{CandidateStats, MultiPlanRanker, PlanRanker, RankingDecision, TrialContext};
pub use stages::{build_stage, execute_to_completion, PlanStage, StageState};
pub use working_set::{WorkingSet, WorkingSetId, WorkingSetMember};
