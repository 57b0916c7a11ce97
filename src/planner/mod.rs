//! Enumeration planner
//!
//! Turns a canonical query and an index catalog into candidate access
//! plans. The subplanner uses the pieces separately:
//!
//! - `QueryEnumerator::plan` produces candidates for one query
//! - `tag_according_to_cache` replays a cached index assignment
//! - `prepare_for_access_planning` orders a tagged predicate
//! - `build_indexed_data_access` builds the access tree
//! - `analyze_data_access` adds sort, projection, skip, limit and fetch
//!
//! # Errors
//!
//! Every failure is a `PlannerError` carrying a stable code. Only
//! `SUBPLAN_PLAN_KILLED` and `SUBPLAN_EXCEEDED_TIME_LIMIT` are fatal.

mod access;
mod analysis;
mod enumerate;
mod errors;
mod params;
mod tagging;

pub use access::build_indexed_data_access;
pub use analysis::analyze_data_access;
pub use enumerate::{QueryEnumerator, QueryPlanner};
pub use errors::{PlannerError, PlannerErrorCode, PlannerResult, Severity};
pub use params::PlannerParams;
pub use tagging::{prepare_for_access_planning, tag_according_to_cache};
