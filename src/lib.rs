//! subplanner - OR-query planning by independent branches
//!
//! Plans each branch of a disjunctive predicate on its own, then composes
//! the branch winners into one indexed access plan. Falls back to planning
//! the whole query when any branch cannot be answered by an index.
//!
//! Entry point: [`subplan::choose_plan`].

pub mod cache;
pub mod catalog;
pub mod config;
pub mod expression;
pub mod index;
pub mod observability;
pub mod planner;
pub mod query;
pub mod ranker;
pub mod solution;
pub mod subplan;
