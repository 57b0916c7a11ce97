//! Subplanner scenarios

pub mod composition;
pub mod config;
pub mod equivalence;
pub mod fallback;
pub mod interruption;
pub mod plan_cache;
