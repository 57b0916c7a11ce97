//! Subplanner test harness
//!
//! Shared fixtures plus the scenario suites:
//! - composition of branch winners
//! - whole-query fallback
//! - interruption (kill, deadline, catalog drops)
//! - plan cache reuse across attempts

pub mod fixtures;
pub mod hooks;
pub mod scenarios;
