//! Explain output for a planning outcome
//!
//! Produces deterministic, human-readable explain output.

use std::fmt;

use crate::planner::PlannerError;

use super::stage::SubplanOutcome;

/// Explain plan output
#[derive(Debug, Clone)]
pub struct ExplainPlan {
    /// Whether planning succeeded
    pub accepted: bool,
    /// "subplanned" or "whole_query" (if accepted)
    pub origin: Option<String>,
    /// Source of each branch winner
    pub branches: Vec<String>,
    /// One-line plan summary
    pub summary: Option<String>,
    /// Indented plan tree
    pub plan_tree: Option<String>,
    pub has_blocking_stage: bool,
    pub index_filter_applied: bool,
    /// Code of the error that caused a fallback
    pub fallback_code: Option<String>,
    /// Rejection reason (if rejected)
    pub rejection_reason: Option<String>,
    /// Rejection error code (if rejected)
    pub rejection_code: Option<String>,
}

impl ExplainPlan {
    /// Creates an explain plan from a chosen plan
    pub fn from_outcome(outcome: &SubplanOutcome) -> Self {
        Self {
            accepted: true,
            origin: Some(outcome.origin.as_str().to_string()),
            branches: outcome
                .branches
                .iter()
                .map(|source| source.as_str().to_string())
                .collect(),
            summary: Some(outcome.solution.summary()),
            plan_tree: Some(outcome.solution.to_string()),
            has_blocking_stage: outcome.solution.has_blocking_stage,
            index_filter_applied: outcome.solution.index_filter_applied,
            fallback_code: outcome
                .fallback_reason
                .as_ref()
                .map(|e| e.code().code().to_string()),
            rejection_reason: None,
            rejection_code: None,
        }
    }

    /// Creates an explain plan from a planning error
    pub fn from_error(err: &PlannerError) -> Self {
        Self {
            accepted: false,
            origin: None,
            branches: Vec::new(),
            summary: None,
            plan_tree: None,
            has_blocking_stage: false,
            index_filter_applied: false,
            fallback_code: None,
            rejection_reason: Some(err.message().to_string()),
            rejection_code: Some(err.code().code().to_string()),
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;

        if self.accepted {
            writeln!(f, "Status: ACCEPTED")?;
            if let Some(origin) = &self.origin {
                writeln!(f, "Origin: {}", origin)?;
            }
            if let Some(code) = &self.fallback_code {
                writeln!(f, "Fallback: {}", code)?;
            }
            if !self.branches.is_empty() {
                writeln!(f, "Branches:")?;
                for (i, source) in self.branches.iter().enumerate() {
                    writeln!(f, "  - #{}: {}", i, source)?;
                }
            }
            if let Some(summary) = &self.summary {
                writeln!(f, "Plan: {}", summary)?;
            }
            writeln!(f, "Blocking: {}", self.has_blocking_stage)?;
            if self.index_filter_applied {
                writeln!(f, "Index Filter: applied")?;
            }
            if let Some(tree) = &self.plan_tree {
                write!(f, "{}", tree)?;
            }
        } else {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
        }

        Ok(())
    }
}
