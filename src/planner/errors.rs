//! Planner error types
//!
//! Error codes:
//! - SUBPLAN_BAD_VALUE (RECOVERABLE)
//! - SUBPLAN_NO_QUERY_SOLUTIONS (RECOVERABLE)
//! - SUBPLAN_NO_INDEXED_CACHE_DATA (RECOVERABLE)
//! - SUBPLAN_TAGGING_FAILED (RECOVERABLE)
//! - SUBPLAN_BUILD_FAILED (RECOVERABLE)
//! - SUBPLAN_CANNOT_SATISFY_QUERY (RECOVERABLE)
//! - SUBPLAN_PLAN_KILLED (FATAL)
//! - SUBPLAN_EXCEEDED_TIME_LIMIT (FATAL)
//!
//! Fallback decisions are made on the code alone, never on message text.

use std::fmt;

/// Severity levels for planner errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Subplanning may fall back to whole-query planning
    Recoverable,
    /// Catalog state is no longer trustworthy; propagate unchanged
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Recoverable => write!(f, "RECOVERABLE"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Planner error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlannerErrorCode {
    /// Sub-query could not be canonicalized
    SubplanBadValue,
    /// No candidate solution for a query or branch
    SubplanNoQuerySolutions,
    /// Winning plan carries no index-tagged cache data
    SubplanNoIndexedCacheData,
    /// Index tags could not be applied to a predicate
    SubplanTaggingFailed,
    /// Access plan could not be constructed from tags
    SubplanBuildFailed,
    /// Whole-query planning failed after subplanning fell back
    SubplanCannotSatisfyQuery,
    /// Collection or index dropped during planning
    SubplanPlanKilled,
    /// Operation deadline exceeded
    SubplanExceededTimeLimit,
}

impl PlannerErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::SubplanBadValue => "SUBPLAN_BAD_VALUE",
            PlannerErrorCode::SubplanNoQuerySolutions => "SUBPLAN_NO_QUERY_SOLUTIONS",
            PlannerErrorCode::SubplanNoIndexedCacheData => "SUBPLAN_NO_INDEXED_CACHE_DATA",
            PlannerErrorCode::SubplanTaggingFailed => "SUBPLAN_TAGGING_FAILED",
            PlannerErrorCode::SubplanBuildFailed => "SUBPLAN_BUILD_FAILED",
            PlannerErrorCode::SubplanCannotSatisfyQuery => "SUBPLAN_CANNOT_SATISFY_QUERY",
            PlannerErrorCode::SubplanPlanKilled => "SUBPLAN_PLAN_KILLED",
            PlannerErrorCode::SubplanExceededTimeLimit => "SUBPLAN_EXCEEDED_TIME_LIMIT",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            PlannerErrorCode::SubplanPlanKilled | PlannerErrorCode::SubplanExceededTimeLimit => {
                Severity::Fatal
            }
            _ => Severity::Recoverable,
        }
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error type with full context
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerError {
    /// Error code
    code: PlannerErrorCode,
    /// Human-readable message
    message: String,
    /// Branch the error was raised in, if any
    branch: Option<usize>,
    /// Rendered sub-query, if any
    query: Option<String>,
}

impl PlannerError {
    fn new(code: PlannerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            branch: None,
            query: None,
        }
    }

    /// Create a canonicalization error
    pub fn bad_value(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::SubplanBadValue, reason)
    }

    /// Create a no-solutions error
    pub fn no_query_solutions(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::SubplanNoQuerySolutions, reason)
    }

    /// Create a missing index-tagged cache data error
    pub fn no_indexed_cache_data(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::SubplanNoIndexedCacheData, reason)
    }

    /// Create a tagging error
    pub fn tagging_failed(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::SubplanTaggingFailed, reason)
    }

    /// Create a build error
    pub fn build_failed(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::SubplanBuildFailed, reason)
    }

    /// Create a cannot-satisfy error wrapping the whole-query failure
    pub fn cannot_satisfy_query(cause: &PlannerError) -> Self {
        Self::new(
            PlannerErrorCode::SubplanCannotSatisfyQuery,
            format!("error processing query with whole-query planning: {}", cause),
        )
    }

    /// Create a plan killed error
    pub fn plan_killed(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::SubplanPlanKilled, reason)
    }

    /// Create a time limit error
    pub fn exceeded_time_limit(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::SubplanExceededTimeLimit, reason)
    }

    /// Attaches branch context. Existing context is kept.
    pub fn with_branch(mut self, branch: usize, query: impl Into<String>) -> Self {
        if self.branch.is_none() {
            self.branch = Some(branch);
            self.query = Some(query.into());
        }
        self
    }

    /// Returns the error code
    pub fn code(&self) -> PlannerErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// True for PlanKilled and ExceededTimeLimit
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the branch index if applicable
    pub fn branch(&self) -> Option<usize> {
        self.branch
    }

    /// Returns the rendered sub-query if applicable
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let (Some(branch), Some(query)) = (self.branch, &self.query) {
            write!(f, " (branch {}: {})", branch, query)?;
        }
        Ok(())
    }
}

impl std::error::Error for PlannerError {}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
