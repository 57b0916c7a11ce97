//! Observability for the planning path
//!
//! - Structured logging (JSON)
//! - Counters
//! - Lifecycle event tracing
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on planning decisions
//! 3. No async or background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use subplanner::observability::{Event, Logger, MetricsRegistry, ObservationScope};
//!
//! Logger::info(Event::SubplanFallback.as_str(), &[("reason", "no indexed plan")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_whole_query_fallbacks();
//!
//! let scope = ObservationScope::new("SUBPLAN");
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;
