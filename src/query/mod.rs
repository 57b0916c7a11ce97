//! Query model for the subplanner
//!
//! A query is a predicate plus options. Canonicalization validates the
//! predicate, normalizes it (`optimize` then canonical sort) and yields
//! the shape used as a plan cache key.

mod canonical;
mod context;
mod options;
mod projection;

pub use canonical::CanonicalQuery;
pub use context::OperationContext;
pub use options::QueryOptions;
pub use projection::Projection;
