//! Predicate tree for the subplanner
//!
//! The planner consumes predicates through a small surface: deep clone,
//! structure-only clone, type inspection, child access and mutation,
//! `optimize`, and a canonical sort.
//!
//! # Ownership
//!
//! Every node is exclusively owned by its parent. Cloning produces a fresh,
//! independently owned subtree.

mod ast;
mod matcher;
mod normalize;
mod values;

pub use ast::{IndexTag, LeafExpression, LeafOp, MatchExpression, MatchType, RegexPattern};
pub use matcher::resolve_path;
pub use normalize::canonical_cmp;
pub use values::{compare_same_type, compare_values, type_name, type_rank};
