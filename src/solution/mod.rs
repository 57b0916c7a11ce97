//! Query solutions: physical access-plan trees
//!
//! The stage set is closed. Nodes own their children exclusively and a
//! node is never shared between two trees; cloning a subtree deep-copies
//! it.

mod display;
mod node;
mod solution;

pub use node::{ProjectionKind, Properties, QuerySolutionNode, Stage};
pub use solution::QuerySolution;
