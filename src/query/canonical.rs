//! Canonical queries
//!
//! A canonical query owns a validated, normalized predicate and its
//! options. Identical predicates in any child order canonicalize to the
//! same tree and therefore to the same cache shape.

use std::fmt;

use crate::expression::{type_name, type_rank, MatchExpression, MatchType};
use crate::planner::{PlannerError, PlannerResult};

use super::options::QueryOptions;

/// Validated, normalized query
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalQuery {
    filter: MatchExpression,
    options: QueryOptions,
}

impl CanonicalQuery {
    /// Validates and normalizes a top-level query
    pub fn canonicalize(filter: MatchExpression, options: QueryOptions) -> PlannerResult<Self> {
        Self::is_valid(&filter)?;
        Ok(Self {
            filter: filter.normalize(),
            options,
        })
    }

    /// Turns one OR branch into its own query.
    ///
    /// The branch inherits its parent's projection, sort, collation and
    /// explain flag.
    pub fn canonicalize_subquery(
        parent: &CanonicalQuery,
        branch: &MatchExpression,
    ) -> PlannerResult<Self> {
        let filter = branch.clone_untagged();
        Self::is_valid(&filter).map_err(|e| {
            PlannerError::bad_value(format!(
                "can't canonicalize subchild {}: {}",
                branch,
                e.message()
            ))
        })?;
        Ok(Self {
            filter: filter.normalize(),
            options: parent.options.for_subquery(),
        })
    }

    /// Structural validation of a predicate tree
    pub fn is_valid(expr: &MatchExpression) -> PlannerResult<()> {
        match expr {
            MatchExpression::Or(children) if children.is_empty() => {
                Err(PlannerError::bad_value("$or must be a nonempty array"))
            }
            MatchExpression::And(children) | MatchExpression::Or(children) => {
                children.iter().try_for_each(Self::is_valid)
            }
            MatchExpression::Leaf(leaf) => {
                if leaf.path.is_empty() || leaf.path.split('.').any(str::is_empty) {
                    return Err(PlannerError::bad_value(format!(
                        "invalid field path '{}'",
                        leaf.path
                    )));
                }
                if leaf.path.starts_with('$') {
                    return Err(PlannerError::bad_value(format!(
                        "unknown top level operator: {}",
                        leaf.path
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn filter(&self) -> &MatchExpression {
        &self.filter
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn is_rooted_or(&self) -> bool {
        self.filter.match_type() == MatchType::Or
    }

    /// Shape string: predicate structure and operand types, never operand
    /// values, followed by sort, projection and collation.
    pub fn shape(&self) -> String {
        let mut out = String::new();
        encode_shape(&self.filter, &mut out);
        if !self.options.sort.is_empty() {
            out.push_str("|s");
            out.push_str(&self.options.sort.to_string());
        }
        if let Some(projection) = &self.options.projection {
            out.push_str("|p");
            out.push_str(&projection.to_string());
        }
        if let Some(collation) = &self.options.collation {
            out.push_str("|c");
            out.push_str(collation);
        }
        out
    }
}

fn encode_shape(expr: &MatchExpression, out: &mut String) {
    out.push_str(expr.match_type().shape_code());
    match expr {
        MatchExpression::Leaf(leaf) => {
            out.push_str(&leaf.path);
            if let Some(operand) = leaf.op.operand() {
                out.push(':');
                out.push_str(type_name(type_rank(operand)));
            }
        }
        MatchExpression::And(children) | MatchExpression::Or(children) => {
            out.push('[');
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_shape(child, out);
            }
            out.push(']');
        }
    }
}

impl fmt::Display for CanonicalQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter: {}", self.filter)?;
        if !self.options.sort.is_empty() {
            write!(f, " sort: {}", self.options.sort)?;
        }
        if let Some(projection) = &self.options.projection {
            write!(f, " proj: {}", projection)?;
        }
        Ok(())
    }
}
