//! Predicate tree consumed by the planner
//!
//! A `MatchExpression` exclusively owns its children. `clone()` is always a
//! deep copy; there is no sharing between trees.

use std::fmt;

use regex::Regex;
use serde_json::Value;

/// Node discriminant, also the first key of the canonical ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchType {
    And,
    Or,
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    Regex,
    Exists,
}

impl MatchType {
    /// Operator name used in rendered predicates
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::And => "$and",
            MatchType::Or => "$or",
            MatchType::Eq => "$eq",
            MatchType::Lt => "$lt",
            MatchType::Lte => "$lte",
            MatchType::Gt => "$gt",
            MatchType::Gte => "$gte",
            MatchType::Regex => "$regex",
            MatchType::Exists => "$exists",
        }
    }

    /// Two-letter code used in plan cache shape keys
    pub fn shape_code(&self) -> &'static str {
        match self {
            MatchType::And => "an",
            MatchType::Or => "or",
            MatchType::Eq => "eq",
            MatchType::Lt => "lt",
            MatchType::Lte => "le",
            MatchType::Gt => "gt",
            MatchType::Gte => "ge",
            MatchType::Regex => "re",
            MatchType::Exists => "ex",
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, MatchType::And | MatchType::Or)
    }
}

/// Which index (ordinal in the planner's catalog) and which key position
/// answers a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexTag {
    pub index: usize,
    pub pos: usize,
}

impl IndexTag {
    pub fn new(index: usize, pos: usize) -> Self {
        Self { index, pos }
    }
}

/// Compiled regular expression that compares by source text
#[derive(Debug, Clone)]
pub struct RegexPattern {
    source: String,
    compiled: Regex,
}

impl RegexPattern {
    pub fn new(source: impl Into<String>) -> Result<Self, regex::Error> {
        let source = source.into();
        let compiled = Regex::new(&source)?;
        Ok(Self { source, compiled })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.compiled.is_match(haystack)
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Leaf operator and operand
#[derive(Debug, Clone, PartialEq)]
pub enum LeafOp {
    Eq(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    Regex(RegexPattern),
    Exists(bool),
}

impl LeafOp {
    pub fn match_type(&self) -> MatchType {
        match self {
            LeafOp::Eq(_) => MatchType::Eq,
            LeafOp::Lt(_) => MatchType::Lt,
            LeafOp::Lte(_) => MatchType::Lte,
            LeafOp::Gt(_) => MatchType::Gt,
            LeafOp::Gte(_) => MatchType::Gte,
            LeafOp::Regex(_) => MatchType::Regex,
            LeafOp::Exists(_) => MatchType::Exists,
        }
    }

    /// Comparison operand, if this is a comparison
    pub fn operand(&self) -> Option<&Value> {
        match self {
            LeafOp::Eq(v) | LeafOp::Lt(v) | LeafOp::Lte(v) | LeafOp::Gt(v) | LeafOp::Gte(v) => {
                Some(v)
            }
            LeafOp::Regex(_) | LeafOp::Exists(_) => None,
        }
    }

    /// Whether an index scan over this leaf's path answers it exactly.
    ///
    /// Only scalar comparisons qualify. Null, array and object operands have
    /// matching rules (missing fields, whole-array equality) that index keys
    /// cannot express.
    pub fn is_indexable(&self) -> bool {
        match self.operand() {
            Some(Value::Number(_)) | Some(Value::String(_)) | Some(Value::Bool(_)) => true,
            _ => false,
        }
    }

    pub(crate) fn render_operand(&self) -> String {
        match self {
            LeafOp::Eq(v) | LeafOp::Lt(v) | LeafOp::Lte(v) | LeafOp::Gt(v) | LeafOp::Gte(v) => {
                v.to_string()
            }
            LeafOp::Regex(r) => format!("/{}/", r.as_str()),
            LeafOp::Exists(b) => b.to_string(),
        }
    }
}

/// A single-path predicate
#[derive(Debug, Clone, PartialEq)]
pub struct LeafExpression {
    /// Dotted field path
    pub path: String,
    pub op: LeafOp,
    /// Set by index tagging, cleared by `clone_untagged`
    pub tag: Option<IndexTag>,
}

impl LeafExpression {
    pub fn new(path: impl Into<String>, op: LeafOp) -> Self {
        Self {
            path: path.into(),
            op,
            tag: None,
        }
    }
}

/// Boolean predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum MatchExpression {
    And(Vec<MatchExpression>),
    Or(Vec<MatchExpression>),
    Leaf(LeafExpression),
}

impl MatchExpression {
    pub fn and(children: Vec<MatchExpression>) -> Self {
        MatchExpression::And(children)
    }

    pub fn or(children: Vec<MatchExpression>) -> Self {
        MatchExpression::Or(children)
    }

    pub fn eq(path: impl Into<String>, value: Value) -> Self {
        Self::leaf(path, LeafOp::Eq(value))
    }

    pub fn lt(path: impl Into<String>, value: Value) -> Self {
        Self::leaf(path, LeafOp::Lt(value))
    }

    pub fn lte(path: impl Into<String>, value: Value) -> Self {
        Self::leaf(path, LeafOp::Lte(value))
    }

    pub fn gt(path: impl Into<String>, value: Value) -> Self {
        Self::leaf(path, LeafOp::Gt(value))
    }

    pub fn gte(path: impl Into<String>, value: Value) -> Self {
        Self::leaf(path, LeafOp::Gte(value))
    }

    pub fn exists(path: impl Into<String>, exists: bool) -> Self {
        Self::leaf(path, LeafOp::Exists(exists))
    }

    pub fn regex(path: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::leaf(path, LeafOp::Regex(RegexPattern::new(pattern)?)))
    }

    pub fn leaf(path: impl Into<String>, op: LeafOp) -> Self {
        MatchExpression::Leaf(LeafExpression::new(path, op))
    }

    pub fn match_type(&self) -> MatchType {
        match self {
            MatchExpression::And(_) => MatchType::And,
            MatchExpression::Or(_) => MatchType::Or,
            MatchExpression::Leaf(leaf) => leaf.op.match_type(),
        }
    }

    pub fn is_logical(&self) -> bool {
        self.match_type().is_logical()
    }

    pub fn as_leaf(&self) -> Option<&LeafExpression> {
        match self {
            MatchExpression::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Children of a logical node; empty for leaves
    pub fn children(&self) -> &[MatchExpression] {
        match self {
            MatchExpression::And(c) | MatchExpression::Or(c) => c,
            MatchExpression::Leaf(_) => &[],
        }
    }

    /// Mutable child list of a logical node
    pub fn children_mut(&mut self) -> Option<&mut Vec<MatchExpression>> {
        match self {
            MatchExpression::And(c) | MatchExpression::Or(c) => Some(c),
            MatchExpression::Leaf(_) => None,
        }
    }

    pub fn num_children(&self) -> usize {
        self.children().len()
    }

    pub fn child(&self, i: usize) -> Option<&MatchExpression> {
        self.children().get(i)
    }

    pub fn tag(&self) -> Option<IndexTag> {
        self.as_leaf().and_then(|leaf| leaf.tag)
    }

    /// Sets the tag of a leaf. Returns false for logical nodes.
    pub fn set_tag(&mut self, tag: Option<IndexTag>) -> bool {
        match self {
            MatchExpression::Leaf(leaf) => {
                leaf.tag = tag;
                true
            }
            _ => false,
        }
    }

    /// Removes every tag in the subtree
    pub fn clear_tags(&mut self) {
        match self {
            MatchExpression::Leaf(leaf) => leaf.tag = None,
            MatchExpression::And(c) | MatchExpression::Or(c) => {
                c.iter_mut().for_each(MatchExpression::clear_tags)
            }
        }
    }

    /// Structure-only copy: same shape and operands, no index tags.
    pub fn clone_untagged(&self) -> Self {
        let mut copy = self.clone();
        copy.clear_tags();
        copy
    }

    /// True if any node in the subtree carries a tag
    pub fn has_tags(&self) -> bool {
        match self {
            MatchExpression::Leaf(leaf) => leaf.tag.is_some(),
            MatchExpression::And(c) | MatchExpression::Or(c) => c.iter().any(Self::has_tags),
        }
    }

    /// Calls `f` for every leaf in depth-first order
    pub fn for_each_leaf<'a>(&'a self, f: &mut impl FnMut(&'a LeafExpression)) {
        match self {
            MatchExpression::Leaf(leaf) => f(leaf),
            MatchExpression::And(c) | MatchExpression::Or(c) => {
                for child in c {
                    child.for_each_leaf(f);
                }
            }
        }
    }

    /// An AND with no children matches everything
    pub fn is_trivially_true(&self) -> bool {
        matches!(self, MatchExpression::And(c) if c.is_empty())
    }
}

impl fmt::Display for MatchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchExpression::And(children) | MatchExpression::Or(children) => {
                write!(f, "{{{}: [", self.match_type().as_str())?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, "]}}")
            }
            MatchExpression::Leaf(leaf) => {
                write!(
                    f,
                    "{{{}: {{{}: {}}}}}",
                    leaf.path,
                    leaf.op.match_type().as_str(),
                    leaf.op.render_operand()
                )?;
                if let Some(tag) = leaf.tag {
                    write!(f, " @{}:{}", tag.index, tag.pos)?;
                }
                Ok(())
            }
        }
    }
}
