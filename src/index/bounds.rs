//! Index bounds: intervals over the canonical value order
//!
//! Comparison intervals are bracketed by type, so `$gt: 5` covers
//! `(5, +inf]` over numbers only and never reaches strings or nulls.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use crate::expression::{compare_values, type_name, type_rank, LeafOp};

use super::key_pattern::SortPattern;

/// Interval endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    MinKey,
    /// Below every value of the given type bracket
    TypeStart(u8),
    Value(Value),
    /// Above every value of the given type bracket
    TypeEnd(u8),
    MaxKey,
}

impl Endpoint {
    fn position(&self) -> (u8, u8, u8) {
        match self {
            Endpoint::MinKey => (0, 0, 0),
            Endpoint::TypeStart(rank) => (1, *rank, 0),
            Endpoint::Value(v) => (1, type_rank(v), 1),
            Endpoint::TypeEnd(rank) => (1, *rank, 2),
            Endpoint::MaxKey => (2, 0, 0),
        }
    }

    fn cmp(&self, other: &Endpoint) -> Ordering {
        self.position()
            .cmp(&other.position())
            .then_with(|| match (self, other) {
                (Endpoint::Value(a), Endpoint::Value(b)) => compare_values(a, b),
                _ => Ordering::Equal,
            })
    }

    fn cmp_value(&self, value: &Value) -> Ordering {
        self.position()
            .cmp(&(1, type_rank(value), 1))
            .then_with(|| match self {
                Endpoint::Value(v) => compare_values(v, value),
                _ => Ordering::Equal,
            })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::MinKey => write!(f, "MinKey"),
            Endpoint::MaxKey => write!(f, "MaxKey"),
            Endpoint::Value(v) => write!(f, "{}", v),
            Endpoint::TypeStart(1) => write!(f, "-inf"),
            Endpoint::TypeEnd(1) => write!(f, "inf"),
            Endpoint::TypeStart(rank) => write!(f, "min-{}", type_name(*rank)),
            Endpoint::TypeEnd(rank) => write!(f, "max-{}", type_name(*rank)),
        }
    }
}

/// A contiguous range of index key values
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub start: Endpoint,
    pub start_inclusive: bool,
    pub end: Endpoint,
    pub end_inclusive: bool,
}

impl Interval {
    /// `[MinKey, MaxKey]`
    pub fn all_values() -> Self {
        Self {
            start: Endpoint::MinKey,
            start_inclusive: true,
            end: Endpoint::MaxKey,
            end_inclusive: true,
        }
    }

    pub fn point(value: Value) -> Self {
        Self {
            start: Endpoint::Value(value.clone()),
            start_inclusive: true,
            end: Endpoint::Value(value),
            end_inclusive: true,
        }
    }

    /// Interval answering an indexable leaf; `None` otherwise
    pub fn from_leaf(op: &LeafOp) -> Option<Self> {
        if !op.is_indexable() {
            return None;
        }
        let interval = match op {
            LeafOp::Eq(v) => Self::point(v.clone()),
            LeafOp::Gt(v) | LeafOp::Gte(v) => Self {
                start: Endpoint::Value(v.clone()),
                start_inclusive: matches!(op, LeafOp::Gte(_)),
                end: Endpoint::TypeEnd(type_rank(v)),
                end_inclusive: true,
            },
            LeafOp::Lt(v) | LeafOp::Lte(v) => Self {
                start: Endpoint::TypeStart(type_rank(v)),
                start_inclusive: true,
                end: Endpoint::Value(v.clone()),
                end_inclusive: matches!(op, LeafOp::Lte(_)),
            },
            LeafOp::Regex(_) | LeafOp::Exists(_) => return None,
        };
        Some(interval)
    }

    pub fn contains(&self, value: &Value) -> bool {
        let lower = self.start.cmp_value(value);
        let upper = self.end.cmp_value(value);
        let above_start = lower == Ordering::Less || (lower == Ordering::Equal && self.start_inclusive);
        let below_end =
            upper == Ordering::Greater || (upper == Ordering::Equal && self.end_inclusive);
        above_start && below_end
    }

    pub fn is_point(&self) -> bool {
        matches!(self.start, Endpoint::Value(_))
            && self.start_inclusive
            && self.end_inclusive
            && self.start.cmp(&self.end) == Ordering::Equal
    }

    pub fn is_all_values(&self) -> bool {
        self.start == Endpoint::MinKey && self.end == Endpoint::MaxKey
    }

    pub fn is_empty(&self) -> bool {
        match self.start.cmp(&self.end) {
            Ordering::Greater => true,
            Ordering::Equal => !(self.start_inclusive && self.end_inclusive),
            Ordering::Less => false,
        }
    }

    /// Overlap of two intervals, `None` when disjoint
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let (start, start_inclusive) = match self.start.cmp(&other.start) {
            Ordering::Greater => (self.start.clone(), self.start_inclusive),
            Ordering::Less => (other.start.clone(), other.start_inclusive),
            Ordering::Equal => (
                self.start.clone(),
                self.start_inclusive && other.start_inclusive,
            ),
        };
        let (end, end_inclusive) = match self.end.cmp(&other.end) {
            Ordering::Less => (self.end.clone(), self.end_inclusive),
            Ordering::Greater => (other.end.clone(), other.end_inclusive),
            Ordering::Equal => (self.end.clone(), self.end_inclusive && other.end_inclusive),
        };
        let interval = Interval {
            start,
            start_inclusive,
            end,
            end_inclusive,
        };
        if interval.is_empty() {
            None
        } else {
            Some(interval)
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}, {}{}",
            if self.start_inclusive { "[" } else { "(" },
            self.start,
            self.end,
            if self.end_inclusive { "]" } else { ")" }
        )
    }
}

/// Intervals for one key field, in ascending order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedIntervalList {
    pub field: String,
    pub intervals: Vec<Interval>,
}

impl OrderedIntervalList {
    pub fn all_values(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            intervals: vec![Interval::all_values()],
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.intervals.iter().any(|i| i.contains(value))
    }

    pub fn is_point(&self) -> bool {
        self.intervals.len() == 1 && self.intervals[0].is_point()
    }

    pub fn is_all_values(&self) -> bool {
        self.intervals.len() == 1 && self.intervals[0].is_all_values()
    }

    /// Narrows every interval by `other`, dropping the ones that vanish
    pub fn intersect_with(&mut self, other: &Interval) {
        self.intervals = self
            .intervals
            .iter()
            .filter_map(|i| i.intersect(other))
            .collect();
    }
}

impl fmt::Display for OrderedIntervalList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "['{}']: ", self.field)?;
        for (i, interval) in self.intervals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", interval)?;
        }
        Ok(())
    }
}

/// Bounds of an index scan: one interval list per key field
#[derive(Debug, Clone, PartialEq)]
pub struct IndexBounds {
    pub fields: Vec<OrderedIntervalList>,
}

impl IndexBounds {
    /// Unconstrained bounds over every field of `key_pattern`
    pub fn all_values(key_pattern: &SortPattern) -> Self {
        Self {
            fields: key_pattern
                .fields()
                .map(OrderedIntervalList::all_values)
                .collect(),
        }
    }

    /// Narrows the bounds of key position `pos` by an indexable leaf.
    ///
    /// Returns false if the leaf cannot be expressed as an interval or the
    /// position is out of range.
    pub fn constrain(&mut self, pos: usize, op: &LeafOp) -> bool {
        let Some(interval) = Interval::from_leaf(op) else {
            return false;
        };
        match self.fields.get_mut(pos) {
            Some(list) => {
                list.intersect_with(&interval);
                true
            }
            None => false,
        }
    }

    /// Whether a full index key lies within the bounds
    pub fn contains_key(&self, key: &[Value]) -> bool {
        self.fields.len() == key.len()
            && self
                .fields
                .iter()
                .zip(key.iter())
                .all(|(list, value)| list.contains(value))
    }

    /// Every field is a single point; such scans return records in
    /// record-id order.
    pub fn is_point_scan(&self) -> bool {
        !self.fields.is_empty() && self.fields.iter().all(OrderedIntervalList::is_point)
    }

    /// Number of leading fields bound to a single point
    pub fn equality_prefix_len(&self) -> usize {
        self.fields.iter().take_while(|l| l.is_point()).count()
    }
}

impl fmt::Display for IndexBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, list) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "field #{}{}", i, list)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_point_interval() {
        let interval = Interval::from_leaf(&LeafOp::Eq(json!(5))).unwrap();
        assert!(interval.is_point());
        assert!(interval.contains(&json!(5)));
        assert!(interval.contains(&json!(5.0)));
        assert!(!interval.contains(&json!(6)));
        assert_eq!(interval.to_string(), "[5, 5]");
    }

    #[test]
    fn test_range_is_type_bracketed() {
        let interval = Interval::from_leaf(&LeafOp::Gt(json!(5))).unwrap();
        assert!(interval.contains(&json!(6)));
        assert!(!interval.contains(&json!(5)));
        assert!(!interval.contains(&json!("zzz")));
        assert!(!interval.contains(&json!(null)));
        assert_eq!(interval.to_string(), "(5, inf]");

        let interval = Interval::from_leaf(&LeafOp::Lte(json!("m"))).unwrap();
        assert!(interval.contains(&json!("a")));
        assert!(!interval.contains(&json!(1)));
    }

    #[test]
    fn test_non_indexable_leaf() {
        assert!(Interval::from_leaf(&LeafOp::Eq(json!(null))).is_none());
        assert!(Interval::from_leaf(&LeafOp::Exists(true)).is_none());
    }

    #[test]
    fn test_intersection() {
        let gt = Interval::from_leaf(&LeafOp::Gt(json!(1))).unwrap();
        let lte = Interval::from_leaf(&LeafOp::Lte(json!(10))).unwrap();
        let both = gt.intersect(&lte).unwrap();
        assert_eq!(both.to_string(), "(1, 10]");

        let lt = Interval::from_leaf(&LeafOp::Lt(json!(1))).unwrap();
        assert!(gt.intersect(&lt).is_none());
    }

    #[test]
    fn test_all_values_contains_everything() {
        let all = Interval::all_values();
        for v in [json!(null), json!(1), json!("s"), json!([1]), json!(true)] {
            assert!(all.contains(&v));
        }
    }

    #[test]
    fn test_compound_bounds() {
        let pattern = SortPattern::ascending(["a", "b"]);
        let mut bounds = IndexBounds::all_values(&pattern);
        assert!(bounds.constrain(0, &LeafOp::Eq(json!(1))));
        assert!(!bounds.is_point_scan());
        assert_eq!(bounds.equality_prefix_len(), 1);

        assert!(bounds.constrain(1, &LeafOp::Eq(json!("x"))));
        assert!(bounds.is_point_scan());
        assert!(bounds.contains_key(&[json!(1), json!("x")]));
        assert!(!bounds.contains_key(&[json!(1), json!("y")]));
        assert!(!bounds.constrain(2, &LeafOp::Eq(json!(1))));
    }
}
