//! Key patterns and sort patterns
//!
//! An index key pattern and a requested sort order share one shape: an
//! ordered list of (field, direction).

use std::fmt;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    /// Key pattern notation (1 / -1)
    pub fn as_int(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// One component of a sort or key pattern
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Ordered list of sort components
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortPattern(Vec<SortSpec>);

impl SortPattern {
    pub fn new(specs: Vec<SortSpec>) -> Self {
        Self(specs)
    }

    /// Ascending pattern over the given fields
    pub fn ascending<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(SortSpec::asc).collect())
    }

    pub fn specs(&self) -> &[SortSpec] {
        &self.0
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.field.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First `n` components
    pub fn prefix(&self, n: usize) -> Self {
        Self(self.0.iter().take(n).cloned().collect())
    }

    /// Components from `start` onwards
    pub fn suffix(&self, start: usize) -> Self {
        Self(self.0.iter().skip(start).cloned().collect())
    }

    /// Same fields, every direction flipped
    pub fn reversed(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|s| SortSpec {
                    field: s.field.clone(),
                    direction: s.direction.reversed(),
                })
                .collect(),
        )
    }

    pub fn position_of(&self, field: &str) -> Option<usize> {
        self.0.iter().position(|s| s.field == field)
    }
}

impl fmt::Display for SortPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, spec) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", spec.field, spec.direction.as_int())?;
        }
        write!(f, "}}")
    }
}
