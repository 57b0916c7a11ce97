//! Index descriptors and the planner's index catalog

use std::collections::HashMap;
use std::fmt;

use super::key_pattern::SortPattern;

/// Immutable descriptor of one index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Unique index name
    pub name: String,
    /// Indexed fields in key order
    pub key_pattern: SortPattern,
    /// True if some document holds an array on an indexed path
    pub multikey: bool,
}

impl IndexEntry {
    pub fn new(name: impl Into<String>, key_pattern: SortPattern) -> Self {
        Self {
            name: name.into(),
            key_pattern,
            multikey: false,
        }
    }

    pub fn with_multikey(mut self, multikey: bool) -> Self {
        self.multikey = multikey;
        self
    }

    /// Position of `path` within the key pattern
    pub fn position_of(&self, path: &str) -> Option<usize> {
        self.key_pattern.position_of(path)
    }

    pub fn first_field(&self) -> Option<&str> {
        self.key_pattern.fields().next()
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.key_pattern)?;
        if self.multikey {
            write!(f, " multikey")?;
        }
        Ok(())
    }
}

/// Index name → ordinal in the catalog
pub type IndexMap = HashMap<String, usize>;

/// Ordered index catalog. Ordinals follow declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexCatalog {
    entries: Vec<IndexEntry>,
}

impl IndexCatalog {
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: IndexEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, ordinal: usize) -> Option<&IndexEntry> {
        self.entries.get(ordinal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Looks an index up by name
    pub fn find(&self, name: &str) -> Option<(usize, &IndexEntry)> {
        self.entries.iter().enumerate().find(|(_, e)| e.name == name)
    }

    /// Builds the name → ordinal map used while tagging
    pub fn index_map(&self) -> IndexMap {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect()
    }
}
