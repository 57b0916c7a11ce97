//! In-memory collection: records, indexes and drop tracking
//!
//! Records are never removed; record ids are insertion positions. Drops
//! are recorded behind locks so that a hook can drop an index while a
//! planning trial holds a shared reference.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::RwLock;

use serde_json::Value;

use crate::expression::{compare_values, resolve_path};
use crate::index::{IndexBounds, IndexCatalog, IndexEntry, SortDirection, SortPattern};

use super::view::CatalogView;

/// Record identifier
pub type RecordId = u64;

/// One index key pointing at a record
#[derive(Debug, Clone, PartialEq)]
pub struct IndexKeyEntry {
    pub key: Vec<Value>,
    pub record_id: RecordId,
}

/// In-memory collection
#[derive(Debug)]
pub struct Collection {
    name: String,
    records: Vec<Value>,
    indexes: Vec<IndexEntry>,
    dropped: AtomicBool,
    dropped_indexes: RwLock<HashSet<String>>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
            indexes: Vec::new(),
            dropped: AtomicBool::new(false),
            dropped_indexes: RwLock::new(HashSet::new()),
        }
    }

    /// Builds a collection from documents and index key patterns
    pub fn with_documents(
        name: impl Into<String>,
        documents: Vec<Value>,
        indexes: Vec<IndexEntry>,
    ) -> Self {
        let mut collection = Self::new(name);
        for doc in documents {
            collection.insert(doc);
        }
        for index in indexes {
            collection.create_index(index);
        }
        collection
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a document, updating multikey flags
    pub fn insert(&mut self, document: Value) -> RecordId {
        for index in &mut self.indexes {
            if !index.multikey && is_multikey_for(&index.key_pattern, &document) {
                index.multikey = true;
            }
        }
        self.records.push(document);
        (self.records.len() - 1) as RecordId
    }

    /// Adds an index. The multikey flag is derived from the data.
    pub fn create_index(&mut self, entry: IndexEntry) {
        let multikey = entry.multikey
            || self
                .records
                .iter()
                .any(|doc| is_multikey_for(&entry.key_pattern, doc));
        self.indexes.push(entry.with_multikey(multikey));
    }

    pub fn num_records(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, id: RecordId) -> Option<&Value> {
        self.records.get(id as usize)
    }

    pub fn record_ids(&self) -> impl DoubleEndedIterator<Item = RecordId> + '_ {
        (0..self.records.len()).map(|i| i as RecordId)
    }

    /// Live indexes in declaration order
    pub fn index_catalog(&self) -> IndexCatalog {
        IndexCatalog::new(
            self.indexes
                .iter()
                .filter(|e| self.index_exists(&e.name))
                .cloned()
                .collect(),
        )
    }

    /// Marks an index dropped. Returns false if it was unknown or already
    /// dropped.
    pub fn drop_index(&self, name: &str) -> bool {
        if !self.indexes.iter().any(|e| e.name == name) {
            return false;
        }
        match self.dropped_indexes.write() {
            Ok(mut dropped) => dropped.insert(name.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(name.to_string()),
        }
    }

    pub fn drop_collection(&self) {
        self.dropped.store(true, AtomicOrdering::SeqCst);
    }

    /// All keys `document` generates for an index.
    ///
    /// Array values expand to one key per element; missing fields key as
    /// null.
    pub fn index_keys(key_pattern: &SortPattern, document: &Value) -> Vec<Vec<Value>> {
        let mut keys: Vec<Vec<Value>> = vec![Vec::new()];
        for field in key_pattern.fields() {
            let values = key_values(document, field);
            keys = keys
                .into_iter()
                .flat_map(|prefix| {
                    values.iter().map(move |v| {
                        let mut key = prefix.clone();
                        key.push(v.clone());
                        key
                    })
                })
                .collect();
        }
        keys
    }

    /// Index keys within `bounds`, in scan order.
    ///
    /// Returns `None` if the index does not exist.
    pub fn scan_index(
        &self,
        index_name: &str,
        bounds: &IndexBounds,
        direction: SortDirection,
    ) -> Option<Vec<IndexKeyEntry>> {
        if !self.index_exists(index_name) {
            return None;
        }
        let entry = self.indexes.iter().find(|e| e.name == index_name)?;
        let mut keys: Vec<IndexKeyEntry> = self
            .records
            .iter()
            .enumerate()
            .flat_map(|(rid, doc)| {
                Self::index_keys(&entry.key_pattern, doc)
                    .into_iter()
                    .filter(|key| bounds.contains_key(key))
                    .map(move |key| IndexKeyEntry {
                        key,
                        record_id: rid as RecordId,
                    })
            })
            .collect();
        keys.sort_by(|a, b| {
            compare_keys(&entry.key_pattern, &a.key, &b.key).then(a.record_id.cmp(&b.record_id))
        });
        if direction == SortDirection::Desc {
            keys.reverse();
        }
        Some(keys)
    }
}

impl CatalogView for Collection {
    fn collection_exists(&self) -> bool {
        !self.dropped.load(AtomicOrdering::SeqCst)
    }

    fn index_exists(&self, name: &str) -> bool {
        if !self.collection_exists() {
            return false;
        }
        let dropped = match self.dropped_indexes.read() {
            Ok(set) => set.contains(name),
            Err(poisoned) => poisoned.into_inner().contains(name),
        };
        !dropped && self.indexes.iter().any(|e| e.name == name)
    }
}

/// Compares two keys under a key pattern's per-field directions
pub fn compare_keys(key_pattern: &SortPattern, a: &[Value], b: &[Value]) -> Ordering {
    for ((spec, x), y) in key_pattern.specs().iter().zip(a).zip(b) {
        let ord = compare_values(x, y);
        let ord = match spec.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn key_values(document: &Value, path: &str) -> Vec<Value> {
    let mut out = Vec::new();
    for value in resolve_path(document, path) {
        match value {
            Value::Array(elements) if !elements.is_empty() => {
                out.extend(elements.iter().cloned());
            }
            Value::Array(_) => out.push(Value::Null),
            other => out.push(other.clone()),
        }
    }
    if out.is_empty() {
        out.push(Value::Null);
    }
    out.dedup();
    out
}

fn is_multikey_for(key_pattern: &SortPattern, document: &Value) -> bool {
    key_pattern.fields().any(|field| {
        let values = resolve_path(document, field);
        values.len() > 1 || values.iter().any(|v| v.is_array())
    })
}
