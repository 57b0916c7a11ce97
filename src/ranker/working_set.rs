//! Shared scratch buffer for trial execution
//!
//! Stages pass results to their parents as `WorkingSetId`s. Members are
//! owned by the set; freed slots are reused.

use serde_json::Value;

use crate::catalog::{Collection, RecordId};
use crate::expression::resolve_path;

/// Handle of a working set member
pub type WorkingSetId = usize;

/// One in-flight result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingSetMember {
    pub record_id: Option<RecordId>,
    /// Full (or projected) document, once fetched
    pub doc: Option<Value>,
    /// (field, value) pairs taken from an index key
    pub key_data: Vec<(String, Value)>,
}

impl WorkingSetMember {
    pub fn from_record(record_id: RecordId, doc: Value) -> Self {
        Self {
            record_id: Some(record_id),
            doc: Some(doc),
            key_data: Vec::new(),
        }
    }

    pub fn from_key(record_id: RecordId, key_data: Vec<(String, Value)>) -> Self {
        Self {
            record_id: Some(record_id),
            doc: None,
            key_data,
        }
    }

    pub fn has_doc(&self) -> bool {
        self.doc.is_some()
    }

    /// Loads the record document if the member has none
    pub fn ensure_doc(&mut self, collection: &Collection) -> bool {
        if self.doc.is_none() {
            self.doc = self
                .record_id
                .and_then(|rid| collection.record(rid))
                .cloned();
        }
        self.doc.is_some()
    }

    /// Value used when ordering by `field`: the first value at the path,
    /// then index key data, then null.
    pub fn sort_value(&self, field: &str) -> Value {
        if let Some(doc) = &self.doc {
            return resolve_path(doc, field)
                .into_iter()
                .next()
                .cloned()
                .unwrap_or(Value::Null);
        }
        self.key_data
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null)
    }

    /// Folds the data of another member for the same record into this one
    pub fn merge_from(&mut self, other: WorkingSetMember) {
        if self.doc.is_none() {
            self.doc = other.doc;
        }
        for (field, value) in other.key_data {
            if !self.key_data.iter().any(|(f, _)| *f == field) {
                self.key_data.push((field, value));
            }
        }
    }
}

/// Slot arena of members
#[derive(Debug, Default)]
pub struct WorkingSet {
    slots: Vec<Option<WorkingSetMember>>,
    free_list: Vec<WorkingSetId>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, member: WorkingSetMember) -> WorkingSetId {
        match self.free_list.pop() {
            Some(id) => {
                self.slots[id] = Some(member);
                id
            }
            None => {
                self.slots.push(Some(member));
                self.slots.len() - 1
            }
        }
    }

    pub fn get(&self, id: WorkingSetId) -> Option<&WorkingSetMember> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: WorkingSetId) -> Option<&mut WorkingSetMember> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// Removes a member, returning it
    pub fn take(&mut self, id: WorkingSetId) -> Option<WorkingSetMember> {
        let member = self.slots.get_mut(id)?.take()?;
        self.free_list.push(id);
        Some(member)
    }

    pub fn free(&mut self, id: WorkingSetId) {
        self.take(id);
    }

    /// Drops every member
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
    }

    /// Number of live members
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
