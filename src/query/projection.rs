//! Field projections
//!
//! Paths are dotted and walk nested objects only.

use std::fmt;

use serde_json::{Map, Value};

/// Inclusion or exclusion projection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Include(fields.into_iter().map(Into::into).collect())
    }

    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Exclude(fields.into_iter().map(Into::into).collect())
    }

    pub fn is_inclusion_only(&self) -> bool {
        matches!(self, Projection::Include(_))
    }

    /// Fields the projection needs, for inclusion projections
    pub fn required_fields(&self) -> Option<&[String]> {
        match self {
            Projection::Include(fields) => Some(fields),
            Projection::Exclude(_) => None,
        }
    }

    /// Projects a full document
    pub fn apply(&self, document: &Value) -> Value {
        match self {
            Projection::Include(fields) => {
                let mut out = Value::Object(Map::new());
                for field in fields {
                    if let Some(v) = get_path(document, field) {
                        set_path(&mut out, field, v.clone());
                    }
                }
                out
            }
            Projection::Exclude(fields) => {
                let mut out = document.clone();
                for field in fields {
                    remove_path(&mut out, field);
                }
                out
            }
        }
    }

    /// Builds an inclusion result from index key data
    pub fn apply_to_key_data(&self, key_data: &[(String, Value)]) -> Value {
        let mut out = Value::Object(Map::new());
        if let Projection::Include(fields) = self {
            for field in fields {
                if let Some((_, v)) = key_data.iter().find(|(f, _)| f == field) {
                    set_path(&mut out, field, v.clone());
                }
            }
        }
        out
    }
}

fn get_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, part| current.as_object()?.get(part))
}

fn set_path(target: &mut Value, path: &str, value: Value) {
    let mut parts = path.split('.').peekable();
    let mut current = target;
    while let Some(part) = parts.next() {
        let Value::Object(map) = current else {
            return;
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

fn remove_path(target: &mut Value, path: &str) {
    match path.split_once('.') {
        None => {
            if let Value::Object(map) = target {
                map.remove(path);
            }
        }
        Some((head, rest)) => {
            if let Some(child) = target.as_object_mut().and_then(|m| m.get_mut(head)) {
                remove_path(child, rest);
            }
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fields, flag) = match self {
            Projection::Include(fields) => (fields, 1),
            Projection::Exclude(fields) => (fields, 0),
        };
        write!(f, "{{")?;
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", field, flag)?;
        }
        write!(f, "}}")
    }
}
