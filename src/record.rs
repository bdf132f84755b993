use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::Value;

/// One synthesized row: member values keyed by member name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Record {
    pub type_name: String,
    pub identity: String,
    /// Trimmed key cell values in key order; empty when no keys are configured.
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(type_name: impl Into<String>, identity: impl Into<String>, key: Vec<String>) -> Self {
        Self {
            type_name: type_name.into(),
            identity: identity.into(),
            key,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, member: &str) -> Option<&Value> {
        self.fields.get(member)
    }

    pub fn set(&mut self, member: impl Into<String>, value: Value) {
        self.fields.insert(member.into(), value);
    }

    pub fn unset(&mut self, member: &str) -> Option<Value> {
        self.fields.remove(member)
    }

    /// Appends to an array member, creating the array when it is missing.
    pub fn push_element(&mut self, member: &str, value: Value) {
        let mut items = match self.fields.remove(member) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        items.push(value);
        self.fields.insert(member.to_string(), Value::Array(items));
    }
}

/// Ordered rows of one sheet persisted as a single object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TableCollection {
    pub name: String,
    pub row_type: String,
    #[serde(default)]
    pub keys: Vec<String>,
    /// `None` when a stored table predates its rows being initialized.
    #[serde(default)]
    pub rows: Option<Vec<Record>>,
}

impl TableCollection {
    pub fn new(name: impl Into<String>, row_type: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            name: name.into(),
            row_type: row_type.into(),
            keys,
            rows: Some(Vec::new()),
        }
    }

    pub fn rows(&self) -> &[Record] {
        self.rows.as_deref().unwrap_or_default()
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Record> {
        self.rows.get_or_insert_with(Vec::new)
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    /// First row whose composite key equals `key`.
    pub fn find(&self, key: &[&str]) -> Option<&Record> {
        self.rows().iter().find(|record| {
            record.key.len() == key.len() && record.key.iter().zip(key).all(|(a, b)| a == b)
        })
    }
}
