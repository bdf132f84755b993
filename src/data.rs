use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Opaque handle to an external asset returned by an asset resolver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetHandle {
    pub kind: String,
    pub path: String,
}

impl AssetHandle {
    pub fn new(kind: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            path: path.into(),
        }
    }
}

/// One typed cell value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Enum {
        type_name: String,
        member: String,
        value: i64,
    },
    Array(Vec<Value>),
    Reference(AssetHandle),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::String(s) => s.clone(),
            Value::Vector2(v) => format!("({})", v.iter().join(", ")),
            Value::Vector3(v) => format!("({})", v.iter().join(", ")),
            Value::Enum {
                type_name, member, ..
            } => format!("{type_name}.{member}"),
            Value::Array(items) => format!("[{}]", items.iter().map(Value::as_display).join(", ")),
            Value::Reference(handle) => handle.path.clone(),
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}
