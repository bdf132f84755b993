//! Explicit type registry consulted by the converter.
//!
//! Record types, table holder types, enums and external reference kinds are
//! registered up front (by the host, or by code generation writing the
//! registry file) instead of being discovered at run time. Lookups accept a
//! fully qualified name (`game::Item`) or a bare trailing segment (`Item`); a
//! bare name matching more than one entry is ambiguous.

use std::{fmt, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::yaml_provider;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No {kind} named '{name}' is registered")]
    NotFound { kind: &'static str, name: String },
    #[error("{kind} name '{name}' matches several entries: {}", candidates.join(", "))]
    Ambiguous {
        kind: &'static str,
        name: String,
        candidates: Vec<String>,
    },
}

/// Member type of a record, resolved from a type token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Long,
    Float,
    Double,
    Bool,
    String,
    Vector2,
    Vector3,
    Enum(String),
    Reference(String),
    Array(Box<FieldType>),
    Unsupported(String),
}

impl FieldType {
    pub fn element_type(&self) -> Option<&FieldType> {
        match self {
            FieldType::Array(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, FieldType::String)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => f.write_str("int"),
            FieldType::Long => f.write_str("long"),
            FieldType::Float => f.write_str("float"),
            FieldType::Double => f.write_str("double"),
            FieldType::Bool => f.write_str("bool"),
            FieldType::String => f.write_str("string"),
            FieldType::Vector2 => f.write_str("Vector2"),
            FieldType::Vector3 => f.write_str("Vector3"),
            FieldType::Enum(name) | FieldType::Reference(name) | FieldType::Unsupported(name) => {
                f.write_str(name)
            }
            FieldType::Array(inner) => write!(f, "{inner}[]"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordType {
    pub name: String,
    #[serde(default)]
    pub members: Vec<MemberDef>,
}

impl RecordType {
    pub fn member(&self, name: &str) -> Option<&MemberDef> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableType {
    pub name: String,
    pub row_type: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub dictionary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    #[serde(default)]
    pub members: Vec<EnumMember>,
}

impl EnumType {
    pub fn member(&self, name: &str) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// A kind of external asset a member may reference, e.g. `Sprite`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceKind {
    pub name: String,
    /// File extensions (without dot) searched by the directory resolver;
    /// empty means any extension.
    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TypeRegistry {
    pub records: Vec<RecordType>,
    pub tables: Vec<TableType>,
    pub enums: Vec<EnumType>,
    pub reference_kinds: Vec<ReferenceKind>,
}

trait Named {
    fn name(&self) -> &str;
}

macro_rules! impl_named {
    ($($ty:ty),*) => {
        $(impl Named for $ty {
            fn name(&self) -> &str {
                &self.name
            }
        })*
    };
}

impl_named!(RecordType, TableType, EnumType, ReferenceKind);

fn last_segment(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

fn lookup<'a, T: Named>(entries: &'a [T], kind: &'static str, name: &str) -> Result<&'a T, RegistryError> {
    if let Some(exact) = entries.iter().find(|e| e.name() == name) {
        return Ok(exact);
    }
    let matches = entries
        .iter()
        .filter(|e| last_segment(e.name()) == name)
        .collect::<Vec<_>>();
    match matches.as_slice() {
        [] => Err(RegistryError::NotFound {
            kind,
            name: name.to_string(),
        }),
        [single] => Ok(*single),
        many => Err(RegistryError::Ambiguous {
            kind,
            name: name.to_string(),
            candidates: many.iter().map(|e| e.name().to_string()).collect(),
        }),
    }
}

fn upsert<T: Named>(entries: &mut Vec<T>, entry: T) {
    match entries.iter_mut().find(|e| e.name() == entry.name()) {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
}

impl TypeRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        yaml_provider::load_from_path(path).with_context(|| format!("Loading type registry {path:?}"))
    }

    /// Loads the registry, starting empty when the file does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        Ok(yaml_provider::load_if_exists(path)
            .with_context(|| format!("Loading type registry {path:?}"))?
            .unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        yaml_provider::save_to_path(path, self).with_context(|| format!("Writing type registry {path:?}"))
    }

    pub fn record(&self, name: &str) -> Result<&RecordType, RegistryError> {
        lookup(&self.records, "record type", name)
    }

    pub fn table(&self, name: &str) -> Result<&TableType, RegistryError> {
        lookup(&self.tables, "table type", name)
    }

    pub fn enum_type(&self, name: &str) -> Result<&EnumType, RegistryError> {
        lookup(&self.enums, "enum", name)
    }

    pub fn reference_kind(&self, name: &str) -> Result<&ReferenceKind, RegistryError> {
        lookup(&self.reference_kinds, "reference kind", name)
    }

    pub fn register_record(&mut self, record: RecordType) {
        upsert(&mut self.records, record);
    }

    pub fn register_table(&mut self, table: TableType) {
        upsert(&mut self.tables, table);
    }

    pub fn register_enum(&mut self, enum_type: EnumType) {
        upsert(&mut self.enums, enum_type);
    }

    pub fn register_reference_kind(&mut self, kind: ReferenceKind) {
        upsert(&mut self.reference_kinds, kind);
    }

    /// Resolves a type token such as `int`, `Vector3`, `Rarity` or `Sprite[]`.
    pub fn field_type(&self, token: &str) -> FieldType {
        let token = token.trim();
        if let Some(inner) = token.strip_suffix("[]") {
            return FieldType::Array(Box::new(self.field_type(inner)));
        }
        match token {
            "int" | "i32" => FieldType::Int,
            "long" | "i64" => FieldType::Long,
            "float" | "f32" => FieldType::Float,
            "double" | "f64" => FieldType::Double,
            "bool" => FieldType::Bool,
            "string" | "String" => FieldType::String,
            "Vector2" => FieldType::Vector2,
            "Vector3" => FieldType::Vector3,
            other => {
                if let Ok(found) = self.enum_type(other) {
                    FieldType::Enum(found.name.clone())
                } else if let Ok(kind) = self.reference_kind(other) {
                    FieldType::Reference(kind.name.clone())
                } else {
                    FieldType::Unsupported(other.to_string())
                }
            }
        }
    }
}
