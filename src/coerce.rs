//! Cell coercion: one trimmed cell string to one typed [`Value`].
//!
//! Failures are ordinary values of [`CoerceError`]; the synthesizer logs
//! them with sheet coordinates and moves on to the next cell.
//!
//! ## Cell grammar
//!
//! - `int` – decimal text, or `EnumType.Member` resolved through the registry
//! - `long`, `float`, `double`, `bool` – native parsing (`bool` is
//!   case-insensitive `true`/`false`)
//! - `string` – text wrapped in one pair of delimiters by the caller
//! - `Vector2` / `Vector3` – `(x, y[, z])`
//! - `T[]` – `[v, v, ...]`; blank elements are skipped
//! - enums – a bare member name
//! - reference kinds – a path or asset name handed to the [`AssetResolver`]

use log::warn;
use thiserror::Error;

use crate::{
    data::Value,
    registry::{FieldType, RegistryError, TypeRegistry},
    resolver::{AssetResolver, Resolution},
};

#[derive(Debug, Error, PartialEq)]
pub enum CoerceError {
    #[error("'{0}' is not an integer or EnumType.Member")]
    InvalidInteger(String),
    #[error("'{0}' is not a valid {1}")]
    InvalidNumber(String, &'static str),
    #[error("'{0}' is not true or false")]
    InvalidBoolean(String),
    #[error("'{0}' is missing its surrounding delimiters")]
    MissingDelimiters(String),
    #[error("component {index} of '{text}' is empty")]
    EmptyComponent { text: String, index: usize },
    #[error("'{text}' has {found} component(s), at most {expected} allowed")]
    TooManyComponents {
        text: String,
        expected: usize,
        found: usize,
    },
    #[error("element {index} of '{text}': {source}")]
    Element {
        text: String,
        index: usize,
        #[source]
        source: Box<CoerceError>,
    },
    #[error("'{member}' is not a member of enum {enum_name}")]
    UnknownEnumMember { enum_name: String, member: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("no {kind} found for '{name}'")]
    ReferenceNotFound { kind: String, name: String },
    #[error("type '{0}' is not supported")]
    Unsupported(String),
}

impl CoerceError {
    /// True when the cell, or one of its array elements, names an external
    /// reference the resolver could not find.
    pub fn is_missing_reference(&self) -> bool {
        match self {
            CoerceError::ReferenceNotFound { .. } => true,
            CoerceError::Element { source, .. } => source.is_missing_reference(),
            _ => false,
        }
    }
}

pub struct Coercer<'a> {
    registry: &'a TypeRegistry,
    resolver: &'a dyn AssetResolver,
}

impl<'a> Coercer<'a> {
    pub fn new(registry: &'a TypeRegistry, resolver: &'a dyn AssetResolver) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &TypeRegistry {
        self.registry
    }

    pub fn convert(&self, ty: &FieldType, raw: &str) -> Result<Value, CoerceError> {
        let text = raw.trim();
        match ty {
            FieldType::Int => self.convert_int(text),
            FieldType::Long => text
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| CoerceError::InvalidNumber(text.to_string(), "long")),
            FieldType::Float => parse_float(text, "float").map(Value::Float),
            FieldType::Double => parse_float(text, "double").map(Value::Float),
            FieldType::Bool => parse_bool(text).map(Value::Boolean),
            FieldType::String => strip_delimiters(text).map(|inner| Value::String(inner.to_string())),
            FieldType::Vector2 => parse_vector::<2>(text).map(Value::Vector2),
            FieldType::Vector3 => parse_vector::<3>(text).map(Value::Vector3),
            FieldType::Array(element) => self.convert_array(element, text),
            FieldType::Enum(name) => {
                let enum_type = self.registry.enum_type(name)?;
                let member = enum_type
                    .member(text)
                    .ok_or_else(|| CoerceError::UnknownEnumMember {
                        enum_name: enum_type.name.clone(),
                        member: text.to_string(),
                    })?;
                Ok(Value::Enum {
                    type_name: enum_type.name.clone(),
                    member: member.name.clone(),
                    value: member.value,
                })
            }
            FieldType::Reference(kind) => self.convert_reference(kind, text),
            FieldType::Unsupported(name) => Err(CoerceError::Unsupported(name.clone())),
        }
    }

    fn convert_int(&self, text: &str) -> Result<Value, CoerceError> {
        if let Ok(parsed) = text.parse::<i32>() {
            return Ok(Value::Integer(i64::from(parsed)));
        }
        let (type_name, member) = match text.split('.').collect::<Vec<_>>().as_slice() {
            [type_name, member] => (type_name.trim(), member.trim()),
            _ => return Err(CoerceError::InvalidInteger(text.to_string())),
        };
        let enum_type = self.registry.enum_type(type_name)?;
        enum_type
            .member(member)
            .map(|m| Value::Integer(m.value))
            .ok_or_else(|| CoerceError::UnknownEnumMember {
                enum_name: enum_type.name.clone(),
                member: member.to_string(),
            })
    }

    fn convert_array(&self, element: &FieldType, text: &str) -> Result<Value, CoerceError> {
        let inner = strip_delimiters(text)?;
        let mut items = Vec::new();
        for (index, part) in inner.split(',').enumerate() {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let value = self
                .convert(element, part)
                .map_err(|source| CoerceError::Element {
                    text: text.to_string(),
                    index,
                    source: Box::new(source),
                })?;
            items.push(value);
        }
        Ok(Value::Array(items))
    }

    fn convert_reference(&self, kind: &str, text: &str) -> Result<Value, CoerceError> {
        match self.resolver.resolve(kind, text) {
            Resolution::Found(handle) => Ok(Value::Reference(handle)),
            Resolution::Ambiguous(mut handles) => {
                warn!(
                    "Several {kind} assets match \"{text}\", using the first:\n{}",
                    handles
                        .iter()
                        .map(|h| h.path.as_str())
                        .collect::<Vec<_>>()
                        .join("\n")
                );
                Ok(Value::Reference(handles.remove(0)))
            }
            Resolution::NotFound => Err(CoerceError::ReferenceNotFound {
                kind: kind.to_string(),
                name: text.to_string(),
            }),
        }
    }
}

fn parse_float(text: &str, label: &'static str) -> Result<f64, CoerceError> {
    text.parse::<f64>()
        .map_err(|_| CoerceError::InvalidNumber(text.to_string(), label))
}

fn parse_bool(text: &str) -> Result<bool, CoerceError> {
    if text.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if text.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(CoerceError::InvalidBoolean(text.to_string()))
    }
}

/// Drops exactly one leading and one trailing character.
fn strip_delimiters(text: &str) -> Result<&str, CoerceError> {
    let mut chars = text.chars();
    match (chars.next(), chars.next_back()) {
        (Some(_), Some(_)) => Ok(chars.as_str()),
        _ => Err(CoerceError::MissingDelimiters(text.to_string())),
    }
}

/// Parses `(x, y[, z])`. Missing trailing components stay zero; an empty or
/// unparsable component fails the whole vector.
fn parse_vector<const N: usize>(text: &str) -> Result<[f32; N], CoerceError> {
    let inner = strip_delimiters(text)?;
    let parts = inner.split(',').map(str::trim).collect::<Vec<_>>();
    if parts.len() > N {
        return Err(CoerceError::TooManyComponents {
            text: text.to_string(),
            expected: N,
            found: parts.len(),
        });
    }
    let mut vector = [0.0f32; N];
    for (index, part) in parts.into_iter().enumerate() {
        if part.is_empty() {
            return Err(CoerceError::EmptyComponent {
                text: text.to_string(),
                index,
            });
        }
        vector[index] = parse_float(part, "float").map_err(|source| CoerceError::Element {
            text: text.to_string(),
            index,
            source: Box::new(source),
        })? as f32;
    }
    Ok(vector)
}
