//! Header extraction: turns the name, type and enabled rows of a sheet into
//! one [`FieldDescriptor`] per column.
//!
//! ## Field name grammar
//!
//! - `identifier` – a scalar member.
//! - `identifier[n]` / `identifier[]` – one element of the array member
//!   `identifier`. Every column sharing the base name contributes to the same
//!   array, in column order. The bracket index is parsed
//!   ([`FieldDescriptor::array_index`]) but does not decide placement.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::{grid::Grid, settings::HeaderLayout};

static ARRAY_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*(\d*)\s*\]\s*$").expect("array index pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub column: usize,
    pub name: String,
    pub declared_type: String,
    pub is_valid: bool,
    pub is_array_field: bool,
    pub base_name: String,
}

impl FieldDescriptor {
    pub fn new(column: usize, name: &str, declared_type: &str) -> Self {
        let name = name.trim();
        let is_array_field = name.contains('[');
        let base_name = match name.rfind('[') {
            Some(idx) => name[..idx].trim_end().to_string(),
            None => name.to_string(),
        };
        Self {
            column,
            name: name.to_string(),
            declared_type: declared_type.trim().to_string(),
            is_valid: !name.is_empty() && !declared_type.trim().is_empty(),
            is_array_field,
            base_name,
        }
    }

    fn invalid(column: usize) -> Self {
        Self {
            column,
            name: String::new(),
            declared_type: String::new(),
            is_valid: false,
            is_array_field: false,
            base_name: String::new(),
        }
    }

    /// The bracket index of an array column, when one is written.
    pub fn array_index(&self) -> Option<usize> {
        ARRAY_INDEX
            .captures(&self.name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

/// Interprets an enabled-row cell: blank disables the column, `true`/`false`
/// (any case) are taken literally and any other text enables it.
pub fn parse_enabled_cell(cell: &str) -> bool {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        false
    } else if trimmed.eq_ignore_ascii_case("true") {
        true
    } else if trimmed.eq_ignore_ascii_case("false") {
        false
    } else {
        true
    }
}

/// Extracts one descriptor per column of `sheet` using the header rows named
/// by `layout`. Header rows missing from the sheet read as blank.
pub fn extract_fields(sheet: &Grid, layout: &HeaderLayout) -> Vec<FieldDescriptor> {
    let names = sheet.slice(layout.name_row, layout.name_row as isize + 1);
    let types = sheet.slice(layout.type_row, layout.type_row as isize + 1);
    let enabled = layout
        .enabled_row
        .map(|row| sheet.slice(row, row as isize + 1));

    (0..sheet.column_count())
        .map(|col| {
            let name = names.cell(0, col).trim();
            if name.is_empty() {
                return FieldDescriptor::invalid(col);
            }
            let mut field = FieldDescriptor::new(col, name, types.cell(0, col));
            if let Some(enabled) = &enabled {
                field.is_valid &= parse_enabled_cell(enabled.cell(0, col));
            }
            field
        })
        .collect()
}

/// Valid fields with the first occurrence of every base name, in column order.
pub fn unique_fields(fields: &[FieldDescriptor]) -> Vec<&FieldDescriptor> {
    let mut seen = HashSet::new();
    fields
        .iter()
        .filter(|f| f.is_valid)
        .filter(|f| seen.insert(f.base_name.as_str()))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyColumns {
    pub indexes: Vec<usize>,
    pub missing: Vec<String>,
}

/// Locates the columns named by `keys`, in key order.
pub fn find_key_columns(fields: &[FieldDescriptor], keys: &[String]) -> KeyColumns {
    let mut found = KeyColumns::default();
    for key in keys.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
        let before = found.indexes.len();
        found.indexes.extend(
            fields
                .iter()
                .filter(|f| f.is_valid && f.name == key)
                .map(|f| f.column),
        );
        if found.indexes.len() == before {
            found.missing.push(key.to_string());
        }
    }
    found
}
