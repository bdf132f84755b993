use thiserror::Error;

use crate::registry::RegistryError;

/// Conditions that abort a conversion run before any row is processed.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Record type '{name}' is not registered; generate its code first")]
    RecordTypeNotFound { name: String },
    #[error("Record type '{name}' is ambiguous: {}", candidates.join(", "))]
    AmbiguousRecordType {
        name: String,
        candidates: Vec<String>,
    },
    #[error("Table type '{name}' is not registered; generate its code first")]
    TableTypeNotFound { name: String },
    #[error("End marker column {column} is outside the sheet ({columns} column(s))")]
    InvalidEndMarker { column: usize, columns: usize },
    #[error("Dictionary table '{table}' needs exactly one key, found {found}")]
    DictionaryKeyCount { table: String, found: usize },
}

impl ConvertError {
    pub fn from_record_lookup(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { name, .. } => ConvertError::RecordTypeNotFound { name },
            RegistryError::Ambiguous {
                name, candidates, ..
            } => ConvertError::AmbiguousRecordType { name, candidates },
        }
    }
}
