use std::fmt;

use log::{error, warn};
use serde::Serialize;

use crate::record::TableCollection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One recoverable problem, located precisely enough to fix the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub type_name: String,
    /// 1-based line in the CSV file.
    pub line: Option<usize>,
    /// 1-based column in the CSV file.
    pub column: Option<usize>,
    pub field: Option<String>,
    pub raw: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name)?;
        if let Some(line) = self.line {
            write!(f, " line {line}")?;
        }
        if let Some(column) = self.column {
            write!(f, " column {column}")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(field) = &self.field {
            write!(f, ": {field}=\"{}\"", self.raw.as_deref().unwrap_or(""))?;
        }
        Ok(())
    }
}

/// Diagnostics of one run. Every entry is logged as it is recorded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => warn!("{diagnostic}"),
            Severity::Error => error!("{diagnostic}"),
        }
        self.entries.push(diagnostic);
    }

    pub fn warn(&mut self, type_name: &str, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Warning,
            type_name: type_name.to_string(),
            line: None,
            column: None,
            field: None,
            raw: None,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

/// Outcome of one conversion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionReport {
    pub type_name: String,
    /// Rows that produced a record.
    pub rows: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub cancelled: bool,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip)]
    pub table: Option<TableCollection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_names_every_coordinate() {
        let diagnostic = Diagnostic {
            severity: Severity::Warning,
            type_name: "Item".into(),
            line: Some(4),
            column: Some(2),
            field: Some("hp".into()),
            raw: Some("abc".into()),
            message: "conversion failed".into(),
        };
        assert_eq!(
            diagnostic.to_string(),
            "Item line 4 column 2: conversion failed: hp=\"abc\""
        );
    }
}
