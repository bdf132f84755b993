//! Plain-text tables for `--preview` and `inspect` output.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{record::Record, registry::RecordType, schema::FieldDescriptor};

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h).max(1)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let rule = rule_widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// One line per record: identity first, then every member of `record_type`
/// in declaration order. Unset members render blank.
pub fn render_records(record_type: &RecordType, records: &[Record]) -> String {
    let mut headers = vec!["identity".to_string()];
    headers.extend(record_type.members.iter().map(|m| m.name.clone()));
    let rows = records
        .iter()
        .map(|record| {
            let mut row = vec![record.identity.clone()];
            row.extend(record_type.members.iter().map(|member| {
                record
                    .get(&member.name)
                    .map(|value| value.as_display())
                    .unwrap_or_default()
            }));
            row
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

pub fn render_fields(fields: &[FieldDescriptor]) -> String {
    let headers = ["column", "name", "type", "valid", "array", "base"]
        .map(String::from)
        .to_vec();
    let rows = fields
        .iter()
        .map(|f| {
            vec![
                f.column.to_string(),
                f.name.clone(),
                f.declared_type.clone(),
                f.is_valid.to_string(),
                f.is_array_field.to_string(),
                f.base_name.clone(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let sanitized = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&sanitized));
            format!("{sanitized}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
