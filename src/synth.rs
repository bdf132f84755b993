//! Record synthesis: one sheet row to one [`Record`].
//!
//! Each row runs through a fixed sequence: key check (an empty key cell
//! skips the row), identity computation, array pre-pass (every array member
//! starts as an empty array) and population of members in column order.
//! Cell failures are recorded as diagnostics and never abort the row.

use log::debug;

use crate::{
    coerce::Coercer,
    data::Value,
    grid::Grid,
    record::Record,
    registry::{FieldType, RecordType},
    report::{Diagnostic, Diagnostics, Severity},
    schema::FieldDescriptor,
};

/// A valid sheet column bound to a member of the target record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub column: usize,
    pub field_name: String,
    pub member: String,
    /// Type each cell of this column coerces to; the element type for array
    /// columns.
    pub ty: FieldType,
    pub element: bool,
}

/// Column-to-member map built once per run.
#[derive(Debug, Clone, Default)]
pub struct FieldBindings {
    bindings: Vec<FieldBinding>,
    array_members: Vec<String>,
}

impl FieldBindings {
    /// Binds every valid field to a member of `record_type`. Fields without a
    /// matching member are marked invalid and reported.
    pub fn bind(
        record_type: &RecordType,
        coercer: &Coercer<'_>,
        fields: &mut [FieldDescriptor],
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let mut bound = FieldBindings::default();
        for field in fields.iter_mut().filter(|f| f.is_valid) {
            let Some(member) = record_type.member(&field.base_name) else {
                field.is_valid = false;
                diagnostics.warn(
                    &record_type.name,
                    format!("field '{}' has no member in {}, skipped", field.name, record_type.name),
                );
                continue;
            };
            let member_type = coercer.registry().field_type(&member.type_name);
            let ty = if field.is_array_field {
                match member_type.element_type() {
                    Some(element) => element.clone(),
                    None => {
                        field.is_valid = false;
                        diagnostics.warn(
                            &record_type.name,
                            format!(
                                "array column '{}' maps to non-array member {} ({member_type}), skipped",
                                field.name, member.name
                            ),
                        );
                        continue;
                    }
                }
            } else {
                member_type
            };
            if field.declared_type != member.type_name && !field.is_array_field {
                debug!(
                    "{}: column '{}' declares '{}' but member is '{}'",
                    record_type.name, field.name, field.declared_type, member.type_name
                );
            }
            if field.is_array_field && !bound.array_members.contains(&member.name) {
                bound.array_members.push(member.name.clone());
            }
            bound.bindings.push(FieldBinding {
                column: field.column,
                field_name: field.name.clone(),
                member: member.name.clone(),
                ty,
                element: field.is_array_field,
            });
        }
        bound
    }

    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    pub fn array_members(&self) -> &[String] {
        &self.array_members
    }
}

/// Where the content grid sits inside the CSV file, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetOrigin {
    /// 1-based line of content row 0.
    pub first_line: usize,
    /// 1-based column of content column 0.
    pub first_column: usize,
}

impl Default for SheetOrigin {
    fn default() -> Self {
        Self {
            first_line: 1,
            first_column: 1,
        }
    }
}

/// Key cells become part of a file name, so they may not carry separators.
fn is_plain_key(cell: &str) -> bool {
    !cell.contains(['/', '\\', '\0']) && cell != "." && cell != ".."
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIdentity {
    pub identity: String,
    pub key: Vec<String>,
}

pub struct RecordSynthesizer<'a> {
    type_name: String,
    identity_prefix: String,
    bindings: &'a FieldBindings,
    key_columns: &'a [usize],
    coercer: &'a Coercer<'a>,
    origin: SheetOrigin,
}

impl<'a> RecordSynthesizer<'a> {
    pub fn new(
        record_type: &RecordType,
        bindings: &'a FieldBindings,
        key_columns: &'a [usize],
        coercer: &'a Coercer<'a>,
        origin: SheetOrigin,
    ) -> Self {
        let identity_prefix = record_type
            .name
            .rsplit("::")
            .next()
            .unwrap_or(&record_type.name)
            .to_string();
        Self {
            type_name: record_type.name.clone(),
            identity_prefix,
            bindings,
            key_columns,
            coercer,
            origin,
        }
    }

    pub fn line_of(&self, row: usize) -> usize {
        self.origin.first_line + row
    }

    /// Computes the identity of `row`, or `None` when a key cell is empty or
    /// could not name a file inside the destination.
    pub fn row_identity(&self, content: &Grid, row: usize, diagnostics: &mut Diagnostics) -> Option<RowIdentity> {
        if self.key_columns.is_empty() {
            return Some(RowIdentity {
                identity: format!("{}{row}", self.identity_prefix),
                key: Vec::new(),
            });
        }
        let mut key = Vec::with_capacity(self.key_columns.len());
        for &column in self.key_columns {
            let cell = content.cell(row, column).trim();
            if cell.is_empty() {
                diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    type_name: self.type_name.clone(),
                    line: Some(self.line_of(row)),
                    column: Some(self.origin.first_column + column),
                    field: None,
                    raw: None,
                    message: "row without key skipped".to_string(),
                });
                return None;
            }
            if !is_plain_key(cell) {
                diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    type_name: self.type_name.clone(),
                    line: Some(self.line_of(row)),
                    column: Some(self.origin.first_column + column),
                    field: None,
                    raw: Some(cell.to_string()),
                    message: "row with path characters in its key skipped".to_string(),
                });
                return None;
            }
            key.push(cell.to_string());
        }
        Some(RowIdentity {
            identity: format!("{}_{}", self.identity_prefix, key.join("_")),
            key,
        })
    }

    /// Writes the member values of `row` into `record`. Members not bound to
    /// any column are left untouched.
    pub fn populate(&self, content: &Grid, row: usize, record: &mut Record, diagnostics: &mut Diagnostics) {
        for member in self.bindings.array_members() {
            record.set(member.clone(), Value::Array(Vec::new()));
        }

        for binding in self.bindings.bindings() {
            let raw = content.cell(row, binding.column);
            let text = if binding.ty.is_string() {
                format!("\"{raw}\"")
            } else {
                raw.to_string()
            };

            let outcome = if text.trim().is_empty() {
                Err((Severity::Warning, "empty value".to_string()))
            } else {
                self.coercer.convert(&binding.ty, &text).map_err(|err| {
                    let severity = if err.is_missing_reference() {
                        Severity::Error
                    } else {
                        Severity::Warning
                    };
                    (severity, format!("conversion failed ({err})"))
                })
            };

            match outcome {
                Ok(value) if binding.element => record.push_element(&binding.member, value),
                Ok(value) => record.set(binding.member.clone(), value),
                Err((severity, message)) => {
                    diagnostics.push(Diagnostic {
                        severity,
                        type_name: self.type_name.clone(),
                        line: Some(self.line_of(row)),
                        column: Some(self.origin.first_column + binding.column),
                        field: Some(binding.member.clone()),
                        raw: Some(raw.to_string()),
                        message,
                    });
                    if !binding.element {
                        record.unset(&binding.member);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        registry::{MemberDef, ReferenceKind, TypeRegistry},
        resolver::NullResolver,
        schema::extract_fields,
        settings::HeaderLayout,
    };

    fn item_type() -> RecordType {
        RecordType {
            name: "Item".into(),
            members: vec![
                MemberDef {
                    name: "id".into(),
                    type_name: "int".into(),
                },
                MemberDef {
                    name: "name".into(),
                    type_name: "string".into(),
                },
                MemberDef {
                    name: "tags".into(),
                    type_name: "string[]".into(),
                },
            ],
        }
    }

    fn build(synth: &RecordSynthesizer<'_>, content: &Grid, row: usize, diagnostics: &mut Diagnostics) -> Option<Record> {
        let RowIdentity { identity, key } = synth.row_identity(content, row, diagnostics)?;
        let mut record = Record::new("Item", identity, key);
        synth.populate(content, row, &mut record, diagnostics);
        Some(record)
    }

    fn sheet() -> Grid {
        Grid::from_rows_padded(vec![
            vec!["id", "name", "tags[0]", "tags[1]", "extra"],
            vec!["int", "string", "string", "string", "int"],
            vec!["7", "Alice", "a", "b", "1"],
            vec![" ", "Bob", "", "", "2"],
            vec!["9", "", "", "c", "x"],
        ])
    }

    #[test]
    fn rows_become_records_with_arrays_in_column_order() {
        let registry = TypeRegistry::default();
        let coercer = Coercer::new(&registry, &NullResolver);
        let record_type = item_type();
        let grid = sheet();
        let mut fields = extract_fields(&grid, &HeaderLayout::default());
        let mut diagnostics = Diagnostics::default();
        let bindings = FieldBindings::bind(&record_type, &coercer, &mut fields, &mut diagnostics);
        assert!(!fields[4].is_valid, "unknown member is excluded");
        assert_eq!(diagnostics.len(), 1);

        let content = grid.slice(2, Grid::END);
        let keys = vec![0];
        let origin = SheetOrigin {
            first_line: 3,
            first_column: 1,
        };
        let synth = RecordSynthesizer::new(&record_type, &bindings, &keys, &coercer, origin);

        let first = build(&synth, &content, 0, &mut diagnostics).expect("first row should complete");
        assert_eq!(first.identity, "Item_7");
        assert_eq!(first.get("id"), Some(&Value::Integer(7)));
        assert_eq!(first.get("name"), Some(&Value::String("Alice".into())));
        assert_eq!(
            first.get("tags"),
            Some(&Value::Array(vec![
                Value::String("a".into()),
                Value::String("b".into())
            ]))
        );

        assert_eq!(build(&synth, &content, 1, &mut diagnostics), None);

        let third = build(&synth, &content, 2, &mut diagnostics).expect("third row should complete");
        assert_eq!(third.get("name"), Some(&Value::String(String::new())));
        assert_eq!(
            third.get("tags"),
            Some(&Value::Array(vec![Value::String(String::new()), Value::String("c".into())]))
        );
    }

    #[test]
    fn path_keys_skip_and_missing_references_are_errors() {
        let mut registry = TypeRegistry::default();
        registry.register_reference_kind(ReferenceKind {
            name: "Sprite".into(),
            extensions: vec!["png".into()],
        });
        let coercer = Coercer::new(&registry, &NullResolver);
        let record_type = RecordType {
            name: "Item".into(),
            members: vec![
                MemberDef {
                    name: "id".into(),
                    type_name: "string".into(),
                },
                MemberDef {
                    name: "icon".into(),
                    type_name: "Sprite".into(),
                },
            ],
        };
        let grid = Grid::from_rows_padded(vec![
            vec!["id", "icon"],
            vec!["string", "Sprite"],
            vec!["a/b", "x"],
            vec!["..", "x"],
            vec!["sword", "sword.png"],
        ]);
        let mut fields = extract_fields(&grid, &HeaderLayout::default());
        let mut diagnostics = Diagnostics::default();
        let bindings = FieldBindings::bind(&record_type, &coercer, &mut fields, &mut diagnostics);
        let content = grid.slice(2, Grid::END);
        let keys = vec![0];
        let synth = RecordSynthesizer::new(&record_type, &bindings, &keys, &coercer, SheetOrigin::default());

        assert_eq!(synth.row_identity(&content, 0, &mut diagnostics), None);
        assert_eq!(diagnostics.entries()[0].raw.as_deref(), Some("a/b"));
        assert_eq!(synth.row_identity(&content, 1, &mut diagnostics), None);

        let sword = build(&synth, &content, 2, &mut diagnostics).expect("sword");
        assert_eq!(sword.identity, "Item_sword");
        assert_eq!(sword.get("icon"), None);
        let missing = diagnostics.entries().last().expect("missing reference");
        assert_eq!(missing.severity, Severity::Error);
        assert_eq!(missing.field.as_deref(), Some("icon"));
        assert_eq!(diagnostics.len(), 3);
    }

    #[test]
    fn identity_without_keys_uses_row_index() {
        let registry = TypeRegistry::default();
        let coercer = Coercer::new(&registry, &NullResolver);
        let record_type = RecordType {
            name: "game::Item".into(),
            members: item_type().members,
        };
        let bindings = FieldBindings::default();
        let synth = RecordSynthesizer::new(&record_type, &bindings, &[], &coercer, SheetOrigin::default());
        let content = Grid::from_rows_padded(vec![vec!["1"], vec!["2"]]);
        let mut diagnostics = Diagnostics::default();
        let identity = synth.row_identity(&content, 1, &mut diagnostics).unwrap();
        assert_eq!(identity.identity, "Item1");
        assert!(identity.key.is_empty());
    }

    #[test]
    fn failed_scalar_cells_are_unset_on_existing_records() {
        let registry = TypeRegistry::default();
        let coercer = Coercer::new(&registry, &NullResolver);
        let record_type = item_type();
        let grid = Grid::from_rows_padded(vec![
            vec!["id", "name"],
            vec!["int", "string"],
            vec!["oops", "Carol"],
        ]);
        let mut fields = extract_fields(&grid, &HeaderLayout::default());
        let mut diagnostics = Diagnostics::default();
        let bindings = FieldBindings::bind(&record_type, &coercer, &mut fields, &mut diagnostics);
        let content = grid.slice(2, Grid::END);
        let synth = RecordSynthesizer::new(
            &record_type,
            &bindings,
            &[],
            &coercer,
            SheetOrigin {
                first_line: 3,
                first_column: 1,
            },
        );

        let mut existing = Record::new("Item", "Item0", Vec::new());
        existing.set("id", Value::Integer(1));
        existing.set("icon", Value::String("kept".into()));
        synth.populate(&content, 0, &mut existing, &mut diagnostics);

        assert_eq!(existing.get("id"), None);
        assert_eq!(existing.get("name"), Some(&Value::String("Carol".into())));
        assert_eq!(existing.get("icon"), Some(&Value::String("kept".into())));
        let failure = diagnostics.entries().last().unwrap();
        assert_eq!(failure.line, Some(3));
        assert_eq!(failure.column, Some(1));
        assert_eq!(failure.field.as_deref(), Some("id"));
        assert_eq!(failure.raw.as_deref(), Some("oops"));
    }
}
