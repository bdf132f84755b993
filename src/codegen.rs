//! Rust source emission for record, table and enum types.
//!
//! Every generator also registers the type it emits in the [`TypeRegistry`],
//! which is how a later `convert` run learns about it.

use std::fmt::Write as _;

use anyhow::{Result, bail};
use heck::{ToSnakeCase, ToUpperCamelCase};
use log::{info, warn};

use crate::{
    error::ConvertError,
    grid::Grid,
    registry::{EnumMember, EnumType, FieldType, MemberDef, RecordType, TableType, TypeRegistry},
    schema::{FieldDescriptor, unique_fields},
    settings::{ConversionSetting, HeaderLayout},
};

pub const ENUM_ID_COLUMN: &str = "ID";
pub const ENUM_VALUE_COLUMN: &str = "VALUE";
const ROWS_FIELD: &str = "rows";
const HEADER: &str = "// Generated by csv-converter. Do not edit by hand.\n";

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where",
    "while", "yield",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    pub type_name: String,
    pub source: String,
}

/// Bare type identifier for a possibly `::`-qualified name.
pub fn type_ident(name: &str) -> String {
    name.rsplit("::")
        .next()
        .unwrap_or(name)
        .to_upper_camel_case()
}

pub fn field_ident(name: &str) -> String {
    let snake = name.to_snake_case();
    if KEYWORDS.contains(&snake.as_str()) {
        format!("r#{snake}")
    } else if snake.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{snake}")
    } else {
        snake
    }
}

/// Enum variant identifier for a member name, or `None` when nothing of the
/// name survives case conversion.
pub fn variant_ident(name: &str) -> Option<String> {
    let camel = name.to_upper_camel_case();
    if camel.is_empty() {
        None
    } else if camel == "Self" {
        Some("Self_".to_string())
    } else if camel.starts_with(|c: char| c.is_ascii_digit()) {
        Some(format!("_{camel}"))
    } else {
        Some(camel)
    }
}

/// Rust spelling of a member type, or `None` when the token is unsupported.
pub fn rust_type(ty: &FieldType) -> Option<String> {
    let spelled = match ty {
        FieldType::Int => "i32".to_string(),
        FieldType::Long => "i64".to_string(),
        FieldType::Float => "f32".to_string(),
        FieldType::Double => "f64".to_string(),
        FieldType::Bool => "bool".to_string(),
        FieldType::String => "String".to_string(),
        FieldType::Vector2 => "[f32; 2]".to_string(),
        FieldType::Vector3 => "[f32; 3]".to_string(),
        FieldType::Enum(name) => type_ident(name),
        FieldType::Reference(_) => "Option<AssetHandle>".to_string(),
        FieldType::Array(inner) => format!("Vec<{}>", rust_type(inner)?),
        FieldType::Unsupported(_) => return None,
    };
    Some(spelled)
}

fn uses_asset_handle(ty: &FieldType) -> bool {
    match ty {
        FieldType::Reference(_) => true,
        FieldType::Array(inner) => uses_asset_handle(inner),
        _ => false,
    }
}

fn member_type_token(field: &FieldDescriptor) -> String {
    if field.is_array_field && !field.declared_type.ends_with("[]") {
        format!("{}[]", field.declared_type)
    } else {
        field.declared_type.clone()
    }
}

struct EmittedField {
    member: String,
    ident: String,
    ty: FieldType,
    rust: String,
}

fn emitted_fields(class_name: &str, fields: &[FieldDescriptor], registry: &TypeRegistry) -> Vec<EmittedField> {
    unique_fields(fields)
        .into_iter()
        .filter_map(|field| {
            let token = member_type_token(field);
            let ty = registry.field_type(&token);
            match rust_type(&ty) {
                Some(rust) => Some(EmittedField {
                    member: field.base_name.clone(),
                    ident: field_ident(&field.base_name),
                    ty,
                    rust,
                }),
                None => {
                    warn!(
                        "{class_name}: field '{}' has unsupported type '{token}', skipped",
                        field.name
                    );
                    None
                }
            }
        })
        .collect()
}

/// Emits the record struct for a sheet and registers its members.
pub fn generate_record(
    class_name: &str,
    fields: &[FieldDescriptor],
    registry: &mut TypeRegistry,
) -> Result<GeneratedSource> {
    let ident = type_ident(class_name);
    if ident.is_empty() {
        bail!("Class name '{class_name}' does not form a Rust identifier");
    }
    let emitted = emitted_fields(class_name, fields, registry);

    let mut source = String::from(HEADER);
    source.push_str("use serde::{Deserialize, Serialize};\n");
    if emitted.iter().any(|f| uses_asset_handle(&f.ty)) {
        source.push_str("use csv_converter::data::AssetHandle;\n");
    }
    source.push('\n');
    let _ = writeln!(
        source,
        "#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]\npub struct {ident} {{"
    );
    for field in &emitted {
        if field.ident.trim_start_matches("r#") != field.member {
            let _ = writeln!(source, "    #[serde(rename = \"{}\")]", field.member);
        }
        let _ = writeln!(source, "    pub {}: {},", field.ident, field.rust);
    }
    source.push_str("}\n");

    registry.register_record(RecordType {
        name: class_name.to_string(),
        members: emitted
            .iter()
            .map(|f| MemberDef {
                name: f.member.clone(),
                type_name: f.ty.to_string(),
            })
            .collect(),
    });
    info!("Generated record type {class_name} with {} field(s)", emitted.len());
    Ok(GeneratedSource {
        type_name: ident,
        source,
    })
}

/// Emits the table holder for a sheet: a dictionary keyed by the single key,
/// a list with a `find` accessor over the keys, or a plain list when the sheet
/// has no usable keys.
pub fn generate_table(
    setting: &ConversionSetting,
    fields: &[FieldDescriptor],
    registry: &mut TypeRegistry,
) -> Result<GeneratedSource> {
    let row_ident = type_ident(&setting.class_name);
    let table_name = setting.table_class_name();
    let table_ident = type_ident(&table_name);
    let emitted = emitted_fields(&setting.class_name, fields, registry);

    let mut keys = Vec::new();
    for key in setting.keys.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
        match emitted.iter().find(|f| f.member == key) {
            Some(field) => keys.push(field),
            None => warn!("{table_name}: key '{key}' is not a field of {}", setting.class_name),
        }
    }

    let mut source = String::from(HEADER);
    if setting.is_dictionary {
        if keys.len() != 1 {
            return Err(ConvertError::DictionaryKeyCount {
                table: table_name,
                found: keys.len(),
            }
            .into());
        }
        let key = keys[0];
        if matches!(
            key.ty,
            FieldType::Float | FieldType::Double | FieldType::Vector2 | FieldType::Vector3 | FieldType::Array(_)
        ) {
            bail!(
                "{table_name}: key '{}' of type {} cannot index a dictionary",
                key.member,
                key.ty
            );
        }
        source.push_str("use std::collections::HashMap;\n\nuse serde::{Deserialize, Serialize};\n\n");
        let _ = writeln!(
            source,
            "#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]\n\
             pub struct {table_ident} {{\n    pub {ROWS_FIELD}: Vec<{row_ident}>,\n    \
             #[serde(skip)]\n    index: HashMap<{}, usize>,\n}}\n",
            key.rust
        );
        let _ = writeln!(
            source,
            "impl {table_ident} {{\n    \
             pub fn build_index(&mut self) {{\n        \
             self.index = self\n            .{ROWS_FIELD}\n            .iter()\n            \
             .enumerate()\n            .map(|(i, row)| (row.{ident}.clone(), i))\n            \
             .collect();\n    }}\n\n    \
             pub fn get(&self, {ident}: &{ty}) -> Option<&{row_ident}> {{\n        \
             self.index.get({ident}).map(|&i| &self.{ROWS_FIELD}[i])\n    }}\n}}",
            ident = key.ident,
            ty = key.rust,
        );
    } else {
        source.push_str("use serde::{Deserialize, Serialize};\n\n");
        let _ = writeln!(
            source,
            "#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]\n\
             pub struct {table_ident} {{\n    pub {ROWS_FIELD}: Vec<{row_ident}>,\n}}"
        );
        if !keys.is_empty() {
            let params = keys
                .iter()
                .map(|k| {
                    if k.ty == FieldType::String {
                        format!("{}: &str", k.ident)
                    } else {
                        format!("{}: &{}", k.ident, k.rust)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            let predicate = keys
                .iter()
                .map(|k| {
                    if k.ty == FieldType::String {
                        format!("row.{0} == {0}", k.ident)
                    } else {
                        format!("row.{0} == *{0}", k.ident)
                    }
                })
                .collect::<Vec<_>>()
                .join(" && ");
            let _ = writeln!(
                source,
                "\nimpl {table_ident} {{\n    \
                 pub fn find(&self, {params}) -> Option<&{row_ident}> {{\n        \
                 self.{ROWS_FIELD}.iter().find(|row| {predicate})\n    }}\n}}"
            );
        }
    }

    registry.register_table(TableType {
        name: table_name.clone(),
        row_type: setting.class_name.clone(),
        keys: keys.iter().map(|k| k.member.clone()).collect(),
        dictionary: setting.is_dictionary,
    });
    info!("Generated table type {table_name} over {}", setting.class_name);
    Ok(GeneratedSource {
        type_name: table_ident,
        source,
    })
}

/// Emits an enum from a sheet with `ID` and `VALUE` columns. Rows start at
/// `layout.enum_content_start_row`. Rows whose value is not an integer are
/// skipped, as are members repeating an earlier variant or value.
pub fn generate_enum(
    enum_name: &str,
    sheet: &Grid,
    layout: &HeaderLayout,
    registry: &mut TypeRegistry,
) -> Result<GeneratedSource> {
    let ident = type_ident(enum_name);
    let column_of = |wanted: &str| {
        (0..sheet.column_count()).find(|&col| sheet.cell(layout.name_row, col).trim() == wanted)
    };
    let (Some(id_col), Some(value_col)) = (column_of(ENUM_ID_COLUMN), column_of(ENUM_VALUE_COLUMN)) else {
        bail!("{enum_name}: enum sheet needs '{ENUM_ID_COLUMN}' and '{ENUM_VALUE_COLUMN}' columns");
    };

    let mut members: Vec<EnumMember> = Vec::new();
    let mut variants: Vec<String> = Vec::new();
    for row in layout.enum_content_start_row..sheet.row_count() {
        let id = sheet.cell(row, id_col).trim();
        if id.is_empty() {
            continue;
        }
        let raw = sheet.cell(row, value_col).trim();
        let Ok(value) = raw.parse::<i64>() else {
            warn!("{enum_name} line {}: value '{raw}' of '{id}' is not an integer, skipped", row + 1);
            continue;
        };
        if members.iter().any(|m| m.name == id) {
            warn!("{enum_name} line {}: duplicate member '{id}', skipped", row + 1);
            continue;
        }
        let Some(variant) = variant_ident(id) else {
            warn!("{enum_name} line {}: member '{id}' has no valid identifier, skipped", row + 1);
            continue;
        };
        if variants.contains(&variant) {
            warn!("{enum_name} line {}: member '{id}' collides with variant {variant}, skipped", row + 1);
            continue;
        }
        if let Some(taken) = members.iter().find(|m| m.value == value) {
            warn!(
                "{enum_name} line {}: value {value} of '{id}' is already used by '{}', skipped",
                row + 1,
                taken.name
            );
            continue;
        }
        variants.push(variant);
        members.push(EnumMember {
            name: id.to_string(),
            value,
        });
    }

    let mut source = String::from(HEADER);
    source.push_str("use serde::{Deserialize, Serialize};\n\n");
    let default = if members.is_empty() { "" } else { "Default, " };
    let _ = writeln!(
        source,
        "#[derive(Debug, Clone, Copy, {default}PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]\n\
         pub enum {ident} {{"
    );
    for (i, (member, variant)) in members.iter().zip(&variants).enumerate() {
        if i == 0 {
            source.push_str("    #[default]\n");
        }
        if *variant != member.name {
            let _ = writeln!(source, "    #[serde(rename = \"{}\")]", member.name);
        }
        let _ = writeln!(source, "    {variant} = {},", member.value);
    }
    source.push_str("}\n");

    info!("Generated enum {enum_name} with {} member(s)", members.len());
    registry.register_enum(EnumType {
        name: enum_name.to_string(),
        members,
    });
    Ok(GeneratedSource {
        type_name: ident,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::extract_fields;

    fn fields(rows: Vec<Vec<&str>>) -> Vec<FieldDescriptor> {
        extract_fields(&Grid::from_rows_padded(rows), &HeaderLayout::default())
    }

    fn setting(keys: &[&str], dictionary: bool) -> ConversionSetting {
        ConversionSetting {
            class_name: "Item".into(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            is_dictionary: dictionary,
            ..Default::default()
        }
    }

    #[test]
    fn record_struct_maps_types_and_registers_members() {
        let mut registry = TypeRegistry::default();
        let sheet = fields(vec![
            vec!["id", "Display Name", "tags[0]", "tags[1]", "pos", "type", "odd"],
            vec!["int", "string", "string", "string", "Vector3", "long", "Matrix"],
        ]);
        let generated = generate_record("game::Item", &sheet, &mut registry).expect("generate");
        assert_eq!(generated.type_name, "Item");
        assert!(generated.source.contains("pub struct Item {"));
        assert!(generated.source.contains("    pub id: i32,"));
        assert!(generated.source.contains("    #[serde(rename = \"Display Name\")]\n    pub display_name: String,"));
        assert!(generated.source.contains("    pub tags: Vec<String>,"));
        assert!(generated.source.contains("    pub pos: [f32; 3],"));
        assert!(generated.source.contains("    pub r#type: i64,"));
        assert!(!generated.source.contains("odd"));

        let record = registry.record("Item").expect("registered");
        let tags = record.member("tags").expect("tags member");
        assert_eq!(tags.type_name, "string[]");
        assert_eq!(record.members.len(), 5);
    }

    #[test]
    fn list_table_gets_find_over_keys() {
        let mut registry = TypeRegistry::default();
        let sheet = fields(vec![vec!["id", "kind", "hp"], vec!["int", "string", "int"]]);
        let generated = generate_table(&setting(&["id", "kind"], false), &sheet, &mut registry)
            .expect("generate");
        assert!(generated.source.contains("pub struct ItemTable {"));
        assert!(generated.source.contains("pub fn find(&self, id: &i32, kind: &str) -> Option<&Item>"));
        assert!(generated.source.contains("row.id == *id && row.kind == kind"));
        let table = registry.table("ItemTable").expect("registered");
        assert_eq!(table.keys, vec!["id", "kind"]);
        assert!(!table.dictionary);
    }

    #[test]
    fn table_without_keys_is_a_plain_list() {
        let mut registry = TypeRegistry::default();
        let sheet = fields(vec![vec!["hp"], vec!["int"]]);
        let generated = generate_table(&setting(&[], false), &sheet, &mut registry).expect("generate");
        assert!(generated.source.contains("pub rows: Vec<Item>,"));
        assert!(!generated.source.contains("fn find"));
    }

    #[test]
    fn dictionary_table_requires_exactly_one_key() {
        let mut registry = TypeRegistry::default();
        let sheet = fields(vec![vec!["id", "kind"], vec!["int", "string"]]);
        let err = generate_table(&setting(&["id", "kind"], true), &sheet, &mut registry)
            .expect_err("two keys");
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::DictionaryKeyCount { found: 2, .. })
        ));

        let generated = generate_table(&setting(&["id"], true), &sheet, &mut registry).expect("one key");
        assert!(generated.source.contains("index: HashMap<i32, usize>,"));
        assert!(generated.source.contains("pub fn get(&self, id: &i32) -> Option<&Item>"));
        assert!(registry.table("ItemTable").expect("registered").dictionary);
    }

    #[test]
    fn enum_skips_non_integer_values() {
        let mut registry = TypeRegistry::default();
        let sheet = Grid::from_rows_padded(vec![
            vec!["ID", "VALUE", "note"],
            vec!["Common", "0", ""],
            vec!["rare", "x", ""],
            vec!["Epic", "5", ""],
        ]);
        let generated =
            generate_enum("Rarity", &sheet, &HeaderLayout::default(), &mut registry).expect("generate");
        assert!(generated.source.contains("    #[default]\n    Common = 0,"));
        assert!(generated.source.contains("    Epic = 5,"));
        assert!(!generated.source.contains("Rare"));
        let rarity = registry.enum_type("Rarity").expect("registered");
        assert_eq!(rarity.members.len(), 2);
        assert_eq!(rarity.member("Epic").map(|m| m.value), Some(5));
    }

    #[test]
    fn enum_variants_are_valid_and_unique_identifiers() {
        let mut registry = TypeRegistry::default();
        let sheet = Grid::from_rows_padded(vec![
            vec!["ID", "VALUE"],
            vec!["fire_ball", "1"],
            vec!["FireBall", "2"],
            vec!["1st", "3"],
            vec!["self", "4"],
            vec!["__", "5"],
            vec!["Ice", "1"],
        ]);
        let generated =
            generate_enum("Spell", &sheet, &HeaderLayout::default(), &mut registry).expect("generate");
        assert!(generated
            .source
            .contains("    #[serde(rename = \"fire_ball\")]\n    FireBall = 1,"));
        assert!(!generated.source.contains("= 2,"));
        assert!(generated.source.contains("    #[serde(rename = \"1st\")]\n    _1st = 3,"));
        assert!(generated.source.contains("    #[serde(rename = \"self\")]\n    Self_ = 4,"));
        assert!(!generated.source.contains("Ice"));
        let names = registry
            .enum_type("Spell")
            .expect("registered")
            .members
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["fire_ball", "1st", "self"]);
    }

    #[test]
    fn enum_sheet_without_id_column_fails() {
        let mut registry = TypeRegistry::default();
        let sheet = Grid::from_rows_padded(vec![vec!["NAME", "VALUE"], vec!["A", "1"]]);
        assert!(generate_enum("Broken", &sheet, &HeaderLayout::default(), &mut registry).is_err());
        assert!(registry.enums.is_empty());
    }
}
