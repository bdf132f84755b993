//! Per-setting orchestration: read the sheet, apply the header layout, then
//! generate code or convert rows into records.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use encoding_rs::Encoding;
use log::{error, info};

use crate::{
    codegen::{self, GeneratedSource},
    coerce::Coercer,
    error::ConvertError,
    grid::Grid,
    io_utils,
    registry::{TableType, TypeRegistry},
    report::ConversionReport,
    resolver::AssetResolver,
    schema::{FieldDescriptor, extract_fields},
    settings::{ConversionSetting, LoadedSettings},
    store::{MemoryStore, RecordStore},
    synth::SheetOrigin,
    table,
    upsert::{ProgressSink, UpsertEngine},
};

/// How sheets are read.
#[derive(Debug, Clone, Copy)]
pub struct SheetOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for SheetOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: encoding_rs::UTF_8,
        }
    }
}

/// A sheet after layout preparation.
#[derive(Debug, Clone)]
pub struct PreparedSheet {
    pub fields: Vec<FieldDescriptor>,
    /// Content rows, starting at the layout's content row.
    pub content: Grid,
    pub origin: SheetOrigin,
}

pub fn read_sheet(
    settings: &LoadedSettings,
    setting: &ConversionSetting,
    options: SheetOptions,
) -> Result<Grid> {
    let path = settings.resolve(&setting.csv_file_path);
    let delimiter = io_utils::resolve_input_delimiter(&path, options.delimiter);
    info!(
        "Reading '{}' with delimiter '{}'",
        path.display(),
        crate::printable_delimiter(delimiter)
    );
    io_utils::read_grid_from_path(&path, delimiter, options.encoding)
}

pub fn prepare_sheet(
    settings: &LoadedSettings,
    setting: &ConversionSetting,
    options: SheetOptions,
) -> Result<PreparedSheet> {
    let layout = &settings.file.layout;
    let grid = read_sheet(settings, setting, options)?;
    let prepared = layout.prepare(grid, layout.content_start_row)?;
    let fields = extract_fields(&prepared, layout);
    let content = prepared.slice(layout.content_start_row, Grid::END);
    Ok(PreparedSheet {
        fields,
        content,
        origin: SheetOrigin {
            first_line: layout.content_start_row + 1,
            first_column: layout.table_start_column + 1,
        },
    })
}

fn write_source(path: PathBuf, generated: &GeneratedSource) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Creating directory {parent:?}"))?;
    }
    fs::write(&path, &generated.source).with_context(|| format!("Writing {path:?}"))?;
    info!("Wrote {} to {path:?}", generated.type_name);
    Ok(path)
}

/// Generates the code a setting asks for and registers the emitted types.
/// Returns the written source files.
pub fn generate(
    settings: &LoadedSettings,
    setting: &ConversionSetting,
    registry: &mut TypeRegistry,
    options: SheetOptions,
) -> Result<Vec<PathBuf>> {
    if !setting.can_generate_code() {
        info!("{}: nothing to generate", setting.display_name());
        return Ok(Vec::new());
    }
    let layout = &settings.file.layout;
    let destination = settings.resolve(&setting.destination);

    if setting.is_enum {
        let grid = read_sheet(settings, setting, options)?;
        let sheet = layout.prepare(grid, layout.enum_content_start_row)?;
        let generated = codegen::generate_enum(&setting.class_name, &sheet, layout, registry)?;
        return Ok(vec![write_source(settings.main_output_path(setting), &generated)?]);
    }

    let sheet = prepare_sheet(settings, setting, options)?;
    let mut written = Vec::new();
    if setting.class_generate {
        let generated = codegen::generate_record(&setting.class_name, &sheet.fields, registry)?;
        written.push(write_source(
            destination.join(format!("{}.rs", generated.type_name)),
            &generated,
        )?);
    }
    if setting.table_class_generate {
        let generated = codegen::generate_table(setting, &sheet.fields, registry)?;
        written.push(write_source(
            destination.join(format!("{}.rs", generated.type_name)),
            &generated,
        )?);
    }
    Ok(written)
}

/// Everything a conversion run needs besides the setting itself.
pub struct ConvertContext<'a> {
    pub settings: &'a LoadedSettings,
    pub registry: &'a TypeRegistry,
    pub resolver: &'a dyn AssetResolver,
    pub store: &'a mut dyn RecordStore,
    pub progress: &'a mut dyn ProgressSink,
    pub options: SheetOptions,
}

/// Converts the rows of one sheet into records (and its table, when the
/// setting asks for one). Enum settings produce no records and yield `None`.
pub fn convert(ctx: &mut ConvertContext<'_>, setting: &ConversionSetting) -> Result<Option<ConversionReport>> {
    if !setting.can_create_records() {
        info!("{}: enum sheets produce no records", setting.class_name);
        return Ok(None);
    }
    let record_type = ctx
        .registry
        .record(&setting.class_name)
        .map_err(ConvertError::from_record_lookup)?;
    let table_type = if setting.table_generate {
        let table_name = setting.table_class_name();
        let table_type = ctx
            .registry
            .table(&table_name)
            .map_err(|_| ConvertError::TableTypeNotFound { name: table_name })?;
        if table_type.dictionary && table_type.keys.len() != 1 {
            return Err(ConvertError::DictionaryKeyCount {
                table: table_type.name.clone(),
                found: table_type.keys.len(),
            }
            .into());
        }
        Some(table_type)
    } else {
        None
    };

    let mut sheet = prepare_sheet(ctx.settings, setting, ctx.options)?;
    let destination = ctx.settings.resolve(&setting.destination);
    let interval = ctx.settings.file.layout.progress_interval;
    let coercer = Coercer::new(ctx.registry, ctx.resolver);

    let engine = match table_type {
        Some(table_type) => UpsertEngine::setup_table(
            record_type,
            table_type,
            destination,
            &setting.keys,
            setting.table_name(),
            setting.only_table_create,
            &mut *ctx.store,
        )?,
        None => UpsertEngine::setup(record_type, destination, &setting.keys, &mut *ctx.store),
    };
    engine
        .with_progress_interval(interval)
        .run(
            &coercer,
            &mut sheet.fields,
            &sheet.content,
            sheet.origin,
            &mut *ctx.progress,
        )
        .map(Some)
}

/// Synthesizes the rows of a sheet in memory and renders them as a text
/// table. Nothing is written.
pub fn preview(
    settings: &LoadedSettings,
    setting: &ConversionSetting,
    registry: &TypeRegistry,
    resolver: &dyn AssetResolver,
    progress: &mut dyn ProgressSink,
    options: SheetOptions,
) -> Result<String> {
    if !setting.can_create_records() {
        bail!("{}: enum sheets have no records to preview", setting.class_name);
    }
    let record_type = registry
        .record(&setting.class_name)
        .map_err(ConvertError::from_record_lookup)?;
    let mut sheet = prepare_sheet(settings, setting, options)?;
    let coercer = Coercer::new(registry, resolver);
    let scratch = TableType {
        name: setting.table_class_name(),
        row_type: record_type.name.clone(),
        keys: setting.keys.clone(),
        dictionary: false,
    };
    let mut store = MemoryStore::default();
    let report = UpsertEngine::setup_table(
        record_type,
        &scratch,
        PathBuf::new(),
        &setting.keys,
        setting.table_name(),
        true,
        &mut store,
    )?
    .run(&coercer, &mut sheet.fields, &sheet.content, sheet.origin, progress)?;
    let rows = report.table.as_ref().map(|t| t.rows()).unwrap_or_default();
    Ok(table::render_records(record_type, rows))
}

pub fn inspect(
    settings: &LoadedSettings,
    setting: &ConversionSetting,
    options: SheetOptions,
) -> Result<String> {
    let sheet = prepare_sheet(settings, setting, options)?;
    Ok(table::render_fields(&sheet.fields))
}

/// Settings selected by an optional name filter, in file order.
pub fn select<'a>(settings: &'a LoadedSettings, filter: Option<&str>) -> Vec<&'a ConversionSetting> {
    settings
        .file
        .settings
        .iter()
        .filter(|s| filter.is_none_or(|f| s.matches_filter(f)))
        .collect()
}

/// Runs `action` for every selected setting. A failing setting is logged and
/// the batch moves on; the batch fails at the end if any setting failed.
pub fn run_batch<T>(
    selected: &[&ConversionSetting],
    mut action: impl FnMut(&ConversionSetting) -> Result<T>,
) -> Result<Vec<T>> {
    let mut results = Vec::with_capacity(selected.len());
    let mut failures = 0usize;
    for setting in selected {
        match action(setting) {
            Ok(result) => results.push(result),
            Err(err) => {
                failures += 1;
                error!("{}: {err:#}", setting.display_name());
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} setting(s) failed", selected.len());
    }
    Ok(results)
}
