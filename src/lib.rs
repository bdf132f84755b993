pub mod cli;
pub mod codegen;
pub mod coerce;
pub mod converter;
pub mod data;
pub mod error;
pub mod grid;
pub mod io_utils;
pub mod record;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod schema;
pub mod settings;
pub mod store;
pub mod synth;
pub mod table;
pub mod upsert;
pub mod yaml_provider;

use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, SheetArgs},
    converter::{ConvertContext, SheetOptions},
    registry::TypeRegistry,
    resolver::DirectoryResolver,
    settings::LoadedSettings,
    store::DirectoryStore,
    upsert::LogProgress,
};

pub const DEFAULT_REGISTRY_FILE: &str = "types.yaml";

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_converter", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate(args) => handle_generate(&args),
        Commands::Convert(args) => handle_convert(&args),
        Commands::Inspect(args) => handle_inspect(&args),
    }
}

fn load_sheets(args: &SheetArgs) -> Result<(LoadedSettings, SheetOptions)> {
    let settings = LoadedSettings::load(&args.settings)?;
    let options = SheetOptions {
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
    };
    debug!(
        "Loaded {} setting(s) from {:?}; project root {:?}",
        settings.file.settings.len(),
        args.settings,
        settings.project_root()
    );
    Ok((settings, options))
}

fn registry_path(settings: &LoadedSettings, provided: Option<&Path>) -> PathBuf {
    provided
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.base_dir.join(DEFAULT_REGISTRY_FILE))
}

fn handle_generate(args: &cli::GenerateArgs) -> Result<()> {
    let (settings, options) = load_sheets(&args.sheet)?;
    let types_path = registry_path(&settings, args.types.as_deref());
    let mut registry = TypeRegistry::load_or_default(&types_path)?;
    let selected = converter::select(&settings, args.sheet.name.as_deref());
    info!("Generating code for {} setting(s)", selected.len());

    // Enums first so record members can name them.
    let (enums, others): (Vec<_>, Vec<_>) = selected.into_iter().partition(|s| s.is_enum);
    let ordered = enums.into_iter().chain(others).collect::<Vec<_>>();
    let outcome = converter::run_batch(&ordered, |setting| {
        converter::generate(&settings, setting, &mut registry, options)
    });
    registry.save(&types_path)?;
    let written = outcome?;
    info!(
        "Generated {} file(s); type registry written to {:?}",
        written.iter().map(Vec::len).sum::<usize>(),
        types_path
    );
    Ok(())
}

fn handle_convert(args: &cli::ConvertArgs) -> Result<()> {
    let (settings, options) = load_sheets(&args.sheet)?;
    let types_path = registry_path(&settings, args.types.as_deref());
    let registry = TypeRegistry::load(&types_path)?;
    let asset_root = args
        .asset_root
        .clone()
        .unwrap_or_else(|| settings.project_root());
    let resolver = DirectoryResolver::new(asset_root, &registry);
    let selected = converter::select(&settings, args.sheet.name.as_deref());
    let mut progress = LogProgress;

    if args.preview {
        converter::run_batch(&selected, |setting| {
            let rendered = converter::preview(
                &settings,
                setting,
                &registry,
                &resolver,
                &mut progress,
                options,
            )?;
            println!("{}", setting.display_name());
            print!("{rendered}");
            Ok(())
        })?;
        return Ok(());
    }

    let mut store = DirectoryStore;
    let mut ctx = ConvertContext {
        settings: &settings,
        registry: &registry,
        resolver: &resolver,
        store: &mut store,
        progress: &mut progress,
        options,
    };
    info!("Converting {} setting(s)", selected.len());
    let mut reports = Vec::new();
    let outcome = converter::run_batch(&selected, |setting| {
        reports.extend(converter::convert(&mut ctx, setting)?);
        Ok(())
    });
    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&reports).context("Serializing conversion report")?;
        fs::write(path, json).with_context(|| format!("Writing report to {path:?}"))?;
        info!("Report for {} run(s) written to {:?}", reports.len(), path);
    }
    outcome.map(drop)
}

fn handle_inspect(args: &cli::InspectArgs) -> Result<()> {
    let (settings, options) = load_sheets(&args.sheet)?;
    let selected = converter::select(&settings, args.sheet.name.as_deref());
    converter::run_batch(&selected, |setting| {
        let rendered = converter::inspect(&settings, setting, options)?;
        println!("{}", setting.display_name());
        print!("{rendered}");
        Ok(())
    })?;
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
