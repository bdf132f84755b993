use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Convert CSV sheets into typed records", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate record, table and enum source files and register their types
    Generate(GenerateArgs),
    /// Convert sheet rows into records and tables using registered types
    Convert(ConvertArgs),
    /// Print the field descriptors extracted from each selected sheet
    Inspect(InspectArgs),
}

/// Options shared by every command.
#[derive(Debug, Args)]
pub struct SheetArgs {
    /// Settings file (YAML) listing the sheets to process
    #[arg(short, long)]
    pub settings: PathBuf,
    /// Only process settings whose class or table name contains these
    /// characters in order (case-insensitive)
    #[arg(short, long)]
    pub name: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the sheets (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,
    /// Type registry file to update (defaults to types.yaml next to the settings)
    #[arg(short, long)]
    pub types: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,
    /// Type registry file (defaults to types.yaml next to the settings)
    #[arg(short, long)]
    pub types: Option<PathBuf>,
    /// Directory searched for referenced assets (defaults to the project root)
    #[arg(long = "asset-root")]
    pub asset_root: Option<PathBuf>,
    /// Render synthesized records as a table instead of writing them
    #[arg(long)]
    pub preview: bool,
    /// Write a JSON report of every conversion run to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
