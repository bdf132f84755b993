//! Conversion configuration: the header layout shared by every sheet and the
//! per-sheet conversion settings, both loaded from a YAML settings file.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{error::ConvertError, grid::Grid, yaml_provider};

/// Where header rows live inside a sheet. Row indices are 0-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeaderLayout {
    pub name_row: usize,
    pub type_row: usize,
    /// Row holding per-column enabled flags.
    pub enabled_row: Option<usize>,
    pub content_start_row: usize,
    pub enum_content_start_row: usize,
    /// Columns before this index carry sheet metadata and are ignored.
    pub table_start_column: usize,
    pub end_marker: Option<EndMarker>,
    /// Rows between progress reports.
    pub progress_interval: usize,
}

impl Default for HeaderLayout {
    fn default() -> Self {
        Self {
            name_row: 0,
            type_row: 1,
            enabled_row: None,
            content_start_row: 2,
            enum_content_start_row: 1,
            table_start_column: 0,
            end_marker: None,
            progress_interval: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndMarker {
    pub column: usize,
    #[serde(default = "default_end_marker")]
    pub marker: String,
}

fn default_end_marker() -> String {
    "END".to_string()
}

impl HeaderLayout {
    /// Applies end-marker truncation and the table start column to a freshly
    /// read sheet. The marker column is an absolute index into the raw sheet.
    pub fn prepare(&self, mut grid: Grid, content_start: usize) -> Result<Grid, ConvertError> {
        if let Some(end) = &self.end_marker {
            if end.column >= grid.column_count() {
                return Err(ConvertError::InvalidEndMarker {
                    column: end.column,
                    columns: grid.column_count(),
                });
            }
            if let Some(row) = grid.truncate_at_marker(end.column, &end.marker, content_start) {
                log::debug!("End marker '{}' found on line {}", end.marker, row + 1);
            }
        }
        if self.table_start_column > 0 {
            grid = grid.slice_columns(self.table_start_column, Grid::END);
        }
        Ok(grid)
    }

    pub fn header_end(&self) -> usize {
        [Some(self.name_row), Some(self.type_row), self.enabled_row]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// One sheet to convert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ConversionSetting {
    pub csv_file_path: PathBuf,
    pub class_name: String,
    pub destination: PathBuf,
    pub is_enum: bool,
    pub class_generate: bool,
    pub table_generate: bool,
    pub table_class_generate: bool,
    /// Only the table is persisted; rows are not stored as individual records.
    pub only_table_create: bool,
    pub is_dictionary: bool,
    pub keys: Vec<String>,
    pub table_asset_name: String,
}

impl ConversionSetting {
    pub fn can_generate_code(&self) -> bool {
        self.is_enum || self.class_generate || self.table_class_generate
    }

    pub fn can_create_records(&self) -> bool {
        !self.is_enum
    }

    pub fn table_class_name(&self) -> String {
        format!("{}Table", self.class_name)
    }

    pub fn table_name(&self) -> &str {
        if self.table_asset_name.trim().is_empty() {
            &self.class_name
        } else {
            &self.table_asset_name
        }
    }

    pub fn display_name(&self) -> &str {
        if self.table_generate {
            self.table_name()
        } else {
            &self.class_name
        }
    }

    /// Matches the name filter the way the settings browser did: the filter
    /// must be a case-insensitive subsequence of the display name.
    pub fn matches_filter(&self, filter: &str) -> bool {
        let haystack = self.display_name().to_lowercase();
        let mut chars = haystack.chars();
        filter
            .to_lowercase()
            .chars()
            .all(|needle| chars.any(|c| c == needle))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SettingsFile {
    pub layout: HeaderLayout,
    /// Root that `/`-prefixed paths resolve against. Defaults to the
    /// settings file directory.
    pub project_root: Option<PathBuf>,
    pub settings: Vec<ConversionSetting>,
}

/// Settings file plus the directory it was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub file: SettingsFile,
    pub base_dir: PathBuf,
}

impl LoadedSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let file: SettingsFile = yaml_provider::load_from_path(path)
            .with_context(|| format!("Loading settings from {path:?}"))?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self { file, base_dir })
    }

    pub fn project_root(&self) -> PathBuf {
        match &self.file.project_root {
            Some(root) => resolve_path(&self.base_dir, &self.base_dir, root),
            None => self.base_dir.clone(),
        }
    }

    /// Resolves a configured path: a leading `/` is relative to the project
    /// root, anything else to the settings file directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_path(&self.project_root(), &self.base_dir, path)
    }

    pub fn main_output_path(&self, setting: &ConversionSetting) -> PathBuf {
        let destination = self.resolve(&setting.destination);
        if setting.is_enum {
            destination.join(format!("{}.rs", setting.class_name))
        } else if setting.table_generate {
            destination.join(format!("{}.yaml", setting.table_name()))
        } else {
            destination
        }
    }
}

pub fn resolve_path(project_root: &Path, base_dir: &Path, path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let joined = match raw.strip_prefix('/') {
        Some(rooted) => project_root.join(rooted),
        None => base_dir.join(path),
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
