//! YAML persistence shared by settings, the type registry and the record store.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

fn read_to_string(path: &Path) -> Result<Option<String>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("Opening YAML file {path:?}")),
    };
    let mut buf = String::new();
    file.read_to_string(&mut buf)
        .with_context(|| format!("Reading YAML file {path:?}"))?;
    Ok(Some(buf))
}

fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Creating directory {parent:?}"))?;
    }
    let mut file = File::create(path).with_context(|| format!("Creating YAML file {path:?}"))?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(())
}

pub fn load_from_path<T: DeserializeOwned>(path: &Path) -> Result<T> {
    load_if_exists(path)?.with_context(|| format!("YAML file {path:?} does not exist"))
}

/// Loads `path` when it exists; a missing file is `Ok(None)`.
pub fn load_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_to_string(path)? {
        Some(raw) => {
            let parsed =
                serde_yaml::from_str(&raw).with_context(|| format!("Parsing YAML file {path:?}"))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

pub fn save_to_path<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let serialized = to_string(data)?;
    write_string(path, &serialized)
}

pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    serde_yaml::to_string(value).context("Serializing YAML")
}
