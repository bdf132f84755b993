//! Persistence of records and table collections.
//!
//! The upsert engine only talks to [`RecordStore`]; [`DirectoryStore`] keeps
//! one YAML file per record or table under the destination directory and
//! [`MemoryStore`] keeps everything in memory.

use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context, Result, ensure};

use crate::{
    record::{Record, TableCollection},
    yaml_provider,
};

pub const RECORD_EXTENSION: &str = "yaml";

pub trait RecordStore {
    fn load_record(&self, destination: &Path, identity: &str) -> Result<Option<Record>>;
    fn save_record(&mut self, destination: &Path, record: &Record) -> Result<()>;
    fn load_table(&self, destination: &Path, name: &str) -> Result<Option<TableCollection>>;
    fn save_table(&mut self, destination: &Path, table: &TableCollection) -> Result<()>;
}

pub fn object_path(destination: &Path, name: &str) -> PathBuf {
    destination.join(format!("{name}.{RECORD_EXTENSION}"))
}

/// [`object_path`] for names that stay inside `destination`: exactly one
/// normal path component.
pub fn contained_object_path(destination: &Path, name: &str) -> Result<PathBuf> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    ensure!(
        single && !name.contains(['/', '\\']),
        "'{name}' does not name a file inside {destination:?}"
    );
    Ok(object_path(destination, name))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryStore;

impl RecordStore for DirectoryStore {
    fn load_record(&self, destination: &Path, identity: &str) -> Result<Option<Record>> {
        let path = contained_object_path(destination, identity)?;
        yaml_provider::load_if_exists(&path).with_context(|| format!("Loading record {path:?}"))
    }

    fn save_record(&mut self, destination: &Path, record: &Record) -> Result<()> {
        let path = contained_object_path(destination, &record.identity)?;
        yaml_provider::save_to_path(&path, record).with_context(|| format!("Writing record {path:?}"))
    }

    fn load_table(&self, destination: &Path, name: &str) -> Result<Option<TableCollection>> {
        let path = contained_object_path(destination, name)?;
        yaml_provider::load_if_exists(&path).with_context(|| format!("Loading table {path:?}"))
    }

    fn save_table(&mut self, destination: &Path, table: &TableCollection) -> Result<()> {
        let path = contained_object_path(destination, &table.name)?;
        yaml_provider::save_to_path(&path, table).with_context(|| format!("Writing table {path:?}"))
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub records: BTreeMap<PathBuf, Record>,
    pub tables: BTreeMap<PathBuf, TableCollection>,
}

impl RecordStore for MemoryStore {
    fn load_record(&self, destination: &Path, identity: &str) -> Result<Option<Record>> {
        Ok(self.records.get(&object_path(destination, identity)).cloned())
    }

    fn save_record(&mut self, destination: &Path, record: &Record) -> Result<()> {
        self.records
            .insert(object_path(destination, &record.identity), record.clone());
        Ok(())
    }

    fn load_table(&self, destination: &Path, name: &str) -> Result<Option<TableCollection>> {
        Ok(self.tables.get(&object_path(destination, name)).cloned())
    }

    fn save_table(&mut self, destination: &Path, table: &TableCollection) -> Result<()> {
        self.tables
            .insert(object_path(destination, &table.name), table.clone());
        Ok(())
    }
}
