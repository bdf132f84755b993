//! Reconciles synthesized records with the destination store.
//!
//! Without a table, every row is upserted as its own record named by its
//! identity: an existing record is updated in place (members this run does
//! not touch survive), otherwise a new one is created. With a table, the
//! stored table is loaded (or created), cleared and refilled in row order,
//! so its size always equals the number of completed rows of the current
//! run. In "only table" mode rows are never persisted individually.

use std::{
    ops::ControlFlow,
    path::PathBuf,
};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    coerce::Coercer,
    grid::Grid,
    record::{Record, TableCollection},
    registry::{RecordType, TableType},
    report::{ConversionReport, Diagnostics},
    schema::{FieldDescriptor, find_key_columns},
    store::{RecordStore, object_path},
    synth::{FieldBindings, RecordSynthesizer, RowIdentity, SheetOrigin},
};

pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress<'a> {
    pub type_name: &'a str,
    pub done: usize,
    pub total: usize,
}

/// Receives periodic progress. Returning `Break` stops the run before the
/// next row.
pub trait ProgressSink {
    fn report(&mut self, progress: &Progress<'_>) -> ControlFlow<()>;
}

/// Logs progress at debug level and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, progress: &Progress<'_>) -> ControlFlow<()> {
        debug!(
            "Creating {} ({}/{})",
            progress.type_name, progress.done, progress.total
        );
        ControlFlow::Continue(())
    }
}

struct TableState {
    table: TableCollection,
    only_table: bool,
}

pub struct UpsertEngine<'a> {
    record_type: &'a RecordType,
    destination: PathBuf,
    keys: Vec<String>,
    store: &'a mut dyn RecordStore,
    table: Option<TableState>,
    progress_interval: usize,
}

impl<'a> UpsertEngine<'a> {
    pub fn setup(
        record_type: &'a RecordType,
        destination: impl Into<PathBuf>,
        keys: &[String],
        store: &'a mut dyn RecordStore,
    ) -> Self {
        Self {
            record_type,
            destination: destination.into(),
            keys: keys.to_vec(),
            store,
            table: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Table mode: loads `table_name` from the destination (or starts a new
    /// table) and clears its rows.
    pub fn setup_table(
        record_type: &'a RecordType,
        table_type: &TableType,
        destination: impl Into<PathBuf>,
        keys: &[String],
        table_name: &str,
        only_table: bool,
        store: &'a mut dyn RecordStore,
    ) -> Result<Self> {
        let mut engine = Self::setup(record_type, destination, keys, store);
        let mut table = match engine
            .store
            .load_table(&engine.destination, table_name)
            .with_context(|| format!("Loading table '{table_name}'"))?
        {
            Some(existing) => {
                debug!(
                    "Loaded table {:?} with {} row(s)",
                    object_path(&engine.destination, table_name),
                    existing.len()
                );
                existing
            }
            None => TableCollection::new(table_name, &record_type.name, keys.to_vec()),
        };
        table.row_type = table_type.row_type.clone();
        table.keys = keys.to_vec();
        table.rows_mut().clear();
        engine.table = Some(TableState { table, only_table });
        Ok(engine)
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn run(
        mut self,
        coercer: &Coercer<'_>,
        fields: &mut [FieldDescriptor],
        content: &Grid,
        origin: SheetOrigin,
        progress: &mut dyn ProgressSink,
    ) -> Result<ConversionReport> {
        let type_name = self.record_type.name.clone();
        let mut diagnostics = Diagnostics::default();
        let bindings = FieldBindings::bind(self.record_type, coercer, fields, &mut diagnostics);
        let key_columns = find_key_columns(fields, &self.keys);
        for missing in &key_columns.missing {
            diagnostics.warn(&type_name, format!("key '{missing}' has no matching column"));
        }
        let synth = RecordSynthesizer::new(
            self.record_type,
            &bindings,
            &key_columns.indexes,
            coercer,
            origin,
        );

        let mut report = ConversionReport {
            type_name: type_name.clone(),
            ..Default::default()
        };
        let total = content.row_count();
        let only_table = self.table.as_ref().is_some_and(|t| t.only_table);

        for row in 0..total {
            if row > 0 && row % self.progress_interval == 0 {
                let update = Progress {
                    type_name: &type_name,
                    done: row,
                    total,
                };
                if progress.report(&update).is_break() {
                    warn!("{type_name}: conversion cancelled after {row} of {total} row(s)");
                    report.cancelled = true;
                    break;
                }
            }

            let Some(RowIdentity { identity, key }) = synth.row_identity(content, row, &mut diagnostics)
            else {
                report.skipped += 1;
                continue;
            };

            let record = if only_table {
                let mut record = Record::new(&type_name, identity, key);
                synth.populate(content, row, &mut record, &mut diagnostics);
                record
            } else {
                let path = object_path(&self.destination, &identity);
                let mut record = match self.store.load_record(&self.destination, &identity)? {
                    Some(mut existing) => {
                        info!("Update {path:?}");
                        report.updated += 1;
                        existing.type_name = type_name.clone();
                        existing.key = key;
                        existing
                    }
                    None => {
                        info!("Create {path:?}");
                        report.created += 1;
                        Record::new(&type_name, identity, key)
                    }
                };
                synth.populate(content, row, &mut record, &mut diagnostics);
                self.store
                    .save_record(&self.destination, &record)
                    .with_context(|| format!("Saving record {path:?}"))?;
                record
            };

            if let Some(state) = self.table.as_mut() {
                state.table.rows_mut().push(record);
            }
            report.rows += 1;
        }

        if !report.cancelled {
            let _ = progress.report(&Progress {
                type_name: &type_name,
                done: total,
                total,
            });
        }

        if let Some(state) = self.table.take() {
            if report.cancelled {
                warn!(
                    "{type_name}: table '{}' left unsaved after cancellation",
                    state.table.name
                );
            } else {
                self.store
                    .save_table(&self.destination, &state.table)
                    .with_context(|| format!("Saving table '{}'", state.table.name))?;
                info!(
                    "Create {:?}",
                    object_path(&self.destination, &state.table.name)
                );
            }
            report.table = Some(state.table);
        }

        info!(
            "{type_name}: {} row(s) converted ({} created, {} updated, {} skipped, {} diagnostic(s))",
            report.rows,
            report.created,
            report.updated,
            report.skipped,
            diagnostics.len()
        );
        report.diagnostics = diagnostics.into_vec();
        Ok(report)
    }
}
