//! Service container owning the store, the mirror and the error log.

use std::error::Error as StdError;

use covwatch_core::{ConsolidationHistory, DEFAULT_HISTORY_CAP};
use thiserror::Error;

use crate::error_log::ErrorLog;
use crate::ingest::{DEFAULT_SOFT_SIZE_LIMIT, FileMetadata};
use crate::mirror::{DataSnapshot, KeyValueStorage, MirrorError, StorageMirror};
use crate::parse::TableFormat;
use crate::store::{ClearReport, RecordStore, StoreError};

/// File name recorded for snapshots written from the store's own rows.
const STORE_SNAPSHOT_NAME: &str = "records";
/// Causes kept in an error log excerpt.
const EXCERPT_DEPTH: usize = 5;
/// Characters kept per cause in an error log excerpt.
const EXCERPT_WIDTH: usize = 200;

/// Errors raised by [`Dashboard`] housekeeping.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The mirror failed.
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// What [`Dashboard::restore_from_mirror`] brought back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Rows reloaded into the store.
    pub rows: usize,
    /// Whether the mirror only held a sample of the original rows.
    pub sampled: bool,
    /// Consolidation snapshots reloaded.
    pub history_entries: usize,
    /// Random-row counter after the restore.
    pub counter: u64,
}

/// Truncated rendering of an error's source chain, outermost cause first.
pub fn cause_excerpt(error: &(dyn StdError + 'static)) -> Vec<String> {
    let mut causes = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        if causes.len() == EXCERPT_DEPTH {
            break;
        }
        causes.push(cause.to_string().chars().take(EXCERPT_WIDTH).collect());
        current = cause.source();
    }
    causes
}

/// The application's single set of services, passed explicitly to the
/// pipeline, the consolidation engine and the query console.
#[derive(Debug)]
pub struct Dashboard<S> {
    store: RecordStore,
    mirror: StorageMirror<S>,
    errors: ErrorLog,
    history_cap: usize,
}

impl<S: KeyValueStorage> Dashboard<S> {
    /// Assemble a dashboard with an empty error log and the default history cap.
    pub fn new(store: RecordStore, storage: S) -> Self {
        Self {
            store,
            mirror: StorageMirror::new(storage),
            errors: ErrorLog::new(),
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }

    /// Assemble a dashboard, loading the persisted error log.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Mirror`] when the error log cannot be read.
    pub fn open(store: RecordStore, storage: S, history_cap: usize) -> Result<Self, DashboardError> {
        let mirror = StorageMirror::new(storage);
        let errors = mirror.load_error_log()?;
        Ok(Self {
            store,
            mirror,
            errors,
            history_cap: history_cap.max(1),
        })
    }

    /// Replace the history cap.
    #[must_use]
    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap.max(1);
        self
    }

    /// Maximum number of consolidation snapshots kept.
    pub const fn history_cap(&self) -> usize {
        self.history_cap
    }

    /// Relational store.
    pub const fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Relational store, mutably.
    pub fn store_mut(&mut self) -> &mut RecordStore {
        &mut self.store
    }

    /// Storage mirror.
    pub const fn mirror(&self) -> &StorageMirror<S> {
        &self.mirror
    }

    /// Storage mirror, mutably.
    pub fn mirror_mut(&mut self) -> &mut StorageMirror<S> {
        &mut self.mirror
    }

    /// Error log.
    pub const fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    fn persist_errors(&mut self) {
        if let Err(err) = self.mirror.save_error_log(&self.errors) {
            log::warn!("failed to mirror error log: {err}");
        }
    }

    /// Record a fatal failure from `origin` and mirror the log.
    pub fn record_error(&mut self, origin: &str, error: &(dyn StdError + 'static)) -> u64 {
        let id = self
            .errors
            .record_error(origin, error.to_string(), cause_excerpt(error));
        self.persist_errors();
        id
    }

    /// Record a degraded condition from `origin` and mirror the log.
    pub fn record_warning(&mut self, origin: &str, message: &str) -> u64 {
        log::warn!("{origin}: {message}");
        let id = self.errors.record_warning(origin, message);
        self.persist_errors();
        id
    }

    /// Dismiss an error log entry.
    pub fn dismiss_error(&mut self, id: u64) -> bool {
        let dismissed = self.errors.dismiss(id);
        if dismissed {
            self.persist_errors();
        }
        dismissed
    }

    /// Empty the error log.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
        self.persist_errors();
    }

    /// Consolidation history held by the store, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the history cannot be read.
    pub fn history(&self) -> Result<ConsolidationHistory, StoreError> {
        let entries = self.store.load_history(self.history_cap)?;
        Ok(ConsolidationHistory::from_entries(entries, self.history_cap))
    }

    /// Rewrite the mirrored data snapshot from the rows the store holds now.
    ///
    /// Used after rows are appended or edited outside the ingestion pipeline.
    /// The previous snapshot's file metadata is kept, and a sampled snapshot
    /// stays sampled at the same size.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError`] when the rows cannot be read or the mirror
    /// rejects the write.
    pub fn mirror_records(&mut self) -> Result<usize, DashboardError> {
        let table = self.store.read_all()?;
        let previous = self.mirror.load_data().unwrap_or_else(|err| {
            log::warn!("previous data snapshot unreadable: {err}");
            None
        });
        let rows = table.rows.len();
        let snapshot = match previous {
            Some(DataSnapshot {
                file,
                rows: sample,
                sample: Some(stats),
                ..
            }) => DataSnapshot::sampled(
                file,
                table.headers,
                &table.rows,
                sample.len(),
                stats.batch_size,
                stats.total_batches,
            ),
            Some(DataSnapshot { file, .. }) => DataSnapshot::full(file, table.headers, table.rows),
            None => DataSnapshot::full(
                FileMetadata {
                    name: STORE_SNAPSHOT_NAME.to_owned(),
                    size: 0,
                    media_type: TableFormat::Json.media_type().to_owned(),
                    modified: None,
                },
                table.headers,
                table.rows,
            ),
        };
        if let Some(warning) = self.mirror.save_data(&snapshot, DEFAULT_SOFT_SIZE_LIMIT)? {
            self.record_warning("persisting", &warning.to_string());
        }
        log::debug!("mirrored {rows} stored records");
        Ok(rows)
    }

    /// Reload mirrored data, history and counter into an empty store.
    ///
    /// Nothing is reloaded when the store already holds records or history.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError`] when the mirror cannot be read or the store
    /// rejects the reloaded rows.
    pub fn restore_from_mirror(&mut self) -> Result<RestoreReport, DashboardError> {
        let mut report = RestoreReport {
            counter: self.store.counter()?,
            ..RestoreReport::default()
        };
        if self.store.record_count()? > 0 || !self.store.load_history(1)?.is_empty() {
            log::debug!("store already populated; skipping mirror restore");
            return Ok(report);
        }

        if let Some(snapshot) = self.mirror.load_data()? {
            report.rows = self.store.replace_all(&snapshot.rows, &snapshot.headers)?;
            if let Some(stats) = snapshot.sample {
                report.sampled = true;
                let message = format!(
                    "restored a sample of {} of {} rows from {}; re-import the file for full data",
                    report.rows, stats.total_rows, snapshot.file.name
                );
                self.record_warning("restore", &message);
            }
        }

        let history = self.mirror.load_history(self.history_cap)?;
        for snapshot in history.entries().iter().rev() {
            self.store.upsert_snapshot(snapshot, self.history_cap)?;
        }
        report.history_entries = history.len();

        if let Some(counter) = self.mirror.load_counter()?
            && counter > report.counter
        {
            self.store.set_counter(counter)?;
            report.counter = counter;
        }
        log::debug!(
            "restored {} rows and {} snapshots from the mirror",
            report.rows,
            report.history_entries
        );
        Ok(report)
    }

    /// Clear the store and the mirror's data, history and counter keys.
    ///
    /// Never fails; per-target failures are reported in the result.
    pub fn clear_all(&mut self) -> ClearReport {
        let mut report = self.store.clear_all();
        report.extend(self.mirror.clear());
        if !report.is_success() {
            let failed: Vec<String> = report
                .failures()
                .map(|(target, message)| format!("{target}: {message}"))
                .collect();
            self.errors
                .record_error("clear", "clear-all left some targets intact", failed);
            self.persist_errors();
        }
        report
    }
}
