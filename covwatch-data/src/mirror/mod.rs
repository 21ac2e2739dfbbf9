//! JSON mirror of the dashboard state in key/value storage.
//!
//! The relational store is rebuilt on start-up from what the mirror holds:
//! the last ingested data (or a bounded sample of it), the consolidation
//! history, the random-row counter and the error log. Each lives under its
//! own key as an opaque JSON blob tagged with [`MIRROR_FORMAT`].

mod storage;

use std::fmt;

use chrono::{DateTime, Utc};
use covwatch_core::{ConsolidationHistory, ConsolidationSnapshot};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error_log::ErrorLog;
use crate::ingest::FileMetadata;
use crate::store::{ClearOutcome, ClearReport};

pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};

/// Key holding the data snapshot.
pub const DATA_KEY: &str = "covwatch.data";
/// Key holding the consolidation history.
pub const HISTORY_KEY: &str = "covwatch.history";
/// Key holding the random-row counter.
pub const COUNTER_KEY: &str = "covwatch.counter";
/// Key holding the error log.
pub const ERROR_LOG_KEY: &str = "covwatch.errors";
const PROBE_KEY: &str = "covwatch.probe";

/// Format tag written into every blob.
pub const MIRROR_FORMAT: u32 = 1;

/// Errors raised while reading or writing the mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The backend rejected the operation.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A blob could not be serialised.
    #[error("failed to encode {key}")]
    Encode {
        /// Mirror key.
        key: &'static str,
        /// Source error returned by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// A stored blob could not be parsed.
    #[error("failed to decode {key}")]
    Decode {
        /// Mirror key.
        key: &'static str,
        /// Source error returned by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
}

impl MirrorError {
    /// Whether the failure was a storage quota overflow.
    #[must_use]
    pub const fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::Storage(StorageError::QuotaExceeded { .. }))
    }
}

/// Aggregate facts kept alongside a sampled snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleStats {
    /// Rows in the full dataset.
    pub total_rows: usize,
    /// Batch size used while parsing.
    pub batch_size: usize,
    /// Batches processed while parsing.
    pub total_batches: usize,
}

/// Mirrored copy of the ingested dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSnapshot {
    /// Blob format tag.
    pub format: u32,
    /// Metadata of the ingested file.
    pub file: FileMetadata,
    /// Canonical headers.
    pub headers: Vec<String>,
    /// Every row, or the leading sample when `sample` is set.
    pub rows: Vec<Vec<String>>,
    /// Present when only a sample of the rows is kept.
    pub sample: Option<SampleStats>,
    /// When the snapshot was written.
    pub saved_at: DateTime<Utc>,
}

impl DataSnapshot {
    /// Snapshot carrying every row.
    #[must_use]
    pub fn full(file: FileMetadata, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            format: MIRROR_FORMAT,
            file,
            headers,
            rows,
            sample: None,
            saved_at: Utc::now(),
        }
    }

    /// Snapshot carrying at most `sample_rows` leading rows plus stats.
    #[must_use]
    pub fn sampled(
        file: FileMetadata,
        headers: Vec<String>,
        rows: &[Vec<String>],
        sample_rows: usize,
        batch_size: usize,
        total_batches: usize,
    ) -> Self {
        Self {
            format: MIRROR_FORMAT,
            file,
            headers,
            rows: rows.iter().take(sample_rows).cloned().collect(),
            sample: Some(SampleStats {
                total_rows: rows.len(),
                batch_size,
                total_batches,
            }),
            saved_at: Utc::now(),
        }
    }

    /// Whether only a sample of the rows is kept.
    #[must_use]
    pub const fn is_sampled(&self) -> bool {
        self.sample.is_some()
    }
}

/// Remediation offered when a payload crosses the soft size limit.
pub const SIZE_REMEDIATION: [&str; 3] = [
    "split the file into smaller exports",
    "remove columns that are not needed",
    "reduce the time frame covered by the export",
];

/// A payload exceeded the soft size limit but was still written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeWarning {
    /// Serialised payload size in bytes.
    pub bytes: usize,
    /// Soft limit in bytes.
    pub limit: usize,
}

impl fmt::Display for SizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mirrored data is {} MiB, above the {} MiB soft limit; consider: {}",
            Tenths::of_mib(self.bytes),
            Tenths::of_mib(self.limit),
            SIZE_REMEDIATION.join("; ")
        )
    }
}

/// A byte count rendered in MiB with one decimal, rounded down.
struct Tenths(usize);

impl Tenths {
    const fn of_mib(bytes: usize) -> Self {
        Self(bytes.saturating_mul(10) / (1024 * 1024))
    }
}

impl fmt::Display for Tenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

#[derive(Serialize, Deserialize)]
struct Tagged<T> {
    format: u32,
    value: T,
}

/// JSON mirror over a [`KeyValueStorage`] backend.
#[derive(Debug, Clone)]
pub struct StorageMirror<S> {
    storage: S,
}

impl<S: KeyValueStorage> StorageMirror<S> {
    /// Wrap a backend.
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Underlying backend.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Check the backend accepts writes by storing and removing a probe key.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Storage`] when the probe cannot be written.
    pub fn probe(&mut self) -> Result<(), MirrorError> {
        self.storage.set(PROBE_KEY, "probe")?;
        self.storage.remove(PROBE_KEY)?;
        Ok(())
    }

    fn write_json<T: Serialize>(&mut self, key: &'static str, value: &T) -> Result<usize, MirrorError> {
        let payload =
            serde_json::to_string(value).map_err(|source| MirrorError::Encode { key, source })?;
        self.storage.set(key, &payload)?;
        Ok(payload.len())
    }

    fn read_json<T: DeserializeOwned>(&self, key: &'static str) -> Result<Option<T>, MirrorError> {
        self.storage
            .get(key)?
            .map(|payload| {
                serde_json::from_str(&payload).map_err(|source| MirrorError::Decode { key, source })
            })
            .transpose()
    }

    /// Write the data snapshot, reporting when it exceeds `soft_limit` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] when encoding fails or the backend rejects the
    /// write (including quota overflow).
    pub fn save_data(
        &mut self,
        snapshot: &DataSnapshot,
        soft_limit: usize,
    ) -> Result<Option<SizeWarning>, MirrorError> {
        let bytes = self.write_json(DATA_KEY, snapshot)?;
        let warning = (bytes > soft_limit).then_some(SizeWarning {
            bytes,
            limit: soft_limit,
        });
        if let Some(warning) = &warning {
            log::warn!("{warning}");
        }
        Ok(warning)
    }

    /// Read the data snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] when the blob cannot be read or decoded.
    pub fn load_data(&self) -> Result<Option<DataSnapshot>, MirrorError> {
        self.read_json(DATA_KEY)
    }

    /// Drop the data snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Storage`] when the backend rejects the removal.
    pub fn remove_data(&mut self) -> Result<(), MirrorError> {
        self.storage.remove(DATA_KEY)?;
        Ok(())
    }

    /// Write the consolidation history.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] when encoding or the write fails.
    pub fn save_history(&mut self, history: &ConsolidationHistory) -> Result<(), MirrorError> {
        let tagged = Tagged {
            format: MIRROR_FORMAT,
            value: history.entries(),
        };
        self.write_json(HISTORY_KEY, &tagged).map(|_| ())
    }

    /// Read the consolidation history, bounded to `cap` entries.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] when the blob cannot be read or decoded.
    pub fn load_history(&self, cap: usize) -> Result<ConsolidationHistory, MirrorError> {
        let entries = self
            .read_json::<Tagged<Vec<ConsolidationSnapshot>>>(HISTORY_KEY)?
            .map(|tagged| tagged.value)
            .unwrap_or_default();
        Ok(ConsolidationHistory::from_entries(entries, cap))
    }

    /// Write the random-row counter.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] when the write fails.
    pub fn save_counter(&mut self, value: u64) -> Result<(), MirrorError> {
        let tagged = Tagged {
            format: MIRROR_FORMAT,
            value,
        };
        self.write_json(COUNTER_KEY, &tagged).map(|_| ())
    }

    /// Read the random-row counter.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] when the blob cannot be read or decoded.
    pub fn load_counter(&self) -> Result<Option<u64>, MirrorError> {
        Ok(self
            .read_json::<Tagged<u64>>(COUNTER_KEY)?
            .map(|tagged| tagged.value))
    }

    /// Write the error log.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] when encoding or the write fails.
    pub fn save_error_log(&mut self, log: &ErrorLog) -> Result<(), MirrorError> {
        let tagged = Tagged {
            format: MIRROR_FORMAT,
            value: log,
        };
        self.write_json(ERROR_LOG_KEY, &tagged).map(|_| ())
    }

    /// Read the error log.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] when the blob cannot be read or decoded.
    pub fn load_error_log(&self) -> Result<ErrorLog, MirrorError> {
        Ok(self
            .read_json::<Tagged<ErrorLog>>(ERROR_LOG_KEY)?
            .map(|tagged| tagged.value)
            .unwrap_or_default())
    }

    /// Remove the data, history and counter keys. Never an error.
    pub fn clear(&mut self) -> ClearReport {
        let mut report = ClearReport::default();
        for key in [DATA_KEY, HISTORY_KEY, COUNTER_KEY] {
            let outcome = match self.storage.remove(key) {
                Ok(existed) => ClearOutcome::Cleared {
                    removed: usize::from(existed),
                },
                Err(err) => {
                    log::warn!("failed to remove mirror key {key}: {err}");
                    ClearOutcome::Failed {
                        message: err.to_string(),
                    }
                }
            };
            report.push(format!("mirror:{key}"), outcome);
        }
        report
    }
}

#[cfg(test)]
mod tests;
