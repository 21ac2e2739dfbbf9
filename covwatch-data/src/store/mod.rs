//! SQLite-backed relational store for records, history and metadata.
//!
//! The store owns a single [`rusqlite::Connection`], either in memory (the
//! default, rebuilt from the storage mirror on start-up) or on disk. Three
//! tables are maintained: `records` holds the canonical primary records,
//! `consolidation_history` holds one JSON payload per dated snapshot, and
//! `metadata` holds the schema version tag and the random-row counter.

mod history;
mod query;
mod records;
mod schema;

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{Connection, Error as SqliteError};
use thiserror::Error;

pub use query::{ExecuteOutcome, QueryError, QueryRows, SqlValue};
pub use records::StoredTable;
pub use schema::SCHEMA_VERSION;
pub(crate) use schema::RECORDS_TABLE;

/// Errors raised by [`RecordStore`] operations other than ad hoc queries.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Creating the parent directory of an on-disk database failed.
    #[error("failed to create parent directory for {path:?}")]
    CreateDirectory {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path:?}")]
    Open {
        /// Database path, or `:memory:`.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A schema step failed.
    #[error("failed to execute schema step '{step}'")]
    Schema {
        /// Step label.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A store operation failed.
    #[error("failed to {operation}")]
    Sqlite {
        /// Operation label.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A consolidation snapshot could not be encoded or decoded.
    #[error("failed to {operation} consolidation snapshot")]
    Snapshot {
        /// `encode` or `decode`.
        operation: &'static str,
        /// Source error returned by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// The metadata counter held a non-numeric value.
    #[error("metadata counter holds a non-numeric value")]
    CounterCorrupt,
}

/// Outcome of clearing one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    /// The target was cleared; `removed` counts rows or keys removed.
    Cleared {
        /// Rows or keys removed.
        removed: usize,
    },
    /// Clearing the target failed.
    Failed {
        /// Rendered error message.
        message: String,
    },
}

/// Per-target report returned by clear-all operations. Never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Targets in the order they were cleared.
    pub targets: Vec<(String, ClearOutcome)>,
}

impl ClearReport {
    pub(crate) fn push(&mut self, target: impl Into<String>, outcome: ClearOutcome) {
        self.targets.push((target.into(), outcome));
    }

    /// Append every target of `other`.
    pub fn extend(&mut self, other: Self) {
        self.targets.extend(other.targets);
    }

    /// Whether every target was cleared.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.targets
            .iter()
            .all(|(_, outcome)| matches!(outcome, ClearOutcome::Cleared { .. }))
    }

    /// Targets that failed, with their messages.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.targets.iter().filter_map(|(target, outcome)| match outcome {
            ClearOutcome::Failed { message } => Some((target.as_str(), message.as_str())),
            ClearOutcome::Cleared { .. } => None,
        })
    }
}

/// Embedded relational store.
#[derive(Debug)]
pub struct RecordStore {
    connection: Connection,
}

impl RecordStore {
    /// Open an initialised in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when SQLite cannot open the database or the
    /// schema cannot be created.
    ///
    /// # Examples
    ///
    /// ```
    /// use covwatch_data::store::RecordStore;
    ///
    /// let mut store = RecordStore::open_in_memory().expect("open store");
    /// assert_eq!(store.increment_counter().expect("increment"), 1);
    /// ```
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: Utf8PathBuf::from(":memory:"),
            source,
        })?;
        Self::with_connection(connection)
    }

    /// Open (creating if needed) an initialised on-disk store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the parent directory cannot be created,
    /// SQLite cannot open the file or the schema cannot be created.
    pub fn open(path: &Utf8Path) -> Result<Self, StoreError> {
        covwatch_fs::ensure_parent_dir(path).map_err(|source| StoreError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        })?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> Result<Self, StoreError> {
        let mut store = Self { connection };
        store.initialize()?;
        Ok(store)
    }

    /// Create the three tables if absent and seed metadata on first run.
    ///
    /// Calling this more than once is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Schema`] naming the failed step.
    pub fn initialize(&mut self) -> Result<(), StoreError> {
        let transaction = self
            .connection
            .transaction()
            .map_err(|source| StoreError::Schema {
                step: "begin schema transaction",
                source,
            })?;
        schema::create_tables(&transaction)?;
        schema::seed_metadata(&transaction)?;
        transaction.commit().map_err(|source| StoreError::Schema {
            step: "commit schema transaction",
            source,
        })
    }

    /// Schema version tag recorded in metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the metadata cannot be read.
    pub fn schema_version(&self) -> Result<Option<String>, StoreError> {
        self.metadata_value(schema::SCHEMA_VERSION_KEY)
    }

    fn metadata_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        use rusqlite::OptionalExtension;

        self.connection
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", schema::METADATA_TABLE),
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|source| StoreError::Sqlite {
                operation: "read metadata",
                source,
            })
    }

    /// Empty every table; the counter returns to zero and the schema tag stays.
    ///
    /// Each table is cleared independently and failures are reported rather
    /// than raised.
    pub fn clear_all(&mut self) -> ClearReport {
        let mut report = ClearReport::default();
        for (target, sql) in [
            (schema::RECORDS_TABLE, format!("DELETE FROM {}", schema::RECORDS_TABLE)),
            (schema::HISTORY_TABLE, format!("DELETE FROM {}", schema::HISTORY_TABLE)),
            (
                schema::METADATA_TABLE,
                format!(
                    "UPDATE {} SET value = '0' WHERE key = '{}'",
                    schema::METADATA_TABLE,
                    schema::COUNTER_KEY
                ),
            ),
        ] {
            let outcome = match self.connection.execute(&sql, []) {
                Ok(removed) => ClearOutcome::Cleared { removed },
                Err(err) => {
                    log::warn!("failed to clear {target}: {err}");
                    ClearOutcome::Failed {
                        message: err.to_string(),
                    }
                }
            };
            report.push(target, outcome);
        }
        report
    }
}

/// Quote an SQL identifier, doubling embedded quotes.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests;
