//! Table definitions and idempotent initialisation.

use covwatch_core::CANONICAL_COLUMNS;
use rusqlite::Transaction;

use super::{StoreError, quote_identifier};

/// Version tag written to the metadata table on first initialisation.
pub const SCHEMA_VERSION: &str = "1";

pub(crate) const RECORDS_TABLE: &str = "records";
pub(crate) const HISTORY_TABLE: &str = "consolidation_history";
pub(crate) const METADATA_TABLE: &str = "metadata";

/// Columns the store assigns itself; never part of the canonical headers.
pub(crate) const TECHNICAL_COLUMNS: [&str; 2] = ["id", "created_at"];

pub(crate) const SCHEMA_VERSION_KEY: &str = "schema_version";
pub(crate) const COUNTER_KEY: &str = "random_row_counter";

pub(crate) fn create_tables(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    let canonical: String = CANONICAL_COLUMNS
        .iter()
        .map(|column| format!("{} TEXT NOT NULL DEFAULT '',\n", quote_identifier(column)))
        .collect();
    run_schema_step(
        transaction,
        "create records",
        &format!(
            "CREATE TABLE IF NOT EXISTS {RECORDS_TABLE} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                {canonical}
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            )"
        ),
    )?;
    run_schema_step(
        transaction,
        "create consolidation_history",
        &format!(
            "CREATE TABLE IF NOT EXISTS {HISTORY_TABLE} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            )"
        ),
    )?;
    run_schema_step(
        transaction,
        "create metadata",
        &format!(
            "CREATE TABLE IF NOT EXISTS {METADATA_TABLE} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            ) WITHOUT ROWID"
        ),
    )
}

pub(crate) fn seed_metadata(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    transaction
        .execute(
            &format!(
                "INSERT OR IGNORE INTO {METADATA_TABLE} (key, value)
                 VALUES (?1, ?2), (?3, '0')"
            ),
            (SCHEMA_VERSION_KEY, SCHEMA_VERSION, COUNTER_KEY),
        )
        .map(|_| ())
        .map_err(|source| StoreError::Schema {
            step: "seed metadata",
            source,
        })
}

fn run_schema_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), StoreError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| StoreError::Schema { step, source })
}
