//! Consolidation history rows: one JSON payload per date, newest first.

use covwatch_core::{ConsolidationSnapshot, HistoryUpdate};
use rusqlite::OptionalExtension;

use super::schema::HISTORY_TABLE;
use super::{RecordStore, StoreError};

fn encode(snapshot: &ConsolidationSnapshot) -> Result<String, StoreError> {
    serde_json::to_string(snapshot).map_err(|source| StoreError::Snapshot {
        operation: "encode",
        source,
    })
}

impl RecordStore {
    /// Store `snapshot`, overwriting the entry with the same date in place,
    /// then drop the oldest entries beyond `cap`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the snapshot cannot be encoded or any
    /// statement fails; the history is left unchanged in that case.
    pub fn upsert_snapshot(
        &mut self,
        snapshot: &ConsolidationSnapshot,
        cap: usize,
    ) -> Result<HistoryUpdate, StoreError> {
        let payload = encode(snapshot)?;
        let date = snapshot.date.to_string();
        let transaction = self
            .connection
            .transaction()
            .map_err(|source| StoreError::Sqlite {
                operation: "begin history transaction",
                source,
            })?;

        let existing: Option<i64> = transaction
            .query_row(
                &format!("SELECT id FROM {HISTORY_TABLE} WHERE date = ?1 ORDER BY id DESC LIMIT 1"),
                [&date],
                |row| row.get(0),
            )
            .optional()
            .map_err(|source| StoreError::Sqlite {
                operation: "look up history date",
                source,
            })?;

        let update = if let Some(id) = existing {
            transaction
                .execute(
                    &format!("UPDATE {HISTORY_TABLE} SET payload = ?1 WHERE id = ?2"),
                    (&payload, id),
                )
                .map_err(|source| StoreError::Sqlite {
                    operation: "overwrite history entry",
                    source,
                })?;
            HistoryUpdate::Replaced
        } else {
            transaction
                .execute(
                    &format!("INSERT INTO {HISTORY_TABLE} (date, payload) VALUES (?1, ?2)"),
                    (&date, &payload),
                )
                .map_err(|source| StoreError::Sqlite {
                    operation: "insert history entry",
                    source,
                })?;
            HistoryUpdate::Inserted
        };

        let keep = i64::try_from(cap.max(1)).unwrap_or(i64::MAX);
        transaction
            .execute(
                &format!(
                    "DELETE FROM {HISTORY_TABLE} WHERE id NOT IN (
                        SELECT id FROM {HISTORY_TABLE} ORDER BY id DESC LIMIT ?1
                    )"
                ),
                [keep],
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "trim history",
                source,
            })?;
        transaction.commit().map_err(|source| StoreError::Sqlite {
            operation: "commit history transaction",
            source,
        })?;
        Ok(update)
    }

    /// Up to `limit` snapshots, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the rows cannot be read or a payload
    /// cannot be decoded.
    pub fn load_history(&self, limit: usize) -> Result<Vec<ConsolidationSnapshot>, StoreError> {
        let map_err = |source| StoreError::Sqlite {
            operation: "read history",
            source,
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut statement = self
            .connection
            .prepare(&format!(
                "SELECT payload FROM {HISTORY_TABLE} ORDER BY id DESC LIMIT ?1"
            ))
            .map_err(map_err)?;
        let payloads = statement
            .query_map([limit], |row| row.get::<_, String>(0))
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        payloads
            .iter()
            .map(|payload| {
                serde_json::from_str(payload).map_err(|source| StoreError::Snapshot {
                    operation: "decode",
                    source,
                })
            })
            .collect()
    }
}
