//! Primary record persistence and the metadata counter.

use covwatch_core::{CANONICAL_COLUMNS, Record};
use rusqlite::Transaction;

use super::schema::{COUNTER_KEY, METADATA_TABLE, RECORDS_TABLE, TECHNICAL_COLUMNS};
use super::{RecordStore, StoreError, quote_identifier};

/// Snapshot of the `records` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredTable {
    /// Canonical headers discovered from the live table definition.
    pub headers: Vec<String>,
    /// Rows in ascending insertion order.
    pub rows: Vec<Vec<String>>,
}

impl StoredTable {
    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as typed records.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| Record::from_positional(&self.headers, row))
            .collect()
    }
}

fn insert_sql() -> String {
    let columns: Vec<String> = CANONICAL_COLUMNS
        .iter()
        .map(|column| quote_identifier(column))
        .collect();
    let placeholders: Vec<String> = (1..=CANONICAL_COLUMNS.len())
        .map(|index| format!("?{index}"))
        .collect();
    format!(
        "INSERT INTO {RECORDS_TABLE} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn insert_records<I>(transaction: &Transaction<'_>, records: I) -> Result<usize, StoreError>
where
    I: IntoIterator<Item = Record>,
{
    let sql = insert_sql();
    let mut statement = transaction
        .prepare_cached(&sql)
        .map_err(|source| StoreError::Sqlite {
            operation: "prepare record insert",
            source,
        })?;
    let mut inserted = 0;
    for record in records {
        statement
            .execute(rusqlite::params_from_iter(record.values()))
            .map_err(|source| StoreError::Sqlite {
                operation: "insert record",
                source,
            })?;
        inserted += 1;
    }
    Ok(inserted)
}

impl RecordStore {
    /// Replace every primary record with `rows`, mapped positionally
    /// against `headers`.
    ///
    /// Columns absent from `headers` are stored as empty strings. The delete
    /// and the inserts run in one transaction, so a failure leaves the
    /// previous records in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] naming the failed operation.
    pub fn replace_all<H, C>(&mut self, rows: &[Vec<C>], headers: &[H]) -> Result<usize, StoreError>
    where
        H: AsRef<str>,
        C: AsRef<str>,
    {
        let transaction = self
            .connection
            .transaction()
            .map_err(|source| StoreError::Sqlite {
                operation: "begin replace transaction",
                source,
            })?;
        transaction
            .execute(&format!("DELETE FROM {RECORDS_TABLE}"), [])
            .map_err(|source| StoreError::Sqlite {
                operation: "delete records",
                source,
            })?;
        let inserted = insert_records(
            &transaction,
            rows.iter().map(|row| Record::from_positional(headers, row)),
        )?;
        transaction.commit().map_err(|source| StoreError::Sqlite {
            operation: "commit replace transaction",
            source,
        })?;
        log::debug!("replaced records with {inserted} rows");
        Ok(inserted)
    }

    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the insert fails.
    pub fn insert_record(&mut self, record: Record) -> Result<(), StoreError> {
        let transaction = self
            .connection
            .transaction()
            .map_err(|source| StoreError::Sqlite {
                operation: "begin insert transaction",
                source,
            })?;
        insert_records(&transaction, [record])?;
        transaction.commit().map_err(|source| StoreError::Sqlite {
            operation: "commit insert transaction",
            source,
        })
    }

    /// Canonical headers, read from the live `records` definition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the table info cannot be read.
    pub fn headers(&self) -> Result<Vec<String>, StoreError> {
        let map_err = |source| StoreError::Sqlite {
            operation: "read records table info",
            source,
        };
        let mut statement = self
            .connection
            .prepare(&format!("PRAGMA table_info({RECORDS_TABLE})"))
            .map_err(map_err)?;
        let names = statement
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok(names
            .into_iter()
            .filter(|name| !TECHNICAL_COLUMNS.contains(&name.as_str()))
            .collect())
    }

    /// All primary records in ascending id order, with their headers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the table cannot be read.
    pub fn read_all(&self) -> Result<StoredTable, StoreError> {
        let headers = self.headers()?;
        if headers.is_empty() {
            return Ok(StoredTable::default());
        }
        let columns: Vec<String> = headers.iter().map(|name| quote_identifier(name)).collect();
        let map_err = |source| StoreError::Sqlite {
            operation: "read records",
            source,
        };
        let mut statement = self
            .connection
            .prepare(&format!(
                "SELECT {} FROM {RECORDS_TABLE} ORDER BY id ASC",
                columns.join(", ")
            ))
            .map_err(map_err)?;
        let width = headers.len();
        let rows = statement
            .query_map([], |row| {
                (0..width)
                    .map(|index| row.get::<_, Option<String>>(index).map(Option::unwrap_or_default))
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(map_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        Ok(StoredTable { headers, rows })
    }

    /// Number of primary records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the count fails.
    pub fn record_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .connection
            .query_row(&format!("SELECT COUNT(*) FROM {RECORDS_TABLE}"), [], |row| {
                row.get(0)
            })
            .map_err(|source| StoreError::Sqlite {
                operation: "count records",
                source,
            })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Atomically increment the random-row counter and return the new value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the update fails.
    pub fn increment_counter(&mut self) -> Result<u64, StoreError> {
        let value: i64 = self
            .connection
            .query_row(
                &format!(
                    "INSERT INTO {METADATA_TABLE} (key, value) VALUES (?1, '1')
                     ON CONFLICT(key) DO UPDATE SET value = CAST(value AS INTEGER) + 1
                     RETURNING CAST(value AS INTEGER)"
                ),
                [COUNTER_KEY],
                |row| row.get(0),
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "increment counter",
                source,
            })?;
        u64::try_from(value).map_err(|_| StoreError::CounterCorrupt)
    }

    /// Current value of the random-row counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CounterCorrupt`] when the stored value is not a
    /// number.
    pub fn counter(&self) -> Result<u64, StoreError> {
        self.metadata_value(COUNTER_KEY)?
            .map_or(Ok(0), |raw| raw.parse().map_err(|_| StoreError::CounterCorrupt))
    }

    /// Overwrite the random-row counter, used when restoring from the mirror.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] when the write fails.
    pub fn set_counter(&mut self, value: u64) -> Result<(), StoreError> {
        self.connection
            .execute(
                &format!(
                    "INSERT INTO {METADATA_TABLE} (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value"
                ),
                (COUNTER_KEY, value.to_string()),
            )
            .map(|_| ())
            .map_err(|source| StoreError::Sqlite {
                operation: "write counter",
                source,
            })
    }
}
