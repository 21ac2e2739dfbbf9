//! Ad hoc statement execution.

use rusqlite::types::ValueRef;
use rusqlite::{Error as SqliteError, Statement, params_from_iter};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::RecordStore;

/// Bound parameter value.
pub use rusqlite::types::Value as SqlValue;

/// The engine rejected a statement.
#[derive(Debug, Error)]
#[error("query failed: {message}")]
pub struct QueryError {
    /// Engine message.
    pub message: String,
    /// Offending statement text.
    pub statement: String,
    /// Parameters bound to the statement.
    pub params: Vec<SqlValue>,
    /// Source error returned by `rusqlite`.
    #[source]
    pub source: SqliteError,
}

impl QueryError {
    pub(crate) fn new(statement: &str, params: &[SqlValue], source: SqliteError) -> Self {
        Self {
            message: source.to_string(),
            statement: statement.to_owned(),
            params: params.to_vec(),
            source,
        }
    }
}

/// Rows returned by a read statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    /// Result column names in declared order.
    pub columns: Vec<String>,
    /// One value per column per row.
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    /// Rows as JSON objects keyed by column name, in declared column order.
    #[must_use]
    pub fn objects(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }
}

/// Result of [`RecordStore::execute`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExecuteOutcome {
    /// A read statement's rows.
    Rows(QueryRows),
    /// A write statement's effect.
    #[serde(rename_all = "camelCase")]
    Write {
        /// Rows changed by the statement.
        rows_affected: usize,
        /// Rowid of the most recent successful insert on the connection.
        last_insert_id: i64,
    },
}

/// Whether `statement` is a read, judged by a case-insensitive `SELECT` prefix.
pub(crate) fn is_read_statement(statement: &str) -> bool {
    statement
        .trim_start()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"))
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(int) => Value::from(int),
        ValueRef::Real(real) => Number::from_f64(real).map_or(Value::Null, Value::Number),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().copied().map(Value::from).collect()),
    }
}

fn drain_rows(
    prepared: &mut Statement<'_>,
    params: &[SqlValue],
) -> rusqlite::Result<Vec<Vec<Value>>> {
    let width = prepared.column_count();
    let mut cursor = prepared.query(params_from_iter(params))?;
    let mut rows = Vec::new();
    while let Some(row) = cursor.next()? {
        let mut values = Vec::with_capacity(width);
        for index in 0..width {
            values.push(json_value(row.get_ref(index)?));
        }
        rows.push(values);
    }
    Ok(rows)
}

impl RecordStore {
    /// Run one statement with positional parameters.
    ///
    /// Statements outside the `SELECT` prefix report the write shape even
    /// when the engine yields rows for them (`PRAGMA`, `WITH`, `VALUES`);
    /// those rows are stepped through and discarded.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] carrying the engine message, the statement and
    /// its parameters whenever SQLite rejects it.
    pub fn execute(
        &self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<ExecuteOutcome, QueryError> {
        let wrap = |source| QueryError::new(statement, params, source);
        let mut prepared = self.connection.prepare(statement).map_err(wrap)?;
        if is_read_statement(statement) {
            let columns: Vec<String> = prepared
                .column_names()
                .into_iter()
                .map(str::to_owned)
                .collect();
            let rows = drain_rows(&mut prepared, params).map_err(wrap)?;
            return Ok(ExecuteOutcome::Rows(QueryRows { columns, rows }));
        }

        let rows_affected = if prepared.column_count() == 0 {
            prepared.execute(params_from_iter(params)).map_err(wrap)?
        } else {
            let readonly = prepared.readonly();
            drain_rows(&mut prepared, params).map_err(wrap)?;
            if readonly {
                0
            } else {
                usize::try_from(self.connection.changes()).unwrap_or(usize::MAX)
            }
        };
        Ok(ExecuteOutcome::Write {
            rows_affected,
            last_insert_id: self.connection.last_insert_rowid(),
        })
    }

    /// Run a `SELECT COUNT(*) ...` statement and return the count.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when SQLite rejects the statement.
    pub fn count(&self, statement: &str, params: &[SqlValue]) -> Result<u64, QueryError> {
        let count: i64 = self
            .connection
            .query_row(statement, params_from_iter(params), |row| row.get(0))
            .map_err(|source| QueryError::new(statement, params, source))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
