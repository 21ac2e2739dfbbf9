//! Ad hoc statements against the record store.

use std::fmt;

use thiserror::Error;

use crate::dashboard::Dashboard;
use crate::mirror::KeyValueStorage;
use crate::store::{ExecuteOutcome, QueryError, SqlValue};

/// Coarse classification of a rejected statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// The statement does not parse.
    Syntax,
    /// A referenced table does not exist.
    MissingTable,
    /// A referenced column does not exist.
    MissingColumn,
    /// An unqualified column matches more than one table.
    AmbiguousColumn,
    /// Anything else, including constraint violations.
    Generic,
}

impl QueryErrorKind {
    /// Classify an engine message by the substrings SQLite uses.
    ///
    /// ```
    /// use covwatch_data::console::QueryErrorKind;
    ///
    /// assert_eq!(
    ///     QueryErrorKind::classify("no such table: missing"),
    ///     QueryErrorKind::MissingTable
    /// );
    /// assert_eq!(
    ///     QueryErrorKind::classify("UNIQUE constraint failed"),
    ///     QueryErrorKind::Generic
    /// );
    /// ```
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let message = message.to_ascii_lowercase();
        [
            ("syntax error", Self::Syntax),
            ("no such table", Self::MissingTable),
            ("no such column", Self::MissingColumn),
            ("ambiguous column", Self::AmbiguousColumn),
        ]
        .into_iter()
        .find_map(|(needle, kind)| message.contains(needle).then_some(kind))
        .unwrap_or(Self::Generic)
    }

    /// Hint shown next to the engine message.
    #[must_use]
    pub const fn hint(self) -> &'static str {
        match self {
            Self::Syntax => "check the statement for typos and unbalanced quotes",
            Self::MissingTable => "the store holds the tables records, consolidation_history and metadata",
            Self::MissingColumn => "quote column names containing spaces, e.g. \"Business criticality\"",
            Self::AmbiguousColumn => "qualify the column with its table name",
            Self::Generic => "the statement was rejected by the store",
        }
    }
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Syntax => "syntax error",
            Self::MissingTable => "missing table",
            Self::MissingColumn => "missing column",
            Self::AmbiguousColumn => "ambiguous column",
            Self::Generic => "query error",
        })
    }
}

/// Errors raised by [`QueryConsole::run`].
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The statement was blank.
    #[error("enter a statement to run")]
    EmptyQuery,
    /// The store rejected the statement.
    #[error("{kind}: {}", .source.message)]
    Query {
        /// Classification of the engine message.
        kind: QueryErrorKind,
        /// Underlying error.
        #[source]
        source: QueryError,
    },
}

/// Passes statements through to the store untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryConsole;

impl QueryConsole {
    /// Run `statement` with positional `params`.
    ///
    /// Blank input never reaches the store. Failures are recorded in the
    /// dashboard's error log before being returned. After a write the stored
    /// rows are mirrored again; a mirror failure is logged as a warning since
    /// the statement has already taken effect.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::EmptyQuery`] for blank input and
    /// [`ConsoleError::Query`] when the store rejects the statement.
    pub fn run<S: KeyValueStorage>(
        self,
        dashboard: &mut Dashboard<S>,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<ExecuteOutcome, ConsoleError> {
        let result = if statement.trim().is_empty() {
            Err(ConsoleError::EmptyQuery)
        } else {
            dashboard
                .store()
                .execute(statement, params)
                .map_err(|source| ConsoleError::Query {
                    kind: QueryErrorKind::classify(&source.message),
                    source,
                })
        };
        match &result {
            Err(err) => {
                dashboard.record_error("query", err);
            }
            Ok(ExecuteOutcome::Write { .. }) => {
                if let Err(err) = dashboard.mirror_records() {
                    let message = format!("statement applied but not mirrored: {err}");
                    dashboard.record_warning("query", &message);
                }
            }
            Ok(ExecuteOutcome::Rows(_)) => {}
        }
        result
    }
}
