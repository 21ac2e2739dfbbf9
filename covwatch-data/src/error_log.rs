//! Persistent, dismissible log of failures and warnings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of entries kept; older ones are dropped.
pub const ERROR_LOG_CAP: usize = 200;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A fatal failure of an ingestion, consolidation or query.
    Error,
    /// A degraded but non-fatal condition.
    Warning,
}

/// One entry in the [`ErrorLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    /// Identifier used to dismiss the entry.
    pub id: u64,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Entry severity.
    pub severity: Severity,
    /// Originating step, such as `parsing` or `consolidation`.
    pub origin: String,
    /// Human-readable message.
    pub message: String,
    /// Truncated chain of underlying causes.
    #[serde(default)]
    pub details: Vec<String>,
    /// Whether the user dismissed the entry.
    #[serde(default)]
    pub dismissed: bool,
}

/// Bounded, most-recent-first log of errors and warnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLog {
    entries: Vec<ErrorEntry>,
    next_id: u64,
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }
}

impl ErrorLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        &mut self,
        severity: Severity,
        origin: &str,
        message: String,
        details: Vec<String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            0,
            ErrorEntry {
                id,
                timestamp: Utc::now(),
                severity,
                origin: origin.to_owned(),
                message,
                details,
                dismissed: false,
            },
        );
        self.entries.truncate(ERROR_LOG_CAP);
        id
    }

    /// Record a fatal failure and return its id.
    pub fn record_error(
        &mut self,
        origin: &str,
        message: impl Into<String>,
        details: Vec<String>,
    ) -> u64 {
        self.push(Severity::Error, origin, message.into(), details)
    }

    /// Record a degraded condition and return its id.
    pub fn record_warning(&mut self, origin: &str, message: impl Into<String>) -> u64 {
        self.push(Severity::Warning, origin, message.into(), Vec::new())
    }

    /// Mark an entry dismissed. Returns `false` when no entry has `id`.
    pub fn dismiss(&mut self, id: u64) -> bool {
        self.entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .map(|entry| entry.dismissed = true)
            .is_some()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All entries, newest first.
    #[must_use]
    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    /// Entries not yet dismissed, newest first.
    pub fn active(&self) -> impl Iterator<Item = &ErrorEntry> {
        self.entries.iter().filter(|entry| !entry.dismissed)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn newest_entries_come_first() {
        let mut log = ErrorLog::new();
        log.record_warning("parsing", "column missing");
        let id = log.record_error("persisting", "quota exceeded", vec!["disk full".into()]);
        assert_eq!(log.entries()[0].id, id);
        assert_eq!(log.entries()[0].severity, Severity::Error);
        assert_eq!(log.entries()[1].severity, Severity::Warning);
    }

    #[rstest]
    fn dismiss_hides_from_active() {
        let mut log = ErrorLog::new();
        let id = log.record_error("query", "no such table", Vec::new());
        assert!(log.dismiss(id));
        assert!(!log.dismiss(id + 100));
        assert_eq!(log.active().count(), 0);
        assert_eq!(log.len(), 1);
    }

    #[rstest]
    fn log_is_capped() {
        let mut log = ErrorLog::new();
        for index in 0..(ERROR_LOG_CAP + 5) {
            log.record_warning("generate", format!("warning {index}"));
        }
        assert_eq!(log.len(), ERROR_LOG_CAP);
        assert_eq!(
            log.entries()[0].message,
            format!("warning {}", ERROR_LOG_CAP + 4)
        );
    }

    #[rstest]
    fn ids_survive_serialisation() {
        let mut log = ErrorLog::new();
        log.record_warning("parsing", "first");
        let json = serde_json::to_string(&log).expect("encode");
        let mut restored: ErrorLog = serde_json::from_str(&json).expect("decode");
        let id = restored.record_warning("parsing", "second");
        assert_eq!(id, 2);
    }
}
