//! Bounded, date-deduplicated consolidation history.

use crate::snapshot::ConsolidationSnapshot;

/// Number of snapshots retained when no other cap is configured.
pub const DEFAULT_HISTORY_CAP: usize = 30;

/// Outcome of [`ConsolidationHistory::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryUpdate {
    /// A new date was added at the front.
    Inserted,
    /// An entry for the same date was overwritten in place.
    Replaced,
}

/// Most-recent-first list of snapshots holding at most one entry per date.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, Utc};
/// use covwatch_core::{ConsolidationHistory, ConsolidationSnapshot, HistoryUpdate};
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
/// let snapshot = |total| ConsolidationSnapshot {
///     date,
///     total_critiques: total,
///     monitored_bsm: Default::default(),
///     still_to_monitor: Default::default(),
///     not_required_bsm: Default::default(),
///     monitored_hcc: Default::default(),
///     not_required_hcc: Default::default(),
///     sections: Default::default(),
///     timestamp: Utc::now(),
/// };
/// let mut history = ConsolidationHistory::new(5);
///
/// assert_eq!(history.record(snapshot(1)), HistoryUpdate::Inserted);
/// assert_eq!(history.record(snapshot(2)), HistoryUpdate::Replaced);
/// assert_eq!(history.len(), 1);
/// assert_eq!(history.entries()[0].total_critiques, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationHistory {
    entries: Vec<ConsolidationSnapshot>,
    cap: usize,
}

impl Default for ConsolidationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl ConsolidationHistory {
    /// Create an empty history. A cap of zero is raised to one.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap: cap.max(1),
        }
    }

    /// Rebuild a history from persisted entries, most recent first.
    ///
    /// Later duplicates of a date are dropped and the list is cut to `cap`.
    #[must_use]
    pub fn from_entries(entries: Vec<ConsolidationSnapshot>, cap: usize) -> Self {
        let mut history = Self::new(cap);
        for entry in entries {
            let seen = history.entries.iter().any(|kept| kept.date == entry.date);
            if !seen {
                history.entries.push(entry);
            }
        }
        history.entries.truncate(history.cap);
        history
    }

    /// Add a snapshot, overwriting any entry for the same date in place.
    pub fn record(&mut self, snapshot: ConsolidationSnapshot) -> HistoryUpdate {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|entry| entry.date == snapshot.date)
        {
            *existing = snapshot;
            return HistoryUpdate::Replaced;
        }
        self.entries.insert(0, snapshot);
        self.entries.truncate(self.cap);
        HistoryUpdate::Inserted
    }

    /// Entries, most recent first.
    #[must_use]
    pub fn entries(&self) -> &[ConsolidationSnapshot] {
        &self.entries
    }

    /// Most recently inserted snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<&ConsolidationSnapshot> {
        self.entries.first()
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub const fn cap(&self) -> usize {
        self.cap
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no snapshot has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Consume the history, returning its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<ConsolidationSnapshot> {
        self.entries
    }
}
