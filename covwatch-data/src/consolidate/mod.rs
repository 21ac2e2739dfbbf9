//! Coverage consolidation over the stored records.
//!
//! Every figure in a [`ConsolidationSnapshot`] comes from its own
//! `COUNT(*)` statement against the `records` table. A failing statement
//! aborts the run with the label of the figure it was computing, and no
//! snapshot is persisted in that case.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDate, Utc};
use covwatch_core::{
    COLUMN_BUSINESS_CRITICALITY, COLUMN_DX, COLUMN_FUNCTIONAL_MONITORING, COLUMN_HCC_ELIGIBILITY,
    COLUMN_IN_HCC, ConsolidationHistory, ConsolidationSnapshot, CoverageMetric, DP_SECTION, FLAG_NO, FLAG_YES,
    HistoryUpdate, SectionMetrics,
};
use thiserror::Error;

use crate::dashboard::Dashboard;
use crate::mirror::{KeyValueStorage, MirrorError};
use crate::store::{QueryError, RECORDS_TABLE, RecordStore, SqlValue, StoreError, quote_identifier};

/// Identifier of the primary section.
const DP_CODE: &str = "DP";
/// Upper-cased criticality of the critical universe.
const CRITICAL: &str = "CRITICAL";

/// Section keys of the per-prefix breakdown, in display order.
pub const SECTION_KEYS: [&str; 5] = ["dpa", "dpb", "dpc", "dpp", "dps"];

const SECTION_TOTAL_LABELS: [&str; 5] =
    ["dpa.total", "dpb.total", "dpc.total", "dpp.total", "dps.total"];
const SECTION_MONITORED_LABELS: [&str; 5] = [
    "dpa.monitored",
    "dpb.monitored",
    "dpc.monitored",
    "dpp.monitored",
    "dps.monitored",
];

/// Identifier codes counted by the per-prefix sections.
///
/// Two vocabularies circulate in exported data. Both map positionally onto
/// [`SECTION_KEYS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrefixVocabulary {
    /// `DPA`, `DPB`, `DPC`, `DPP`, `DPS`.
    #[default]
    Codes,
    /// `DP1` through `DP5`.
    Numbered,
}

impl PrefixVocabulary {
    /// Codes in section order.
    #[must_use]
    pub const fn prefixes(self) -> [&'static str; 5] {
        match self {
            Self::Codes => ["DPA", "DPB", "DPC", "DPP", "DPS"],
            Self::Numbered => ["DP1", "DP2", "DP3", "DP4", "DP5"],
        }
    }

    /// `(section key, code)` pairs in section order.
    pub fn sections(self) -> impl Iterator<Item = (&'static str, &'static str)> {
        SECTION_KEYS.into_iter().zip(self.prefixes())
    }
}

/// How the critical universe matches the `Dx` identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DpMatch {
    /// `Dx` equals `DP`.
    #[default]
    Exact,
    /// `Dx` starts with `DP`, so prefixed codes join the universe.
    Prefix,
}

/// Tunables for a consolidation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationOptions {
    /// Codes counted by the per-prefix sections.
    pub vocabulary: PrefixVocabulary,
    /// Match rule for the critical universe.
    pub dp_match: DpMatch,
    /// History cap; `None` uses the dashboard's cap.
    pub history_cap: Option<usize>,
}

/// Errors raised while consolidating.
#[derive(Debug, Error)]
pub enum ConsolidationError {
    /// One of the aggregate statements failed.
    #[error("consolidation query '{label}' failed")]
    Query {
        /// Label of the figure being computed.
        label: &'static str,
        /// Underlying query error.
        #[source]
        source: QueryError,
    },
    /// Persisting the snapshot failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Mirroring the history failed.
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Result of a persisted consolidation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationOutcome {
    /// The snapshot written to history.
    pub snapshot: ConsolidationSnapshot,
    /// Whether the snapshot was new or replaced one for the same date.
    pub update: HistoryUpdate,
}

/// Conjunction of `UPPER(TRIM(column))` comparisons with bound parameters.
#[derive(Debug, Clone)]
struct Predicate {
    clauses: Vec<String>,
    params: Vec<SqlValue>,
}

impl Predicate {
    fn critical() -> Self {
        Self {
            clauses: Vec::new(),
            params: Vec::new(),
        }
        .equals(COLUMN_BUSINESS_CRITICALITY, CRITICAL)
    }

    fn equals(mut self, column: &str, value: &str) -> Self {
        self.clauses
            .push(format!("UPPER(TRIM({})) = ?", quote_identifier(column)));
        self.params.push(SqlValue::Text(value.to_owned()));
        self
    }

    fn starts_with(mut self, column: &str, prefix: &str) -> Self {
        self.clauses
            .push(format!("UPPER(TRIM({})) LIKE ?", quote_identifier(column)));
        self.params.push(SqlValue::Text(format!("{prefix}%")));
        self
    }

    fn universe(self, dp_match: DpMatch) -> Self {
        match dp_match {
            DpMatch::Exact => self.equals(COLUMN_DX, DP_CODE),
            DpMatch::Prefix => self.starts_with(COLUMN_DX, DP_CODE),
        }
    }

    fn statement(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM {RECORDS_TABLE} WHERE {}",
            self.clauses.join(" AND ")
        )
    }

    fn count(&self, store: &RecordStore, label: &'static str) -> Result<u64, ConsolidationError> {
        let count = store
            .count(&self.statement(), &self.params)
            .map_err(|source| ConsolidationError::Query { label, source })?;
        log::debug!("{label} = {count}");
        Ok(count)
    }
}

/// Runs the fixed battery of coverage counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolidationEngine {
    options: ConsolidationOptions,
}

impl ConsolidationEngine {
    /// Engine with the given tunables.
    #[must_use]
    pub const fn new(options: ConsolidationOptions) -> Self {
        Self { options }
    }

    /// Tunables.
    #[must_use]
    pub const fn options(&self) -> &ConsolidationOptions {
        &self.options
    }

    /// Compute a snapshot without persisting it.
    ///
    /// # Errors
    ///
    /// Returns [`ConsolidationError::Query`] labelled with the first figure
    /// whose statement failed.
    pub fn compute(
        &self,
        store: &RecordStore,
        date: NaiveDate,
        timestamp: DateTime<Utc>,
    ) -> Result<ConsolidationSnapshot, ConsolidationError> {
        let universe = Predicate::critical().universe(self.options.dp_match);

        let total = universe.count(store, "totalCritiques")?;
        let monitored_bsm = universe
            .clone()
            .equals(COLUMN_FUNCTIONAL_MONITORING, FLAG_YES)
            .count(store, "monitoredBSM")?;
        let still_to_monitor = universe
            .clone()
            .equals(COLUMN_IN_HCC, FLAG_NO)
            .count(store, "stillToMonitor")?;
        let not_required_bsm = universe
            .clone()
            .equals(COLUMN_FUNCTIONAL_MONITORING, FLAG_NO)
            .equals(COLUMN_HCC_ELIGIBILITY, FLAG_NO)
            .count(store, "notRequiredBSM")?;
        let monitored_hcc = universe
            .clone()
            .equals(COLUMN_IN_HCC, FLAG_YES)
            .count(store, "monitoredHCC")?;
        let not_required_hcc = universe
            .equals(COLUMN_IN_HCC, FLAG_NO)
            .equals(COLUMN_HCC_ELIGIBILITY, FLAG_NO)
            .count(store, "notRequiredHCC")?;

        let mut sections = BTreeMap::new();
        sections.insert(
            DP_SECTION.to_owned(),
            SectionMetrics::Primary {
                critical_business_services: total,
                still_to_onboard: still_to_monitor,
            },
        );
        let labels = SECTION_TOTAL_LABELS.into_iter().zip(SECTION_MONITORED_LABELS);
        for ((key, code), (total_label, monitored_label)) in
            self.options.vocabulary.sections().zip(labels)
        {
            let section = Predicate::critical().equals(COLUMN_DX, code);
            let section_total = section.count(store, total_label)?;
            let section_monitored = section
                .equals(COLUMN_FUNCTIONAL_MONITORING, FLAG_YES)
                .count(store, monitored_label)?;
            sections.insert(
                key.to_owned(),
                SectionMetrics::Prefix {
                    total: section_total,
                    monitored: section_monitored,
                },
            );
        }

        Ok(ConsolidationSnapshot {
            date,
            total_critiques: total,
            monitored_bsm: CoverageMetric::of(monitored_bsm, total),
            still_to_monitor: CoverageMetric::of(still_to_monitor, total),
            not_required_bsm: CoverageMetric::of(not_required_bsm, total),
            monitored_hcc: CoverageMetric::of(monitored_hcc, total),
            not_required_hcc: CoverageMetric::of(not_required_hcc, total),
            sections,
            timestamp,
        })
    }

    /// Consolidate for today's local date and persist the snapshot.
    ///
    /// # Errors
    ///
    /// See [`run_at`](Self::run_at).
    pub fn run<S: KeyValueStorage>(
        &self,
        dashboard: &mut Dashboard<S>,
    ) -> Result<ConsolidationOutcome, ConsolidationError> {
        self.run_at(dashboard, Local::now().date_naive(), Utc::now())
    }

    /// Consolidate, store the snapshot under `date` and mirror the history.
    ///
    /// Failures are recorded in the dashboard's error log before being
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`ConsolidationError`] when a count, the mirror write or the
    /// history write fails. The mirror is written first, so a failed count or
    /// mirror write persists nothing.
    pub fn run_at<S: KeyValueStorage>(
        &self,
        dashboard: &mut Dashboard<S>,
        date: NaiveDate,
        timestamp: DateTime<Utc>,
    ) -> Result<ConsolidationOutcome, ConsolidationError> {
        let result = self.persist(dashboard, date, timestamp);
        if let Err(err) = &result {
            dashboard.record_error("consolidation", err);
        }
        result
    }

    fn persist<S: KeyValueStorage>(
        &self,
        dashboard: &mut Dashboard<S>,
        date: NaiveDate,
        timestamp: DateTime<Utc>,
    ) -> Result<ConsolidationOutcome, ConsolidationError> {
        let snapshot = self.compute(dashboard.store(), date, timestamp)?;
        let cap = self
            .options
            .history_cap
            .unwrap_or_else(|| dashboard.history_cap());
        let mut history =
            ConsolidationHistory::from_entries(dashboard.store().load_history(cap)?, cap);
        history.record(snapshot.clone());
        dashboard.mirror_mut().save_history(&history)?;
        let update = dashboard.store_mut().upsert_snapshot(&snapshot, cap)?;
        log::info!(
            "consolidated {date}: {} critical services, {} monitored",
            snapshot.total_critiques,
            snapshot.monitored_bsm.count
        );
        Ok(ConsolidationOutcome { snapshot, update })
    }
}
