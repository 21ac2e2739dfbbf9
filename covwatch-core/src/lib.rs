//! Core domain types for covwatch.
//!
//! The crate holds the pieces of the coverage dashboard that need no I/O:
//! the canonical [`Record`] schema, the tolerant [`ColumnTable`] mapper used
//! by every parser, and the [`ConsolidationSnapshot`] model together with its
//! bounded, date-deduplicated [`ConsolidationHistory`].

mod history;
mod mapping;
mod record;
mod snapshot;

pub use history::{ConsolidationHistory, DEFAULT_HISTORY_CAP, HistoryUpdate};
pub use mapping::{
    APPLICATION_COLUMNS, ColumnMapping, ColumnSpec, ColumnTable, KNOWN_TABLES, MappedColumn,
    TRANSACTION_COLUMNS,
};
pub use record::{
    CANONICAL_COLUMNS, COLUMN_APP_APPLI, COLUMN_APP_CODE, COLUMN_BUSINESS_CRITICALITY,
    COLUMN_DX, COLUMN_FUNCTIONAL_MONITORING, COLUMN_HCC_ELIGIBILITY, COLUMN_IN_HCC,
    COLUMN_OPERATOR_DEPARTMENT, Criticality, FLAG_NO, FLAG_YES, Record,
};
pub use snapshot::{
    ConsolidationSnapshot, CoverageMetric, DP_SECTION, SectionMetrics, percentage,
};
