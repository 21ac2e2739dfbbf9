//! Facade crate for the covwatch coverage dashboard.
//!
//! This crate re-exports the core domain types and, behind the `data`
//! feature, the ingestion, storage and consolidation services.

#![forbid(unsafe_code)]

pub use covwatch_core::{
    APPLICATION_COLUMNS, CANONICAL_COLUMNS, ColumnMapping, ColumnTable, ConsolidationHistory,
    ConsolidationSnapshot, CoverageMetric, Criticality, DEFAULT_HISTORY_CAP, HistoryUpdate,
    Record, SectionMetrics, TRANSACTION_COLUMNS, percentage,
};

#[cfg(feature = "data")]
pub use covwatch_data::{
    ConsolidationEngine, ConsolidationError, ConsolidationOptions, Dashboard, FileInput,
    FileStorage, IngestError, IngestOptions, IngestionPipeline, KeyValueStorage, MemoryStorage,
    QueryConsole, RecordStore, append_random_rows,
};
