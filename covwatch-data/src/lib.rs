//! Ingestion, storage and consolidation for the coverage dashboard.
//!
//! Responsibilities:
//! - Parse CSV, XLSX and JSON exports into canonical tables.
//! - Hold records, consolidation history and metadata in SQLite.
//! - Mirror recoverable state into key/value storage.
//! - Drive the ingestion pipeline and the consolidation engine.
//!
//! Boundaries:
//! - Domain rules for records, column mapping and snapshots live in
//!   `covwatch-core`.
//! - No terminal or rendering concerns; hosts observe progress through
//!   [`ingest::PipelineObserver`].
//!
//! Invariants:
//! - Every service is reached through a [`Dashboard`]; there is no global
//!   mutable state.
//! - Stored rows always carry the full canonical column set.

pub mod console;
pub mod consolidate;
pub mod dashboard;
pub mod error_log;
pub mod generate;
pub mod ingest;
pub mod mirror;
pub mod parse;
pub mod store;

pub use console::{ConsoleError, QueryConsole, QueryErrorKind};
pub use consolidate::{
    ConsolidationEngine, ConsolidationError, ConsolidationOptions, ConsolidationOutcome, DpMatch,
    PrefixVocabulary,
};
pub use dashboard::{Dashboard, DashboardError, RestoreReport};
pub use error_log::{ErrorEntry, ErrorLog, Severity};
pub use generate::{GenerateError, append_random_rows};
pub use ingest::{
    FileInput, IngestError, IngestOptions, IngestSummary, IngestionPipeline, PipelineObserver,
    PipelineState, PipelineStep,
};
pub use mirror::{FileStorage, KeyValueStorage, MemoryStorage, StorageMirror};
pub use parse::{ParseError, ParsedTable, TableFormat};
pub use store::{ClearReport, QueryError, RecordStore, StoreError};
