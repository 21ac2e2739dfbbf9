//! Error types emitted by the covwatch CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use covwatch_data::{
    ConsoleError, ConsolidationError, DashboardError, GenerateError, IngestError, StoreError,
};
use thiserror::Error;

/// Errors emitted by the covwatch CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The storage directory exists but is not a directory.
    #[error("storage directory {path:?} is not a directory")]
    StorageDirNotDirectory { path: Utf8PathBuf },
    /// Opening the record store failed.
    #[error("failed to open the record store: {0}")]
    OpenStore(#[source] StoreError),
    /// Loading the error log or restoring mirrored state failed.
    #[error("failed to restore dashboard state: {0}")]
    Restore(#[from] DashboardError),
    /// Reading consolidation history failed.
    #[error("failed to read consolidation history: {0}")]
    History(#[source] StoreError),
    /// The ingestion pipeline failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// Consolidation failed.
    #[error(transparent)]
    Consolidate(#[from] ConsolidationError),
    /// The query console rejected the statement.
    #[error(transparent)]
    Query(#[from] ConsoleError),
    /// Generating synthetic rows failed.
    #[error("failed to generate rows: {0}")]
    Generate(#[from] GenerateError),
    /// Clear-all left some targets intact.
    #[error("clear left {failed} target(s) intact; see `covwatch errors`")]
    ClearIncomplete { failed: usize },
    /// No error log entry carries the requested identifier.
    #[error("no error log entry with id {id}")]
    UnknownErrorEntry { id: u64 },
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
