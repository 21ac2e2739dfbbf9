//! File ingestion: read, parse, validate and persist one export.
//!
//! [`IngestionPipeline`] walks `Idle → Reading → Parsing → Validating →
//! Persisting → Done`, yielding to the runtime between steps and reporting
//! each transition to a [`PipelineObserver`]. Any failure moves the
//! pipeline to `Error`, is recorded once in the dashboard's error log and is
//! returned to the caller.

mod observer;
mod pipeline;
mod validate;

use std::fmt;

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mirror::{MirrorError, SizeWarning};
use crate::parse::{
    BatchOptions, BatchSummary, CsvOptions, ParseError, SheetSelection, TableFormat,
};
use crate::store::StoreError;

pub use observer::{LoggingObserver, NoopObserver, PipelineObserver, StepStatus};
pub use pipeline::IngestionPipeline;
pub use validate::StructureCheck;

/// Default number of rows kept when mirroring a batch-processed file.
pub const DEFAULT_SAMPLE_ROWS: usize = 100;
/// Default soft limit for the mirrored payload (10 MiB).
pub const DEFAULT_SOFT_SIZE_LIMIT: usize = 10 * 1024 * 1024;

/// Pipeline tunables.
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Batching thresholds for CSV input.
    pub batch: BatchOptions,
    /// CSV dialect and candidate column tables.
    pub csv: CsvOptions,
    /// Rows kept in the mirror for batch-processed files.
    pub sample_rows: usize,
    /// Mirrored payload size above which a warning is raised.
    pub soft_size_limit: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch: BatchOptions::default(),
            csv: CsvOptions::default(),
            sample_rows: DEFAULT_SAMPLE_ROWS,
            soft_size_limit: DEFAULT_SOFT_SIZE_LIMIT,
        }
    }
}

/// Facts recorded about the selected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// File name, without directories.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Media type implied by the extension.
    pub media_type: String,
    /// Last modification time, when known.
    pub modified: Option<DateTime<Utc>>,
}

/// Where the pipeline reads its input from.
#[derive(Debug, Clone)]
pub enum FileInput {
    /// A file on disk.
    Path(Utf8PathBuf),
    /// Bytes already in memory, with the name used for format dispatch.
    Bytes {
        /// File name used for extension dispatch.
        name: String,
        /// File contents.
        bytes: Vec<u8>,
    },
}

impl FileInput {
    /// Name used for extension dispatch.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Path(path) => path.file_name().unwrap_or(path.as_str()),
            Self::Bytes { name, .. } => name,
        }
    }
}

/// Pipeline steps that can be active or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    /// Loading file content.
    Reading,
    /// Dispatching to a parser.
    Parsing,
    /// Checking the parsed shape.
    Validating,
    /// Writing to the store and the mirror.
    Persisting,
}

impl PipelineStep {
    /// Lower-case step name used in logs and the error log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::Parsing => "parsing",
            Self::Validating => "validating",
            Self::Persisting => "persisting",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured failure of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFailure {
    /// Step that was active.
    pub step: PipelineStep,
    /// Top-level error message.
    pub message: String,
    /// Truncated chain of underlying causes.
    pub excerpt: Vec<String>,
}

/// Pipeline state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing selected yet.
    #[default]
    Idle,
    /// Loading file content.
    Reading,
    /// Parsing content.
    Parsing,
    /// Checking the parsed shape.
    Validating,
    /// Writing to the store and the mirror.
    Persisting,
    /// Data is live.
    Done,
    /// The run failed.
    Error(PipelineFailure),
}

impl PipelineState {
    pub(crate) const fn for_step(step: PipelineStep) -> Self {
        match step {
            PipelineStep::Reading => Self::Reading,
            PipelineStep::Parsing => Self::Parsing,
            PipelineStep::Validating => Self::Validating,
            PipelineStep::Persisting => Self::Persisting,
        }
    }

    /// Whether the state is `Done` or `Error`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

/// Errors raised by the ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The file extension is not `.csv`, `.xlsx` or `.json`.
    #[error("unsupported file format: {name}")]
    UnsupportedFormat {
        /// File name that was rejected.
        name: String,
    },
    /// The input file could not be read.
    #[error("failed to read {path:?}")]
    Read {
        /// Input path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The parser rejected the content.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The parsed table violates the post-parse contract.
    #[error("invalid structure: {check}")]
    InvalidStructure {
        /// Check that failed.
        check: StructureCheck,
    },
    /// The store rejected the rows.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The mirror ran out of capacity.
    #[error("local storage quota exceeded")]
    StorageQuota {
        /// Underlying mirror error.
        #[source]
        source: MirrorError,
    },
    /// The mirror failed for another reason.
    #[error("failed to mirror ingested data")]
    Mirror {
        /// Underlying mirror error.
        #[source]
        source: MirrorError,
    },
}

impl From<MirrorError> for IngestError {
    fn from(source: MirrorError) -> Self {
        if source.is_quota_exceeded() {
            Self::StorageQuota { source }
        } else {
            Self::Mirror { source }
        }
    }
}

/// What a successful run ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    /// Metadata of the ingested file.
    pub file: FileMetadata,
    /// Format the file was parsed as.
    pub format: TableFormat,
    /// Column table the headers were mapped against.
    pub table: &'static str,
    /// Canonical headers.
    pub headers: Vec<String>,
    /// Rows committed to the store.
    pub row_count: usize,
    /// Canonical columns with no source header.
    pub missing_columns: Vec<&'static str>,
    /// Batch facts for batch-processed CSV input.
    pub batches: Option<BatchSummary>,
    /// Sheet selection for workbook input.
    pub sheet: Option<SheetSelection>,
    /// Whether the mirror holds only a sample.
    pub sampled: bool,
    /// Raised when the mirrored payload exceeded the soft limit.
    pub size_warning: Option<SizeWarning>,
}
