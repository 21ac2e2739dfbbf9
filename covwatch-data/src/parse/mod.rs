//! Tabular parsers turning raw exports into canonical `(headers, rows)` pairs.
//!
//! Every parser routes its header row through a [`ColumnMapping`] so the
//! emitted rows always have one cell per canonical column, in canonical
//! order. The CSV path has a cooperative batched variant for large inputs;
//! see [`parse_csv`].

mod batch;
mod csv;
mod json;
mod spreadsheet;

use covwatch_core::ColumnMapping;
use thiserror::Error;

pub use batch::{BatchOptions, BatchProgress, BatchSummary, parse_csv, parse_csv_batched};
pub use csv::{CsvOptions, DEFAULT_DELIMITER, parse_csv_document, split_line};
pub use json::parse_json_table;
pub use spreadsheet::{Sheet, SheetSelection, Workbook, extract_date_token, parse_workbook};

/// Input format a table was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Delimited text.
    Csv,
    /// Office Open XML workbook.
    Xlsx,
    /// `{ "headers": [...], "rows": [...] }` document.
    Json,
}

impl TableFormat {
    /// Format implied by a file name's extension, ignoring case.
    ///
    /// # Examples
    ///
    /// ```
    /// use covwatch_data::parse::TableFormat;
    ///
    /// assert_eq!(TableFormat::from_file_name("Export.XLSX"), Some(TableFormat::Xlsx));
    /// assert_eq!(TableFormat::from_file_name("notes.txt"), None);
    /// ```
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let extension = camino::Utf8Path::new(name).extension()?;
        [Self::Csv, Self::Xlsx, Self::Json]
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(extension))
    }

    /// Media type recorded in file metadata.
    #[must_use]
    pub const fn media_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Json => "application/json",
        }
    }

    /// Lower-case name used in logs and snapshots.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Json => "json",
        }
    }
}

/// Format-specific facts about how a table was parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDetails {
    /// Delimited text, optionally processed in batches.
    Csv {
        /// Field delimiter.
        separator: char,
        /// Present when the batched parser produced the table.
        batches: Option<BatchSummary>,
    },
    /// Workbook sheet selection.
    Spreadsheet(SheetSelection),
    /// JSON table document.
    Json,
}

/// Canonical table produced by a parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    /// Canonical column names.
    pub headers: Vec<String>,
    /// Data rows; each has exactly `headers.len()` cells.
    pub rows: Vec<Vec<String>>,
    /// Name of the column table the headers were mapped against.
    pub table: &'static str,
    /// Canonical columns that found no source header.
    pub missing_columns: Vec<&'static str>,
    /// Format-specific details.
    pub source: SourceDetails,
}

impl ParsedTable {
    fn from_mapping(mapping: &ColumnMapping, rows: Vec<Vec<String>>, source: SourceDetails) -> Self {
        Self {
            headers: mapping.headers(),
            rows,
            table: mapping.table().name,
            missing_columns: mapping.missing().collect(),
            source,
        }
    }

    /// Number of data rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Format the table was parsed from.
    #[must_use]
    pub fn format(&self) -> TableFormat {
        match self.source {
            SourceDetails::Csv { .. } => TableFormat::Csv,
            SourceDetails::Spreadsheet(_) => TableFormat::Xlsx,
            SourceDetails::Json => TableFormat::Json,
        }
    }

    /// Batch facts when the batched CSV parser produced the table.
    #[must_use]
    pub fn batches(&self) -> Option<&BatchSummary> {
        match &self.source {
            SourceDetails::Csv { batches, .. } => batches.as_ref(),
            SourceDetails::Spreadsheet(_) | SourceDetails::Json => None,
        }
    }

    /// Whether the table was produced in batches.
    #[must_use]
    pub fn processed_in_batches(&self) -> bool {
        self.batches().is_some()
    }
}

/// Errors raised while parsing tabular input.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input held no content.
    #[error("empty file")]
    EmptyFile,
    /// The workbook has no sheets at all.
    #[error("workbook contains no sheets")]
    NoSheets,
    /// The selected sheet has no header row.
    #[error("sheet {sheet:?} contains no header row")]
    EmptySheet {
        /// Name of the selected sheet.
        sheet: String,
    },
    /// The workbook container could not be opened.
    #[error("failed to open workbook")]
    Workbook {
        /// Source error returned by `calamine`.
        #[source]
        source: calamine::XlsxError,
    },
    /// A sheet could not be read.
    #[error("failed to read sheet {sheet:?}")]
    Sheet {
        /// Name of the sheet.
        sheet: String,
        /// Source error returned by `calamine`.
        #[source]
        source: calamine::XlsxError,
    },
    /// The JSON document was malformed.
    #[error("failed to parse JSON table")]
    Json {
        /// Source error returned by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// The JSON document did not have the expected shape.
    #[error("JSON table {reason}")]
    JsonShape {
        /// Which shape rule failed.
        reason: &'static str,
    },
}

pub(crate) fn usize_to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
