//! Cooperative chunked CSV parsing for large exports.

use covwatch_core::percentage;

use super::csv::{CsvOptions, CsvRowBuilder, header_and_body, parse_csv_document};
use super::{ParseError, ParsedTable, SourceDetails, usize_to_u64};

/// Thresholds and chunking for the batched parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Data lines handled per chunk.
    pub chunk_size: usize,
    /// Inputs larger than this many bytes are batched.
    pub size_threshold_bytes: usize,
    /// Inputs with more lines than this are batched.
    pub line_threshold: usize,
}

impl BatchOptions {
    /// Default number of data lines per chunk.
    pub const DEFAULT_CHUNK_SIZE: usize = 1000;
    /// Default byte threshold (2 MiB).
    pub const DEFAULT_SIZE_THRESHOLD: usize = 2 * 1024 * 1024;
    /// Default line threshold.
    pub const DEFAULT_LINE_THRESHOLD: usize = 5000;

    /// Whether `text` is large enough to be parsed in batches.
    #[must_use]
    pub fn requires_batching(&self, text: &str) -> bool {
        text.len() > self.size_threshold_bytes || text.lines().count() > self.line_threshold
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            size_threshold_bytes: Self::DEFAULT_SIZE_THRESHOLD,
            line_threshold: Self::DEFAULT_LINE_THRESHOLD,
        }
    }
}

/// Progress report emitted after each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Zero-based chunk index.
    pub chunk_index: usize,
    /// Number of chunks in the document.
    pub total_chunks: usize,
    /// Data lines in this chunk.
    pub chunk_size: usize,
    /// Data lines handled so far, including this chunk.
    pub total_processed: usize,
    /// Data lines in the document.
    pub total_lines: usize,
    /// Rounded share of lines handled so far.
    pub percent_complete: u64,
}

/// Batch facts attached to a table produced by the batched parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Configured chunk size.
    pub batch_size: usize,
    /// Number of chunks processed.
    pub total_batches: usize,
}

/// Parse a CSV document chunk by chunk, yielding to the runtime in between.
///
/// Produces exactly the rows [`parse_csv_document`] would produce for the
/// same input. `on_progress` is called once per chunk.
///
/// # Errors
///
/// Returns [`ParseError::EmptyFile`] when the document holds only
/// whitespace.
pub async fn parse_csv_batched<F>(
    text: &str,
    csv: &CsvOptions,
    batch: &BatchOptions,
    mut on_progress: F,
) -> Result<ParsedTable, ParseError>
where
    F: FnMut(BatchProgress),
{
    let (header, body) = header_and_body(text)?;
    let builder = CsvRowBuilder::from_header(header, csv);
    let lines: Vec<&str> = body.collect();
    let chunk_size = batch.chunk_size.max(1);
    let total_lines = lines.len();
    let total_chunks = total_lines.div_ceil(chunk_size);

    let mut rows = Vec::with_capacity(total_lines);
    let mut total_processed = 0;
    for (chunk_index, chunk) in lines.chunks(chunk_size).enumerate() {
        rows.extend(chunk.iter().filter_map(|line| builder.build_row(line)));
        total_processed += chunk.len();
        on_progress(BatchProgress {
            chunk_index,
            total_chunks,
            chunk_size: chunk.len(),
            total_processed,
            total_lines,
            percent_complete: percentage(usize_to_u64(total_processed), usize_to_u64(total_lines)),
        });
        tokio::task::yield_now().await;
    }
    log::debug!("parsed {total_lines} CSV lines in {total_chunks} chunks");

    Ok(builder.finish(
        rows,
        SourceDetails::Csv {
            separator: builder.delimiter(),
            batches: Some(BatchSummary {
                batch_size: chunk_size,
                total_batches: total_chunks,
            }),
        },
    ))
}

/// Parse a CSV document, batching only when it crosses a threshold.
///
/// # Errors
///
/// Returns [`ParseError::EmptyFile`] when the document holds only
/// whitespace.
pub async fn parse_csv<F>(
    text: &str,
    csv: &CsvOptions,
    batch: &BatchOptions,
    on_progress: F,
) -> Result<ParsedTable, ParseError>
where
    F: FnMut(BatchProgress),
{
    if batch.requires_batching(text) {
        parse_csv_batched(text, csv, batch, on_progress).await
    } else {
        parse_csv_document(text, csv)
    }
}
