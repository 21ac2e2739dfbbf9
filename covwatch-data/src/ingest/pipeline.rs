//! The ingestion state machine.

use chrono::{DateTime, Utc};
use covwatch_core::APPLICATION_COLUMNS;
use tokio::task::yield_now;

use crate::dashboard::{Dashboard, cause_excerpt};
use crate::mirror::{DataSnapshot, KeyValueStorage};
use crate::parse::{
    ParseError, ParsedTable, SourceDetails, TableFormat, Workbook, parse_csv, parse_json_table,
    parse_workbook,
};

use super::validate::check_structure;
use super::{
    FileInput, FileMetadata, IngestError, IngestOptions, IngestSummary, PipelineFailure,
    PipelineObserver, PipelineState, PipelineStep, StepStatus,
};

struct LoadedFile {
    metadata: FileMetadata,
    format: TableFormat,
    bytes: Vec<u8>,
}

/// Drives one file through read, parse, validate and persist.
///
/// A pipeline is reusable: each [`run`](Self::run) starts from `Idle`, and
/// [`reset`](Self::reset) returns a finished pipeline to `Idle`.
#[derive(Debug, Clone, Default)]
pub struct IngestionPipeline {
    options: IngestOptions,
    state: PipelineState,
}

impl IngestionPipeline {
    /// Pipeline with the given tunables.
    #[must_use]
    pub fn new(options: IngestOptions) -> Self {
        Self {
            options,
            state: PipelineState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Tunables.
    #[must_use]
    pub const fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Return to `Idle`, discarding the previous outcome.
    pub fn reset(&mut self) {
        self.state = PipelineState::Idle;
    }

    fn enter<O: PipelineObserver>(&mut self, step: PipelineStep, observer: &mut O) {
        self.state = PipelineState::for_step(step);
        observer.step_changed(step, StepStatus::Active);
    }

    /// Ingest `input` into `dashboard`, replacing its records.
    ///
    /// On failure the pipeline moves to `Error`, the failing step is reported
    /// to `observer` and the error is recorded in the dashboard's error log
    /// before being returned.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] describing the first failed step.
    pub async fn run<S, O>(
        &mut self,
        dashboard: &mut Dashboard<S>,
        input: FileInput,
        observer: &mut O,
    ) -> Result<IngestSummary, IngestError>
    where
        S: KeyValueStorage,
        O: PipelineObserver,
    {
        self.state = PipelineState::Idle;
        let mut step = PipelineStep::Reading;
        let result = self.run_steps(dashboard, input, observer, &mut step).await;
        match result {
            Ok(summary) => {
                self.state = PipelineState::Done;
                log::info!(
                    "ingested {} rows from {}",
                    summary.row_count,
                    summary.file.name
                );
                Ok(summary)
            }
            Err(err) => {
                observer.step_changed(step, StepStatus::Failed);
                self.state = PipelineState::Error(PipelineFailure {
                    step,
                    message: err.to_string(),
                    excerpt: cause_excerpt(&err),
                });
                dashboard.record_error(step.as_str(), &err);
                Err(err)
            }
        }
    }

    async fn run_steps<S, O>(
        &mut self,
        dashboard: &mut Dashboard<S>,
        input: FileInput,
        observer: &mut O,
        step: &mut PipelineStep,
    ) -> Result<IngestSummary, IngestError>
    where
        S: KeyValueStorage,
        O: PipelineObserver,
    {
        *step = PipelineStep::Reading;
        self.enter(*step, observer);
        let file = read_input(input)?;
        observer.step_changed(*step, StepStatus::Completed);
        yield_now().await;

        *step = PipelineStep::Parsing;
        self.enter(*step, observer);
        let table = self.parse(&file, observer).await?;
        observer.step_changed(*step, StepStatus::Completed);
        yield_now().await;

        *step = PipelineStep::Validating;
        self.enter(*step, observer);
        check_structure(&table).map_err(|check| IngestError::InvalidStructure { check })?;
        for column in &table.missing_columns {
            let message = format!(
                "{}: column {column:?} not found; stored as empty",
                file.metadata.name
            );
            observer.warning(&message);
            dashboard.record_warning(PipelineStep::Validating.as_str(), &message);
        }
        if table.table != APPLICATION_COLUMNS.name {
            let message = format!(
                "{} matched the {} layout; record fields without a counterpart stay empty",
                file.metadata.name, table.table
            );
            observer.warning(&message);
            dashboard.record_warning(PipelineStep::Validating.as_str(), &message);
        }
        observer.step_changed(*step, StepStatus::Completed);
        yield_now().await;

        *step = PipelineStep::Persisting;
        self.enter(*step, observer);
        let summary = self.persist(dashboard, file, table, observer)?;
        observer.step_changed(*step, StepStatus::Completed);
        Ok(summary)
    }

    async fn parse<O: PipelineObserver>(
        &self,
        file: &LoadedFile,
        observer: &mut O,
    ) -> Result<ParsedTable, IngestError> {
        if file.bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::EmptyFile.into());
        }
        let table = match file.format {
            TableFormat::Csv => {
                let text = String::from_utf8_lossy(&file.bytes);
                parse_csv(&text, &self.options.csv, &self.options.batch, |progress| {
                    observer.batch_progress(&progress);
                })
                .await?
            }
            TableFormat::Json => parse_json_table(&String::from_utf8_lossy(&file.bytes))?,
            TableFormat::Xlsx => {
                let workbook = Workbook::from_xlsx_bytes(file.bytes.clone())?;
                parse_workbook(&workbook)?
            }
        };
        log::debug!(
            "parsed {} rows from {} against the {} table",
            table.row_count(),
            file.metadata.name,
            table.table
        );
        Ok(table)
    }

    fn persist<S, O>(
        &self,
        dashboard: &mut Dashboard<S>,
        file: LoadedFile,
        table: ParsedTable,
        observer: &mut O,
    ) -> Result<IngestSummary, IngestError>
    where
        S: KeyValueStorage,
        O: PipelineObserver,
    {
        dashboard.mirror_mut().probe()?;
        let previous = dashboard.mirror().load_data().unwrap_or_else(|err| {
            log::warn!("previous data snapshot unreadable: {err}");
            None
        });

        let batches = table.batches().copied();
        let snapshot = match batches {
            Some(batch) => DataSnapshot::sampled(
                file.metadata.clone(),
                table.headers.clone(),
                &table.rows,
                self.options.sample_rows,
                batch.batch_size,
                batch.total_batches,
            ),
            None => DataSnapshot::full(
                file.metadata.clone(),
                table.headers.clone(),
                table.rows.clone(),
            ),
        };
        let size_warning = dashboard
            .mirror_mut()
            .save_data(&snapshot, self.options.soft_size_limit)?;
        let row_count = match dashboard
            .store_mut()
            .replace_all(&table.rows, &table.headers)
        {
            Ok(count) => count,
            Err(err) => {
                restore_snapshot(dashboard, previous.as_ref(), self.options.soft_size_limit);
                return Err(err.into());
            }
        };
        if let Some(warning) = &size_warning {
            let message = warning.to_string();
            observer.warning(&message);
            dashboard.record_warning(PipelineStep::Persisting.as_str(), &message);
        }

        let sheet = match table.source {
            SourceDetails::Spreadsheet(selection) => Some(selection),
            SourceDetails::Csv { .. } | SourceDetails::Json => None,
        };
        Ok(IngestSummary {
            format: file.format,
            file: file.metadata,
            table: table.table,
            headers: table.headers,
            row_count,
            missing_columns: table.missing_columns,
            batches,
            sheet,
            sampled: snapshot.is_sampled(),
            size_warning,
        })
    }
}

/// Put the mirror back to `previous` after the store rejected a new dataset.
fn restore_snapshot<S: KeyValueStorage>(
    dashboard: &mut Dashboard<S>,
    previous: Option<&DataSnapshot>,
    soft_limit: usize,
) {
    let outcome = match previous {
        Some(snapshot) => dashboard
            .mirror_mut()
            .save_data(snapshot, soft_limit)
            .map(|_| ()),
        None => dashboard.mirror_mut().remove_data(),
    };
    if let Err(err) = outcome {
        log::warn!("could not restore the previous data snapshot: {err}");
    }
}

fn read_input(input: FileInput) -> Result<LoadedFile, IngestError> {
    let name = input.name().to_owned();
    let format = TableFormat::from_file_name(&name)
        .ok_or_else(|| IngestError::UnsupportedFormat { name: name.clone() })?;
    let (bytes, modified) = match input {
        FileInput::Path(path) => {
            let read_error = |source| IngestError::Read {
                path: path.clone(),
                source,
            };
            let facts = covwatch_fs::file_facts(&path).map_err(read_error)?;
            let bytes = covwatch_fs::read_bytes(&path).map_err(read_error)?;
            (bytes, facts.modified.map(DateTime::<Utc>::from))
        }
        FileInput::Bytes { bytes, .. } => (bytes, None),
    };
    let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
    Ok(LoadedFile {
        metadata: FileMetadata {
            name,
            size,
            media_type: format.media_type().to_owned(),
            modified,
        },
        format,
        bytes,
    })
}

#[cfg(test)]
mod tests;
