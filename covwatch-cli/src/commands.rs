//! Subcommand arguments and their handlers.
//!
//! Handlers take the dashboard and an output writer explicitly so tests can
//! drive them against in-memory storage and capture what they print.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Args, Parser, ValueEnum};
use covwatch_core::{ConsolidationSnapshot, HistoryUpdate};
use covwatch_data::ingest::LoggingObserver;
use covwatch_data::store::{ClearOutcome, SqlValue};
use covwatch_data::{
    ConsolidationEngine, ConsolidationOptions, Dashboard, DpMatch, FileInput, IngestSummary,
    IngestionPipeline, KeyValueStorage, PrefixVocabulary, QueryConsole, append_random_rows,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::CliError;
use crate::config::require_existing_file;

pub(crate) const ARG_INGEST_PATH: &str = "path";
pub(crate) const ENV_INGEST_PATH: &str = "COVWATCH_CMDS_INGEST_PATH";
pub(crate) const ARG_VOCABULARY: &str = "vocabulary";
pub(crate) const ARG_DP_MATCH: &str = "dp-match";
pub(crate) const ARG_GENERATE_COUNT: &str = "count";

/// Rows appended by `generate` when no count is configured.
pub(crate) const DEFAULT_GENERATE_COUNT: usize = 10;

fn write_json(writer: &mut dyn Write, value: &Value) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CliError> {
    serde_json::to_value(value).map_err(CliError::SerializeOutput)
}

/// CLI arguments for the `ingest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "ingest",
    long_about = "Parse a CSV, XLSX or JSON export, replace the stored records \
                 with its rows and mirror them into the storage directory.",
    about = "Import an export file"
)]
#[ortho_config(prefix = "COVWATCH")]
pub(crate) struct IngestArgs {
    /// Path to the export file.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) path: Option<Utf8PathBuf>,
}

impl IngestArgs {
    pub(crate) fn into_path(self) -> Result<Utf8PathBuf, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        merged.require_path()
    }

    pub(crate) fn require_path(self) -> Result<Utf8PathBuf, CliError> {
        let path = self.path.ok_or(CliError::MissingArgument {
            field: ARG_INGEST_PATH,
            env: ENV_INGEST_PATH,
        })?;
        require_existing_file(&path, ARG_INGEST_PATH)?;
        Ok(path)
    }
}

pub(crate) async fn run_ingest<S: KeyValueStorage>(
    dashboard: &mut Dashboard<S>,
    path: Utf8PathBuf,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let mut pipeline = IngestionPipeline::default();
    let summary = pipeline
        .run(dashboard, FileInput::Path(path), &mut LoggingObserver)
        .await?;
    write_json(writer, &ingest_report(&summary)?)
}

fn ingest_report(summary: &IngestSummary) -> Result<Value, CliError> {
    Ok(json!({
        "file": to_json(&summary.file)?,
        "format": summary.format.as_str(),
        "table": summary.table,
        "rows": summary.row_count,
        "missingColumns": summary.missing_columns,
        "batches": summary.batches.map(|batches| json!({
            "batchSize": batches.batch_size,
            "totalBatches": batches.total_batches,
        })),
        "sheet": summary.sheet.as_ref().map(|sheet| json!({
            "name": sheet.active_sheet,
            "index": sheet.sheet_index,
            "extractedDate": sheet.extracted_date,
        })),
        "sampled": summary.sampled,
        "sizeWarning": summary.size_warning.map(|warning| warning.to_string()),
    }))
}

/// Dx prefix vocabulary selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Vocabulary {
    /// DPA, DPB, DPC, DPP and DPS.
    #[default]
    Codes,
    /// DP1 to DP5.
    Numbered,
}

impl From<Vocabulary> for PrefixVocabulary {
    fn from(value: Vocabulary) -> Self {
        match value {
            Vocabulary::Codes => Self::Codes,
            Vocabulary::Numbered => Self::Numbered,
        }
    }
}

/// How the critical universe matches the `DP` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum MatchMode {
    /// `Dx = 'DP'`.
    #[default]
    Exact,
    /// `Dx LIKE 'DP%'`.
    Prefix,
}

impl From<MatchMode> for DpMatch {
    fn from(value: MatchMode) -> Self {
        match value {
            MatchMode::Exact => Self::Exact,
            MatchMode::Prefix => Self::Prefix,
        }
    }
}

/// CLI arguments for the `consolidate` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "consolidate",
    about = "Compute today's coverage snapshot and append it to the history"
)]
#[ortho_config(prefix = "COVWATCH")]
pub(crate) struct ConsolidateArgs {
    /// Section code vocabulary.
    #[arg(long = ARG_VOCABULARY, value_enum, value_name = "vocabulary")]
    #[serde(default)]
    pub(crate) vocabulary: Option<Vocabulary>,
    /// Match mode for the critical universe.
    #[arg(long = ARG_DP_MATCH, value_enum, value_name = "mode")]
    #[serde(default)]
    pub(crate) dp_match: Option<MatchMode>,
}

impl ConsolidateArgs {
    pub(crate) fn into_options(self) -> Result<ConsolidationOptions, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(ConsolidationOptions::from(merged))
    }
}

impl From<ConsolidateArgs> for ConsolidationOptions {
    fn from(args: ConsolidateArgs) -> Self {
        Self {
            vocabulary: args.vocabulary.unwrap_or_default().into(),
            dp_match: args.dp_match.unwrap_or_default().into(),
            history_cap: None,
        }
    }
}

pub(crate) fn run_consolidate<S: KeyValueStorage>(
    dashboard: &mut Dashboard<S>,
    options: ConsolidationOptions,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let outcome = ConsolidationEngine::new(options).run(dashboard)?;
    let update = match outcome.update {
        HistoryUpdate::Inserted => "inserted",
        HistoryUpdate::Replaced => "replaced",
    };
    write_json(
        writer,
        &json!({
            "update": update,
            "snapshot": to_json(&outcome.snapshot)?,
        }),
    )
}

/// CLI arguments for the `history` subcommand.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct HistoryArgs {
    /// Show at most this many snapshots, newest first.
    #[arg(long, value_name = "count")]
    pub(crate) limit: Option<usize>,
}

pub(crate) fn run_history<S: KeyValueStorage>(
    dashboard: &Dashboard<S>,
    args: &HistoryArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let history = dashboard.history().map_err(CliError::History)?;
    let limit = args.limit.unwrap_or(usize::MAX);
    let entries: Vec<&ConsolidationSnapshot> = history.entries().iter().take(limit).collect();
    write_json(writer, &to_json(&entries)?)
}

/// CLI arguments for the `query` subcommand.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct QueryArgs {
    /// Statement to run against the record store.
    #[arg(value_name = "statement")]
    pub(crate) statement: String,
    /// Positional parameter bound as text; repeat for each `?`.
    #[arg(long = "param", value_name = "value")]
    pub(crate) params: Vec<String>,
}

pub(crate) fn run_query<S: KeyValueStorage>(
    dashboard: &mut Dashboard<S>,
    args: QueryArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let params: Vec<SqlValue> = args.params.into_iter().map(SqlValue::Text).collect();
    let outcome = QueryConsole.run(dashboard, &args.statement, &params)?;
    write_json(writer, &to_json(&outcome)?)
}

/// CLI arguments for the `generate` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "generate", about = "Append synthetic records to the store")]
#[ortho_config(prefix = "COVWATCH")]
pub(crate) struct GenerateArgs {
    /// Number of rows to append (default 10).
    #[arg(long = ARG_GENERATE_COUNT, value_name = "count")]
    #[serde(default)]
    pub(crate) count: Option<usize>,
}

impl GenerateArgs {
    pub(crate) fn into_count(self) -> Result<usize, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(merged.count.unwrap_or(DEFAULT_GENERATE_COUNT))
    }
}

pub(crate) fn run_generate<S: KeyValueStorage, R: Rng + ?Sized>(
    dashboard: &mut Dashboard<S>,
    count: usize,
    rng: &mut R,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let records = append_random_rows(dashboard, count, rng)?;
    let codes: Vec<&str> = records
        .iter()
        .map(|record| record.app_code.as_str())
        .collect();
    write_json(
        writer,
        &json!({
            "appended": records.len(),
            "appCodes": codes,
        }),
    )
}

pub(crate) fn run_clear<S: KeyValueStorage>(
    dashboard: &mut Dashboard<S>,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let report = dashboard.clear_all();
    let targets: Vec<Value> = report
        .targets
        .iter()
        .map(|(target, outcome)| match outcome {
            ClearOutcome::Cleared { removed } => json!({ "target": target, "removed": removed }),
            ClearOutcome::Failed { message } => json!({ "target": target, "error": message }),
        })
        .collect();
    write_json(writer, &json!({ "targets": targets }))?;
    let failed = report.failures().count();
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::ClearIncomplete { failed })
    }
}

/// CLI arguments for the `errors` subcommand.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct ErrorsArgs {
    /// Dismiss the entry with this identifier.
    #[arg(long, value_name = "id", conflicts_with = "clear")]
    pub(crate) dismiss: Option<u64>,
    /// Empty the error log.
    #[arg(long)]
    pub(crate) clear: bool,
    /// Include dismissed entries in the listing.
    #[arg(long)]
    pub(crate) all: bool,
}

pub(crate) fn run_errors<S: KeyValueStorage>(
    dashboard: &mut Dashboard<S>,
    args: &ErrorsArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    if let Some(id) = args.dismiss
        && !dashboard.dismiss_error(id)
    {
        return Err(CliError::UnknownErrorEntry { id });
    }
    if args.clear {
        dashboard.clear_errors();
    }
    let entries: Vec<Value> = dashboard
        .errors()
        .entries()
        .iter()
        .filter(|entry| args.all || !entry.dismissed)
        .map(to_json)
        .collect::<Result<_, _>>()?;
    write_json(writer, &Value::Array(entries))
}
