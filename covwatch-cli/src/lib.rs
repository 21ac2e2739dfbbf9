//! Command-line interface for the covwatch coverage dashboard.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod error;

pub use error::CliError;

use commands::{
    ConsolidateArgs, ErrorsArgs, GenerateArgs, HistoryArgs, IngestArgs, QueryArgs, run_clear,
    run_consolidate, run_errors, run_generate, run_history, run_ingest, run_query,
};
use config::StorageArgs;

/// Run the covwatch CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when argument parsing, configuration, the dashboard
/// or the selected command fails.
pub async fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_tracing(cli.verbose);
    let mut stdout = std::io::stdout().lock();
    run_with(cli, &mut stdout).await
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        log::debug!("a global subscriber is already installed");
    }
}

async fn run_with(cli: Cli, writer: &mut dyn Write) -> Result<(), CliError> {
    let storage = cli.storage.into_config()?;
    match cli.command {
        Command::Ingest(args) => {
            let path = args.into_path()?;
            let mut dashboard = storage.open_dashboard()?;
            run_ingest(&mut dashboard, path, writer).await
        }
        Command::Consolidate(args) => {
            let options = args.into_options()?;
            let mut dashboard = storage.open_dashboard()?;
            run_consolidate(&mut dashboard, options, writer)
        }
        Command::History(args) => {
            let dashboard = storage.open_dashboard()?;
            run_history(&dashboard, &args, writer)
        }
        Command::Query(args) => {
            let mut dashboard = storage.open_dashboard()?;
            run_query(&mut dashboard, args, writer)
        }
        Command::Generate(args) => {
            let count = args.into_count()?;
            let mut dashboard = storage.open_dashboard()?;
            run_generate(&mut dashboard, count, &mut rand::thread_rng(), writer)
        }
        Command::Clear => {
            let mut dashboard = storage.open_dashboard()?;
            run_clear(&mut dashboard, writer)
        }
        Command::Errors(args) => {
            let mut dashboard = storage.open_dashboard()?;
            run_errors(&mut dashboard, &args, writer)
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "covwatch",
    about = "Import monitoring exports and track critical service coverage",
    version
)]
struct Cli {
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(flatten)]
    storage: StorageArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import a CSV, XLSX or JSON export.
    Ingest(IngestArgs),
    /// Compute and store today's coverage snapshot.
    Consolidate(ConsolidateArgs),
    /// Print the consolidation history as JSON.
    History(HistoryArgs),
    /// Run a statement against the record store.
    Query(QueryArgs),
    /// Append synthetic records.
    Generate(GenerateArgs),
    /// Remove stored records, history and mirrored state.
    Clear,
    /// List, dismiss or clear error log entries.
    Errors(ErrorsArgs),
}

#[cfg(test)]
mod tests;
