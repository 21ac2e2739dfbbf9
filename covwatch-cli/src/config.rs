//! Storage settings shared by every subcommand.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use covwatch_core::DEFAULT_HISTORY_CAP;
use covwatch_data::{Dashboard, FileStorage, RecordStore};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::CliError;

pub(crate) const ARG_STORAGE_DIR: &str = "storage-dir";
pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_STORAGE_QUOTA: &str = "storage-quota";
pub(crate) const ARG_HISTORY_CAP: &str = "history-cap";

/// Mirror directory used when none is configured.
pub(crate) const DEFAULT_STORAGE_DIR: &str = ".covwatch";

/// Where the dashboard keeps its state.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "storage")]
#[ortho_config(prefix = "COVWATCH")]
pub(crate) struct StorageArgs {
    /// Directory holding the mirrored state (default `.covwatch`).
    #[arg(long = ARG_STORAGE_DIR, value_name = "dir", global = true)]
    #[serde(default)]
    pub(crate) storage_dir: Option<Utf8PathBuf>,
    /// On-disk SQLite database; the store is rebuilt in memory when unset.
    #[arg(long = ARG_DATABASE, value_name = "path", global = true)]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Byte quota for the mirror directory.
    #[arg(long = ARG_STORAGE_QUOTA, value_name = "bytes", global = true)]
    #[serde(default)]
    pub(crate) storage_quota: Option<u64>,
    /// Consolidation snapshots to keep.
    #[arg(long = ARG_HISTORY_CAP, value_name = "count", global = true)]
    #[serde(default)]
    pub(crate) history_cap: Option<usize>,
}

impl StorageArgs {
    pub(crate) fn into_config(self) -> Result<StorageConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(StorageConfig::from(merged))
    }
}

/// Resolved storage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StorageConfig {
    pub(crate) storage_dir: Utf8PathBuf,
    pub(crate) database: Option<Utf8PathBuf>,
    pub(crate) storage_quota: Option<u64>,
    pub(crate) history_cap: usize,
}

impl From<StorageArgs> for StorageConfig {
    fn from(args: StorageArgs) -> Self {
        Self {
            storage_dir: args
                .storage_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_STORAGE_DIR)),
            database: args.database,
            storage_quota: args.storage_quota,
            history_cap: args.history_cap.unwrap_or(DEFAULT_HISTORY_CAP).max(1),
        }
    }
}

impl StorageConfig {
    pub(crate) fn validate(&self) -> Result<(), CliError> {
        require_dir_or_absent(&self.storage_dir)
    }

    /// Open the store and the mirror, then reload mirrored state into an
    /// empty store.
    pub(crate) fn open_dashboard(&self) -> Result<Dashboard<FileStorage>, CliError> {
        self.validate()?;
        let store = match &self.database {
            Some(path) => RecordStore::open(path),
            None => RecordStore::open_in_memory(),
        }
        .map_err(CliError::OpenStore)?;
        let storage = FileStorage::new(self.storage_dir.clone()).with_quota(self.storage_quota);
        let mut dashboard = Dashboard::open(store, storage, self.history_cap)?;
        let report = dashboard.restore_from_mirror()?;
        if report.rows > 0 || report.history_entries > 0 {
            log::info!(
                "restored {} rows and {} snapshots from {}",
                report.rows,
                report.history_entries,
                self.storage_dir
            );
        }
        Ok(dashboard)
    }
}

fn require_dir_or_absent(path: &Utf8Path) -> Result<(), CliError> {
    match path.metadata() {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(CliError::StorageDirNotDirectory {
            path: path.to_path_buf(),
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CliError::InspectSourcePath {
            field: ARG_STORAGE_DIR,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Check that `path` names an existing regular file.
pub(crate) fn require_existing_file(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match covwatch_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<StorageConfig, CliError> {
    let merged = StorageArgs::merge_from_layers(layers).map_err(CliError::from)?;
    Ok(StorageConfig::from(merged))
}
