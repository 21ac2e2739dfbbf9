//! Test helpers for building dashboards and capturing command output.

use camino::{Utf8Path, Utf8PathBuf};
use covwatch_data::{Dashboard, MemoryStorage, RecordStore};
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

pub(super) fn memory_dashboard() -> Dashboard<MemoryStorage> {
    Dashboard::new(
        RecordStore::open_in_memory().expect("open store"),
        MemoryStorage::new(),
    )
}

pub(super) fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace")
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    fs::write(path.as_std_path(), contents).expect("write fixture");
}

/// Parse the JSON a command wrote into `buffer`.
pub(super) fn output(buffer: &[u8]) -> Value {
    serde_json::from_slice(buffer).expect("command output is JSON")
}

pub(super) const APPLICATIONS_CSV: &str = "Dx;App Appli;App Code;Operator/Department;Business criticality;Functional monitoring (BSM);In HCC;HCC eligibility\n\
DP;Billing;BIL;Finance;Critical;YES;YES;YES\n\
DP;Payroll;PAY;HR;Critical;NO;NO;YES\n\
DPA;Ledger;LED;Finance;Critical;YES;NO;NO\n";
