use std::collections::BTreeMap;

use super::*;
use camino::Utf8PathBuf;
use chrono::NaiveDate;
use covwatch_core::CoverageMetric;
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn mirror() -> StorageMirror<MemoryStorage> {
    StorageMirror::new(MemoryStorage::new())
}

fn metadata() -> FileMetadata {
    FileMetadata {
        name: "apps.csv".into(),
        size: 42,
        media_type: "text/csv".into(),
        modified: None,
    }
}

fn rows(count: usize) -> Vec<Vec<String>> {
    (0..count)
        .map(|index| vec!["DP".to_owned(), format!("App {index}")])
        .collect()
}

fn headers() -> Vec<String> {
    vec!["Dx".to_owned(), "App Appli".to_owned()]
}

fn snapshot(day: u32, total: u64) -> ConsolidationSnapshot {
    ConsolidationSnapshot {
        date: NaiveDate::from_ymd_opt(2024, 5, day).expect("valid date"),
        total_critiques: total,
        monitored_bsm: CoverageMetric::of(total, total),
        still_to_monitor: CoverageMetric::default(),
        not_required_bsm: CoverageMetric::default(),
        monitored_hcc: CoverageMetric::default(),
        not_required_hcc: CoverageMetric::default(),
        sections: BTreeMap::new(),
        timestamp: DateTime::from_timestamp(1_714_521_600, 0).expect("valid timestamp"),
    }
}

#[rstest]
fn data_snapshot_round_trips(mut mirror: StorageMirror<MemoryStorage>) {
    assert!(mirror.load_data().expect("load empty").is_none());
    let saved = DataSnapshot::full(metadata(), headers(), rows(3));
    let warning = mirror.save_data(&saved, usize::MAX).expect("save");
    assert!(warning.is_none());
    assert_eq!(mirror.load_data().expect("load"), Some(saved));
}

#[rstest]
fn sampled_snapshot_keeps_leading_rows_and_stats() {
    let sampled = DataSnapshot::sampled(metadata(), headers(), &rows(250), 100, 1000, 3);
    assert!(sampled.is_sampled());
    assert_eq!(sampled.rows.len(), 100);
    assert_eq!(sampled.rows[0][1], "App 0");
    assert_eq!(
        sampled.sample,
        Some(SampleStats {
            total_rows: 250,
            batch_size: 1000,
            total_batches: 3,
        })
    );
}

#[rstest]
fn oversized_payload_warns_with_remediation(mut mirror: StorageMirror<MemoryStorage>) {
    let saved = DataSnapshot::full(metadata(), headers(), rows(20));
    let warning = mirror
        .save_data(&saved, 64)
        .expect("save")
        .expect("size warning");
    assert_eq!(warning.limit, 64);
    assert!(warning.bytes > 64);
    let rendered = warning.to_string();
    for remedy in SIZE_REMEDIATION {
        assert!(rendered.contains(remedy), "{rendered} lacks {remedy}");
    }
    assert!(mirror.load_data().expect("load").is_some());
}

#[rstest]
fn size_warning_renders_tenths_of_mib() {
    let warning = SizeWarning {
        bytes: 11 * 1024 * 1024 + 600 * 1024,
        limit: 10 * 1024 * 1024,
    };
    assert!(
        warning
            .to_string()
            .starts_with("mirrored data is 11.5 MiB, above the 10.0 MiB soft limit")
    );
}

#[rstest]
fn history_counter_and_error_log_round_trip(mut mirror: StorageMirror<MemoryStorage>) {
    let mut history = ConsolidationHistory::new(2);
    history.record(snapshot(1, 3));
    history.record(snapshot(2, 4));
    mirror.save_history(&history).expect("save history");
    assert_eq!(mirror.load_history(2).expect("load history"), history);
    assert_eq!(mirror.load_history(1).expect("load capped").len(), 1);

    assert_eq!(mirror.load_counter().expect("load counter"), None);
    mirror.save_counter(12).expect("save counter");
    assert_eq!(mirror.load_counter().expect("load counter"), Some(12));

    let mut log = ErrorLog::new();
    log.record_warning("validating", "column missing");
    mirror.save_error_log(&log).expect("save log");
    assert_eq!(mirror.load_error_log().expect("load log"), log);
}

#[rstest]
fn corrupt_blob_reports_the_key(mut mirror: StorageMirror<MemoryStorage>) {
    mirror
        .storage
        .set(COUNTER_KEY, "not json")
        .expect("write garbage");
    let err = mirror.load_counter().expect_err("corrupt");
    assert!(matches!(err, MirrorError::Decode { key: COUNTER_KEY, .. }));
}

#[rstest]
fn clear_removes_state_keys_but_keeps_error_log(mut mirror: StorageMirror<MemoryStorage>) {
    mirror
        .save_data(&DataSnapshot::full(metadata(), headers(), rows(1)), usize::MAX)
        .expect("save data");
    mirror.save_counter(3).expect("save counter");
    mirror.save_error_log(&ErrorLog::new()).expect("save log");

    let report = mirror.clear();
    assert!(report.is_success());
    assert_eq!(
        report.targets,
        vec![
            (format!("mirror:{DATA_KEY}"), ClearOutcome::Cleared { removed: 1 }),
            (format!("mirror:{HISTORY_KEY}"), ClearOutcome::Cleared { removed: 0 }),
            (format!("mirror:{COUNTER_KEY}"), ClearOutcome::Cleared { removed: 1 }),
        ]
    );
    assert!(mirror.load_data().expect("load").is_none());
    assert!(mirror.storage().get(ERROR_LOG_KEY).expect("get").is_some());
}

#[rstest]
fn probe_surfaces_quota_overflow() {
    let mut mirror = StorageMirror::new(MemoryStorage::with_quota(4));
    let err = mirror.probe().expect_err("quota");
    assert!(err.is_quota_exceeded());

    let mut roomy = StorageMirror::new(MemoryStorage::with_quota(1024));
    roomy.probe().expect("probe");
    assert!(roomy.storage().is_empty());
}

#[rstest]
fn file_backed_mirror_survives_reopening() {
    let dir = TempDir::new().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
    {
        let mut mirror = StorageMirror::new(FileStorage::new(path.clone()));
        mirror.save_counter(9).expect("save counter");
    }
    let reopened = StorageMirror::new(FileStorage::new(path));
    assert_eq!(reopened.load_counter().expect("load counter"), Some(9));
}
