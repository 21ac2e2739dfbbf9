use super::*;
use chrono::{NaiveDate, TimeZone, Utc};
use covwatch_core::{
    CANONICAL_COLUMNS, ConsolidationSnapshot, CoverageMetric, HistoryUpdate, Record,
};
use proptest::prelude::*;
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn store() -> RecordStore {
    RecordStore::open_in_memory().expect("open in-memory store")
}

fn canonical_headers() -> Vec<String> {
    CANONICAL_COLUMNS.iter().map(|column| (*column).to_owned()).collect()
}

fn row(dx: &str, name: &str) -> Vec<String> {
    let mut cells = vec![String::new(); CANONICAL_COLUMNS.len()];
    cells[0] = dx.to_owned();
    cells[1] = name.to_owned();
    cells
}

fn snapshot(day: u32, total: u64) -> ConsolidationSnapshot {
    ConsolidationSnapshot {
        date: NaiveDate::from_ymd_opt(2024, 1, day).expect("valid date"),
        total_critiques: total,
        monitored_bsm: CoverageMetric::of(0, total),
        still_to_monitor: CoverageMetric::of(0, total),
        not_required_bsm: CoverageMetric::of(0, total),
        monitored_hcc: CoverageMetric::of(0, total),
        not_required_hcc: CoverageMetric::of(0, total),
        sections: Default::default(),
        timestamp: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).single().expect("timestamp"),
    }
}

#[rstest]
fn initialise_is_idempotent(mut store: RecordStore) {
    store.increment_counter().expect("increment");
    store.initialize().expect("second initialise");
    assert_eq!(store.counter().expect("counter"), 1);
    assert_eq!(store.schema_version().expect("version").as_deref(), Some(SCHEMA_VERSION));
}

#[rstest]
fn headers_exclude_technical_columns(store: RecordStore) {
    assert_eq!(store.headers().expect("headers"), CANONICAL_COLUMNS);
}

#[rstest]
fn replace_all_round_trips_in_order(mut store: RecordStore) {
    let rows = vec![row("DPA", "Billing"), row("DP", "Ledger"), row("DPS", "Payroll")];
    let inserted = store
        .replace_all(&rows, &canonical_headers())
        .expect("replace rows");
    assert_eq!(inserted, 3);

    let table = store.read_all().expect("read rows");
    assert_eq!(table.headers, canonical_headers());
    assert_eq!(table.rows, rows);
}

#[rstest]
fn replace_all_wipes_previous_rows(mut store: RecordStore) {
    let headers = canonical_headers();
    store
        .replace_all(&[row("DPA", "Old")], &headers)
        .expect("first replace");
    store
        .replace_all(&[row("DPB", "New")], &headers)
        .expect("second replace");
    let records = store.read_all().expect("read").records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].app_appli, "New");
}

#[rstest]
fn replace_all_fills_unlisted_columns(mut store: RecordStore) {
    store
        .replace_all(&[vec!["Critical", "DP"]], &["Business criticality", "Dx"])
        .expect("replace rows");
    let record = store.read_all().expect("read").records().remove(0);
    assert_eq!(record.dx, "DP");
    assert_eq!(record.business_criticality, "Critical");
    assert_eq!(record.in_hcc, "");
}

#[rstest]
fn insert_record_appends(mut store: RecordStore) {
    store
        .replace_all(&[row("DPA", "First")], &canonical_headers())
        .expect("replace");
    store
        .insert_record(Record {
            dx: "DPC".to_owned(),
            ..Record::default()
        })
        .expect("insert");
    let table = store.read_all().expect("read");
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows[1][0], "DPC");
}

#[rstest]
fn clear_all_is_idempotent(mut store: RecordStore) {
    store
        .replace_all(&[row("DPA", "Billing")], &canonical_headers())
        .expect("replace");
    store.increment_counter().expect("increment");
    store.upsert_snapshot(&snapshot(1, 3), 30).expect("snapshot");

    let first = store.clear_all();
    let second = store.clear_all();
    assert!(first.is_success());
    assert!(second.is_success());
    assert!(store.read_all().expect("read").is_empty());
    assert!(store.load_history(30).expect("history").is_empty());
    assert_eq!(store.counter().expect("counter"), 0);
    assert_eq!(store.schema_version().expect("version").as_deref(), Some(SCHEMA_VERSION));
}

#[rstest]
fn execute_select_returns_ordered_columns(mut store: RecordStore) {
    store
        .replace_all(&[row("DPA", "Billing")], &canonical_headers())
        .expect("replace");
    let outcome = store
        .execute(
            "SELECT \"App Appli\", Dx FROM records WHERE Dx = ?1",
            &[SqlValue::Text("DPA".to_owned())],
        )
        .expect("select");
    let ExecuteOutcome::Rows(rows) = outcome else {
        panic!("expected rows");
    };
    assert_eq!(rows.columns, ["App Appli", "Dx"]);
    let objects = rows.objects();
    let keys: Vec<&String> = objects[0].keys().collect();
    assert_eq!(keys, ["App Appli", "Dx"]);
    assert_eq!(objects[0]["App Appli"], "Billing");
}

#[rstest]
fn execute_write_reports_effect(store: RecordStore) {
    let outcome = store
        .execute("INSERT INTO records (Dx) VALUES (?1)", &[SqlValue::Text("DP".into())])
        .expect("insert");
    assert_eq!(
        outcome,
        ExecuteOutcome::Write {
            rows_affected: 1,
            last_insert_id: 1,
        }
    );
}

#[rstest]
#[case("PRAGMA table_info(records)")]
#[case("WITH x AS (SELECT 1 AS one) SELECT one FROM x")]
#[case("VALUES (1), (2)")]
#[case("EXPLAIN SELECT * FROM records")]
fn execute_accepts_row_returning_statements(store: RecordStore, #[case] statement: &str) {
    let outcome = store.execute(statement, &[]).expect("statement runs");
    assert!(matches!(
        outcome,
        ExecuteOutcome::Write {
            rows_affected: 0,
            ..
        }
    ));
}

#[rstest]
fn execute_returning_insert_counts_its_rows(store: RecordStore) {
    let outcome = store
        .execute(
            "INSERT INTO records (Dx) VALUES ('DP'), ('DPA') RETURNING Dx",
            &[],
        )
        .expect("insert with returning");
    assert!(matches!(
        outcome,
        ExecuteOutcome::Write {
            rows_affected: 2,
            ..
        }
    ));
    assert_eq!(store.record_count().expect("count"), 2);
}

#[rstest]
fn execute_errors_carry_context(store: RecordStore) {
    let err = store
        .execute("SELEC * FROM records", &[SqlValue::Integer(7)])
        .expect_err("syntax error");
    assert_eq!(err.statement, "SELEC * FROM records");
    assert_eq!(err.params, [SqlValue::Integer(7)]);
    assert!(err.message.contains("syntax error"));
}

#[rstest]
fn history_dedups_by_date(mut store: RecordStore) {
    assert_eq!(
        store.upsert_snapshot(&snapshot(1, 3), 30).expect("first"),
        HistoryUpdate::Inserted
    );
    assert_eq!(
        store.upsert_snapshot(&snapshot(1, 9), 30).expect("second"),
        HistoryUpdate::Replaced
    );
    let history = store.load_history(30).expect("history");
    assert_eq!(history, [snapshot(1, 9)]);
}

#[rstest]
fn history_is_capped_newest_first(mut store: RecordStore) {
    for day in 1..=5 {
        store.upsert_snapshot(&snapshot(day, 1), 3).expect("snapshot");
    }
    let dates: Vec<u32> = store
        .load_history(10)
        .expect("history")
        .iter()
        .map(|entry| chrono::Datelike::day(&entry.date))
        .collect();
    assert_eq!(dates, [5, 4, 3]);
}

#[rstest]
fn on_disk_store_persists_between_opens() {
    let dir = TempDir::new().expect("temp dir");
    let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("nested/covwatch.sqlite3"))
        .expect("utf-8 path");
    {
        let mut store = RecordStore::open(&path).expect("open on disk");
        store
            .replace_all(&[row("DPP", "Portal")], &canonical_headers())
            .expect("replace");
    }
    let store = RecordStore::open(&path).expect("reopen");
    assert_eq!(store.record_count().expect("count"), 1);
}

proptest! {
    #[test]
    fn counter_yields_one_to_n(n in 1usize..64) {
        let mut store = RecordStore::open_in_memory().expect("open store");
        let values: Vec<u64> = (0..n)
            .map(|_| store.increment_counter().expect("increment"))
            .collect();
        let expected: Vec<u64> = (1..=n as u64).collect();
        prop_assert_eq!(values, expected);
    }

    #[test]
    fn round_trip_preserves_rows(
        rows in prop::collection::vec(
            prop::collection::vec("[A-Za-z0-9 ,.;\"']{0,12}", CANONICAL_COLUMNS.len()),
            0..24,
        )
    ) {
        let mut store = RecordStore::open_in_memory().expect("open store");
        store.replace_all(&rows, &canonical_headers()).expect("replace");
        let table = store.read_all().expect("read");
        prop_assert_eq!(table.rows, rows);
    }
}
