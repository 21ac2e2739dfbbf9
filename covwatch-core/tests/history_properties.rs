//! Property tests for the consolidation history rules.

use chrono::{Days, NaiveDate, TimeZone, Utc};
use covwatch_core::{ConsolidationHistory, ConsolidationSnapshot, CoverageMetric, HistoryUpdate};
use proptest::prelude::*;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid base date")
}

fn snapshot_for(offset: u64, total: u64) -> ConsolidationSnapshot {
    ConsolidationSnapshot {
        date: base_date()
            .checked_add_days(Days::new(offset))
            .expect("date within range"),
        total_critiques: total,
        monitored_bsm: CoverageMetric::of(total, total),
        still_to_monitor: CoverageMetric::default(),
        not_required_bsm: CoverageMetric::default(),
        monitored_hcc: CoverageMetric::default(),
        not_required_hcc: CoverageMetric::default(),
        sections: Default::default(),
        timestamp: Utc
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp"),
    }
}

fn day_offset(entry: &ConsolidationSnapshot) -> u64 {
    u64::try_from((entry.date - base_date()).num_days()).expect("dates after the base date")
}

proptest! {
    #[test]
    fn cap_keeps_the_most_recent_entries(cap in 1u64..12, extra in 0u64..12) {
        let cap_len = usize::try_from(cap).expect("small cap");
        let mut history = ConsolidationHistory::new(cap_len);
        let inserted = cap + extra;
        for offset in 0..inserted {
            let update = history.record(snapshot_for(offset, 1));
            prop_assert_eq!(update, HistoryUpdate::Inserted);
        }

        prop_assert_eq!(history.len(), cap_len);
        let expected: Vec<u64> = (extra..inserted).rev().collect();
        let retained: Vec<u64> = history.entries().iter().map(day_offset).collect();
        prop_assert_eq!(retained, expected);
    }

    #[test]
    fn same_date_overwrites_in_place(first in 0u64..100, second in 0u64..100) {
        let mut history = ConsolidationHistory::new(5);
        history.record(snapshot_for(1, 0));
        history.record(snapshot_for(2, first));
        history.record(snapshot_for(3, 0));

        let update = history.record(snapshot_for(2, second));

        prop_assert_eq!(update, HistoryUpdate::Replaced);
        prop_assert_eq!(history.len(), 3);
        prop_assert_eq!(&history.entries()[1], &snapshot_for(2, second));
    }
}

#[test]
fn rebuilding_from_entries_drops_duplicate_dates_and_applies_cap() {
    let entries = vec![
        snapshot_for(3, 3),
        snapshot_for(2, 2),
        snapshot_for(3, 99),
        snapshot_for(1, 1),
    ];
    let history = ConsolidationHistory::from_entries(entries, 2);

    assert_eq!(history.len(), 2);
    assert_eq!(history.entries()[0].total_critiques, 3);
    assert_eq!(history.entries()[1].total_critiques, 2);
}

#[test]
fn zero_cap_is_raised_to_one() {
    let mut history = ConsolidationHistory::new(0);
    history.record(snapshot_for(1, 1));
    history.record(snapshot_for(2, 2));
    assert_eq!(history.cap(), 1);
    assert_eq!(history.latest().map(|entry| entry.total_critiques), Some(2));
}
