//! Synthetic records for exercising the dashboard without an export.

use covwatch_core::{Criticality, FLAG_NO, FLAG_YES, Record};
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::consolidate::PrefixVocabulary;
use crate::dashboard::{Dashboard, DashboardError};
use crate::mirror::{KeyValueStorage, MirrorError};
use crate::store::StoreError;

const APPLICATION_NAMES: [&str; 8] = [
    "Billing", "Ledger", "Payroll", "Catalogue", "Dispatch", "Portal", "Archive", "Gateway",
];

const DEPARTMENTS: [&str; 5] = ["Finance", "Operations", "Retail", "Logistics", "IT"];

/// Errors raised while appending synthetic rows.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The counter or the insert failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Mirroring the counter failed.
    #[error(transparent)]
    Mirror(#[from] MirrorError),
    /// Mirroring the appended rows failed.
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, choices: &[&'a str]) -> &'a str {
    choices.choose(rng).copied().unwrap_or_default()
}

fn flag<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    if rng.gen_bool(0.5) { FLAG_YES } else { FLAG_NO }
}

/// One plausible record whose name and code carry `ordinal`.
fn random_record<R: Rng + ?Sized>(rng: &mut R, ordinal: u64) -> Record {
    let mut identifiers = vec!["DP"];
    identifiers.extend(PrefixVocabulary::Codes.prefixes());
    let criticality = Criticality::ALL
        .choose(rng)
        .copied()
        .unwrap_or(Criticality::Critical);
    Record {
        dx: pick(rng, &identifiers).to_owned(),
        app_appli: format!("{} {ordinal}", pick(rng, &APPLICATION_NAMES)),
        app_code: format!("GEN{ordinal:05}"),
        operator_department: pick(rng, &DEPARTMENTS).to_owned(),
        business_criticality: criticality.as_str().to_owned(),
        functional_monitoring: flag(rng).to_owned(),
        in_hcc: flag(rng).to_owned(),
        hcc_eligibility: flag(rng).to_owned(),
    }
}

/// Append `count` random records, then mirror the rows and the counter.
///
/// Each record takes its ordinal from the store's counter, so names stay
/// unique across invocations.
///
/// # Errors
///
/// Returns [`GenerateError`] when the counter, an insert or a mirror write
/// fails. Rows appended before the failure stay in the store.
pub fn append_random_rows<S, R>(
    dashboard: &mut Dashboard<S>,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Record>, GenerateError>
where
    S: KeyValueStorage,
    R: Rng + ?Sized,
{
    let mut appended = Vec::with_capacity(count);
    let mut last = None;
    for _ in 0..count {
        let ordinal = dashboard.store_mut().increment_counter()?;
        let record = random_record(rng, ordinal);
        dashboard.store_mut().insert_record(record.clone())?;
        appended.push(record);
        last = Some(ordinal);
    }
    if let Some(counter) = last {
        dashboard.mirror_records()?;
        dashboard.mirror_mut().save_counter(counter)?;
        log::info!("appended {count} synthetic records; counter now {counter}");
    }
    Ok(appended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::MemoryStorage;
    use crate::store::RecordStore;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rstest::{fixture, rstest};

    #[fixture]
    fn dashboard() -> Dashboard<MemoryStorage> {
        Dashboard::new(
            RecordStore::open_in_memory().expect("open store"),
            MemoryStorage::new(),
        )
    }

    #[rstest]
    fn appends_rows_with_increasing_ordinals(mut dashboard: Dashboard<MemoryStorage>) {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let first = append_random_rows(&mut dashboard, 3, &mut rng).expect("first batch");
        let second = append_random_rows(&mut dashboard, 2, &mut rng).expect("second batch");

        let codes: Vec<&str> = first
            .iter()
            .chain(&second)
            .map(|record| record.app_code.as_str())
            .collect();
        assert_eq!(codes, ["GEN00001", "GEN00002", "GEN00003", "GEN00004", "GEN00005"]);
        assert_eq!(dashboard.store().record_count().expect("count"), 5);
        assert_eq!(dashboard.mirror().load_counter().expect("counter"), Some(5));
        let mirrored = dashboard.mirror().load_data().expect("load").expect("snapshot");
        assert_eq!(mirrored.rows.len(), 5);
    }

    #[rstest]
    fn generated_values_stay_in_vocabulary(mut dashboard: Dashboard<MemoryStorage>) {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for record in append_random_rows(&mut dashboard, 50, &mut rng).expect("generate") {
            assert!(record.criticality().is_some());
            assert!(record.dx.starts_with("DP"));
            for value in [&record.functional_monitoring, &record.in_hcc, &record.hcc_eligibility] {
                assert!(value == FLAG_YES || value == FLAG_NO);
            }
        }
    }

    #[rstest]
    fn zero_rows_leave_the_mirror_untouched(mut dashboard: Dashboard<MemoryStorage>) {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let appended = append_random_rows(&mut dashboard, 0, &mut rng).expect("generate");
        assert!(appended.is_empty());
        assert_eq!(dashboard.mirror().load_counter().expect("counter"), None);
        assert!(dashboard.mirror().load_data().expect("load").is_none());
    }
}
