//! Consolidated coverage metrics for one calendar date.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

/// Section key carrying the primary `DP` figures.
pub const DP_SECTION: &str = "dp";

/// Rounded share of `part` in `total`, as a whole percentage.
///
/// Halves round up, and an empty `total` yields `0` rather than faulting.
///
/// ```
/// use covwatch_core::percentage;
///
/// assert_eq!(percentage(2, 3), 67);
/// assert_eq!(percentage(1, 8), 13);
/// assert_eq!(percentage(5, 0), 0);
/// ```
#[must_use]
pub fn percentage(part: u64, total: u64) -> u64 {
    let doubled_total = u128::from(total) * 2;
    let scaled = u128::from(part) * 200 + u128::from(total);
    scaled
        .checked_div(doubled_total)
        .and_then(|value| u64::try_from(value).ok())
        .unwrap_or(0)
}

/// A subset count with its share of the critical universe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoverageMetric {
    /// Number of matching records.
    pub count: u64,
    /// Rounded percentage of the critical universe.
    pub percentage: u64,
}

impl CoverageMetric {
    /// Build a metric for `count` out of `total`.
    #[must_use]
    pub fn of(count: u64, total: u64) -> Self {
        Self {
            count,
            percentage: percentage(count, total),
        }
    }
}

/// Figures reported for one section of the snapshot.
///
/// The `dp` section reports onboarding figures while the per-prefix sections
/// report raw totals; the two shapes are deliberately different.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum SectionMetrics {
    /// Primary `dp` section.
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    Primary {
        /// Size of the critical universe.
        critical_business_services: u64,
        /// Critical services not yet onboarded in HCC.
        still_to_onboard: u64,
    },
    /// One of the per-prefix sections.
    Prefix {
        /// Critical records carrying the prefix code.
        total: u64,
        /// Of those, records with functional monitoring.
        monitored: u64,
    },
}

/// One computed result set for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ConsolidationSnapshot {
    /// Calendar date the snapshot stands for; history is deduplicated on it.
    pub date: NaiveDate,
    /// Size of the critical universe.
    pub total_critiques: u64,
    /// Critical records with functional monitoring.
    #[cfg_attr(feature = "serde", serde(rename = "monitoredBSM"))]
    pub monitored_bsm: CoverageMetric,
    /// Critical records not yet in HCC.
    pub still_to_monitor: CoverageMetric,
    /// Critical records needing neither BSM nor HCC.
    #[cfg_attr(feature = "serde", serde(rename = "notRequiredBSM"))]
    pub not_required_bsm: CoverageMetric,
    /// Critical records onboarded in HCC.
    #[cfg_attr(feature = "serde", serde(rename = "monitoredHCC"))]
    pub monitored_hcc: CoverageMetric,
    /// Critical records outside HCC and not eligible for it.
    #[cfg_attr(feature = "serde", serde(rename = "notRequiredHCC"))]
    pub not_required_hcc: CoverageMetric,
    /// Per-section figures keyed by section name (`dp`, `dpa`..`dps`).
    pub sections: BTreeMap<String, SectionMetrics>,
    /// When the snapshot was computed.
    pub timestamp: DateTime<Utc>,
}

impl ConsolidationSnapshot {
    /// Figures for a named section.
    #[must_use]
    pub fn section(&self, key: &str) -> Option<&SectionMetrics> {
        self.sections.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, 0)]
    #[case(3, 0, 0)]
    #[case(0, 7, 0)]
    #[case(1, 2, 50)]
    #[case(1, 3, 33)]
    #[case(2, 3, 67)]
    #[case(1, 200, 1)]
    #[case(1, 201, 0)]
    #[case(9, 9, 100)]
    fn percentage_rounds_to_nearest(#[case] part: u64, #[case] total: u64, #[case] expected: u64) {
        assert_eq!(percentage(part, total), expected);
    }

    #[rstest]
    fn percentage_survives_large_inputs() {
        assert_eq!(percentage(u64::MAX, u64::MAX), 100);
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn sections_serialise_with_distinct_shapes() {
        let primary = SectionMetrics::Primary {
            critical_business_services: 3,
            still_to_onboard: 1,
        };
        let prefix = SectionMetrics::Prefix {
            total: 4,
            monitored: 2,
        };
        let primary_json = serde_json::to_value(primary).expect("serialise primary");
        let prefix_json = serde_json::to_value(prefix).expect("serialise prefix");

        assert_eq!(
            primary_json,
            serde_json::json!({"criticalBusinessServices": 3, "stillToOnboard": 1})
        );
        assert_eq!(prefix_json, serde_json::json!({"total": 4, "monitored": 2}));

        let decoded: SectionMetrics = serde_json::from_value(primary_json).expect("decode primary");
        assert_eq!(decoded, primary);
    }
}
