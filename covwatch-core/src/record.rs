//! Canonical monitoring record schema.
//!
//! Every ingested row is normalised into [`Record`], a fixed eight-field
//! shape. Columns absent from the source are represented by empty strings so
//! downstream predicates always see a value.

use std::fmt;

/// Identifier or prefix code of the owning entity.
pub const COLUMN_DX: &str = "Dx";
/// Application display name.
pub const COLUMN_APP_APPLI: &str = "App Appli";
/// Application code.
pub const COLUMN_APP_CODE: &str = "App Code";
/// Operating department.
pub const COLUMN_OPERATOR_DEPARTMENT: &str = "Operator/Department";
/// Business criticality (`Critical`, `High`, `Medium`, `Low`).
pub const COLUMN_BUSINESS_CRITICALITY: &str = "Business criticality";
/// Functional monitoring flag (`YES`/`NO`).
pub const COLUMN_FUNCTIONAL_MONITORING: &str = "Functional monitoring (BSM)";
/// Whether the application is onboarded in HCC (`YES`/`NO`).
pub const COLUMN_IN_HCC: &str = "In HCC";
/// Whether the application is eligible for HCC (`YES`/`NO`).
pub const COLUMN_HCC_ELIGIBILITY: &str = "HCC eligibility";

/// Canonical column order used for positional inserts.
pub const CANONICAL_COLUMNS: [&str; 8] = [
    COLUMN_DX,
    COLUMN_APP_APPLI,
    COLUMN_APP_CODE,
    COLUMN_OPERATOR_DEPARTMENT,
    COLUMN_BUSINESS_CRITICALITY,
    COLUMN_FUNCTIONAL_MONITORING,
    COLUMN_IN_HCC,
    COLUMN_HCC_ELIGIBILITY,
];

/// One monitored application or service entry.
///
/// # Examples
///
/// ```
/// use covwatch_core::{COLUMN_DX, COLUMN_IN_HCC, Record};
///
/// let headers = vec![COLUMN_IN_HCC.to_owned(), "Unrelated".to_owned(), COLUMN_DX.to_owned()];
/// let cells = vec!["YES".to_owned(), "dropped".to_owned(), "DP".to_owned()];
/// let record = Record::from_positional(&headers, &cells);
///
/// assert_eq!(record.dx, "DP");
/// assert_eq!(record.in_hcc, "YES");
/// assert_eq!(record.app_code, "");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    /// Identifier or prefix code.
    #[cfg_attr(feature = "serde", serde(rename = "Dx", default))]
    pub dx: String,
    /// Application display name.
    #[cfg_attr(feature = "serde", serde(rename = "App Appli", default))]
    pub app_appli: String,
    /// Application code.
    #[cfg_attr(feature = "serde", serde(rename = "App Code", default))]
    pub app_code: String,
    /// Operating department.
    #[cfg_attr(feature = "serde", serde(rename = "Operator/Department", default))]
    pub operator_department: String,
    /// Business criticality as written in the source.
    #[cfg_attr(feature = "serde", serde(rename = "Business criticality", default))]
    pub business_criticality: String,
    /// Functional monitoring (BSM) flag as written in the source.
    #[cfg_attr(feature = "serde", serde(rename = "Functional monitoring (BSM)", default))]
    pub functional_monitoring: String,
    /// HCC onboarding flag as written in the source.
    #[cfg_attr(feature = "serde", serde(rename = "In HCC", default))]
    pub in_hcc: String,
    /// HCC eligibility flag as written in the source.
    #[cfg_attr(feature = "serde", serde(rename = "HCC eligibility", default))]
    pub hcc_eligibility: String,
}

impl Record {
    /// Build a record by matching `headers` against the canonical column names.
    ///
    /// Cells whose header is not canonical are dropped; canonical columns
    /// missing from `headers` stay empty. When a header repeats, the last
    /// occurrence wins.
    #[must_use]
    pub fn from_positional<H, C>(headers: &[H], cells: &[C]) -> Self
    where
        H: AsRef<str>,
        C: AsRef<str>,
    {
        let mut record = Self::default();
        for (header, cell) in headers.iter().zip(cells) {
            if let Some(slot) = record.field_mut(header.as_ref()) {
                cell.as_ref().clone_into(slot);
            }
        }
        record
    }

    /// Look up a field by its canonical column name.
    #[must_use]
    pub fn field(&self, column: &str) -> Option<&str> {
        let value = match column {
            COLUMN_DX => &self.dx,
            COLUMN_APP_APPLI => &self.app_appli,
            COLUMN_APP_CODE => &self.app_code,
            COLUMN_OPERATOR_DEPARTMENT => &self.operator_department,
            COLUMN_BUSINESS_CRITICALITY => &self.business_criticality,
            COLUMN_FUNCTIONAL_MONITORING => &self.functional_monitoring,
            COLUMN_IN_HCC => &self.in_hcc,
            COLUMN_HCC_ELIGIBILITY => &self.hcc_eligibility,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn field_mut(&mut self, column: &str) -> Option<&mut String> {
        let value = match column {
            COLUMN_DX => &mut self.dx,
            COLUMN_APP_APPLI => &mut self.app_appli,
            COLUMN_APP_CODE => &mut self.app_code,
            COLUMN_OPERATOR_DEPARTMENT => &mut self.operator_department,
            COLUMN_BUSINESS_CRITICALITY => &mut self.business_criticality,
            COLUMN_FUNCTIONAL_MONITORING => &mut self.functional_monitoring,
            COLUMN_IN_HCC => &mut self.in_hcc,
            COLUMN_HCC_ELIGIBILITY => &mut self.hcc_eligibility,
            _ => return None,
        };
        Some(value)
    }

    /// Field values in [`CANONICAL_COLUMNS`] order.
    #[must_use]
    pub fn values(&self) -> [&str; 8] {
        [
            &self.dx,
            &self.app_appli,
            &self.app_code,
            &self.operator_department,
            &self.business_criticality,
            &self.functional_monitoring,
            &self.in_hcc,
            &self.hcc_eligibility,
        ]
        .map(String::as_str)
    }

    /// Parsed business criticality, if recognised.
    #[must_use]
    pub fn criticality(&self) -> Option<Criticality> {
        Criticality::parse(&self.business_criticality)
    }
}

/// Recognised business criticality levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criticality {
    /// Business critical.
    Critical,
    /// High criticality.
    High,
    /// Medium criticality.
    Medium,
    /// Low criticality.
    Low,
}

impl Criticality {
    /// Every level, most critical first.
    pub const ALL: [Self; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    /// Parse a criticality label case-insensitively.
    ///
    /// ```
    /// use covwatch_core::Criticality;
    ///
    /// assert_eq!(Criticality::parse(" critical "), Some(Criticality::Critical));
    /// assert_eq!(Criticality::parse("urgent"), None);
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(trimmed))
    }

    /// Canonical spelling used when writing records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical spelling of a positive flag.
pub const FLAG_YES: &str = "YES";
/// Canonical spelling of a negative flag.
pub const FLAG_NO: &str = "NO";
