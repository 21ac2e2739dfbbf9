//! Tolerant column mapping from observed headers to a canonical schema.
//!
//! A [`ColumnTable`] lists, for each canonical column, the header spellings
//! seen in real exports: casing variants, punctuation variants, historical
//! aliases and mojibake produced by mis-decoded Latin-1 files. Mapping walks
//! the canonical columns (not the observed ones), so one observed column can
//! never be claimed twice by the search order. Canonical columns that find no
//! match are kept and project to empty cells.

use crate::record::{
    COLUMN_APP_APPLI, COLUMN_APP_CODE, COLUMN_BUSINESS_CRITICALITY, COLUMN_DX,
    COLUMN_FUNCTIONAL_MONITORING, COLUMN_HCC_ELIGIBILITY, COLUMN_IN_HCC,
    COLUMN_OPERATOR_DEPARTMENT,
};

/// Canonical column together with the spellings accepted for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Name used in the canonical output.
    pub canonical: &'static str,
    /// Accepted header spellings, searched in order.
    pub variants: &'static [&'static str],
}

/// Ordered set of canonical columns with their accepted variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnTable {
    /// Short identifier used in logs.
    pub name: &'static str,
    /// Canonical columns in output order.
    pub columns: &'static [ColumnSpec],
}

/// Transaction exports (`;`-separated CSV with French headers).
pub static TRANSACTION_COLUMNS: ColumnTable = ColumnTable {
    name: "transactions",
    columns: &[
        ColumnSpec {
            canonical: "Date",
            variants: &["Date", "Date opération", "Date operation", "Date opÃ©ration"],
        },
        ColumnSpec {
            canonical: "Heure",
            variants: &["Heure", "Time", "Hour"],
        },
        ColumnSpec {
            canonical: "Dossier",
            variants: &["Dossier", "N° dossier", "No dossier", "Folder"],
        },
        ColumnSpec {
            canonical: "Type",
            variants: &["Type", "Type opération", "Type operation"],
        },
        ColumnSpec {
            canonical: "Operateur",
            variants: &[
                "Opér.",
                "Opér",
                "Oper.",
                "Oper",
                "OpÃ©r.",
                "Op\u{FFFD}r.",
                "Opérateur",
                "Operateur",
            ],
        },
        ColumnSpec {
            canonical: "Client",
            variants: &["Client", "Nom client", "Customer"],
        },
        ColumnSpec {
            canonical: "Montant",
            variants: &["Mont., EUR", "Mont. EUR", "Montant", "Montant, EUR", "Montant EUR"],
        },
        ColumnSpec {
            canonical: "Commission EUR",
            variants: &[
                "Dif./EnCom., EUR",
                "Dif./EnCom. EUR",
                "Dif/EnCom, EUR",
                "Commission, EUR",
                "Commission EUR",
            ],
        },
    ],
};

/// Application inventory exports (the primary record schema).
pub static APPLICATION_COLUMNS: ColumnTable = ColumnTable {
    name: "applications",
    columns: &[
        ColumnSpec {
            canonical: COLUMN_DX,
            variants: &["Dx", "DX code", "Direction"],
        },
        ColumnSpec {
            canonical: COLUMN_APP_APPLI,
            variants: &["App Appli", "Application", "Application name", "Appli"],
        },
        ColumnSpec {
            canonical: COLUMN_APP_CODE,
            variants: &["App Code", "Application code", "Code appli", "AppCode"],
        },
        ColumnSpec {
            canonical: COLUMN_OPERATOR_DEPARTMENT,
            variants: &[
                "Operator/Department",
                "Operator / Department",
                "Opérateur/Département",
                "OpÃ©rateur/DÃ©partement",
                "Department",
                "Operator",
            ],
        },
        ColumnSpec {
            canonical: COLUMN_BUSINESS_CRITICALITY,
            variants: &[
                "Business criticality",
                "Business criticity",
                "Criticality",
                "Criticité métier",
                "CriticitÃ© mÃ©tier",
            ],
        },
        ColumnSpec {
            canonical: COLUMN_FUNCTIONAL_MONITORING,
            variants: &[
                "Functional monitoring (BSM)",
                "Functional monitoring(BSM)",
                "Functional monitoring",
                "BSM",
            ],
        },
        ColumnSpec {
            canonical: COLUMN_IN_HCC,
            variants: &["In HCC", "In HCC ?", "In HCC?", "HCC"],
        },
        ColumnSpec {
            canonical: COLUMN_HCC_ELIGIBILITY,
            variants: &["HCC eligibility", "HCC eligible", "Eligible HCC", "HCC eligibilty"],
        },
    ],
};

/// Tables tried, in order, for inputs that do not name their schema.
pub static KNOWN_TABLES: [&ColumnTable; 2] = [&TRANSACTION_COLUMNS, &APPLICATION_COLUMNS];

/// Resolution of one canonical column against the observed headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedColumn {
    /// Canonical column name.
    pub canonical: &'static str,
    /// Position of the matching observed header, if any.
    pub source_index: Option<usize>,
    /// Observed header text (trimmed), if any.
    pub source_name: Option<String>,
}

impl MappedColumn {
    /// Whether the canonical column or its observed header contains `needle`.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        self.canonical.contains(needle)
            || self
                .source_name
                .as_deref()
                .is_some_and(|name| name.contains(needle))
    }
}

/// Result of mapping observed headers onto a [`ColumnTable`].
///
/// # Examples
///
/// ```
/// use covwatch_core::TRANSACTION_COLUMNS;
///
/// let mapping = TRANSACTION_COLUMNS.map_headers(&["DATE", "Opér.", "Unknown"]);
/// let row = mapping.project(&["2024-01-15", "5", "ignored"]);
///
/// assert_eq!(mapping.headers()[..2], ["Date", "Heure"]);
/// assert_eq!(row[0], "2024-01-15");
/// assert_eq!(row[1], "");
/// assert_eq!(row[4], "5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    table: &'static ColumnTable,
    columns: Vec<MappedColumn>,
}

impl ColumnTable {
    /// Map observed headers onto this table.
    ///
    /// For each canonical column the variants are tried in order and the
    /// first observed header equal to a variant (ignoring case and
    /// surrounding whitespace) wins.
    #[must_use]
    pub fn map_headers<S: AsRef<str>>(&'static self, observed: &[S]) -> ColumnMapping {
        let normalised: Vec<String> = observed
            .iter()
            .map(|header| normalise_header(header.as_ref()))
            .collect();
        let columns = self
            .columns
            .iter()
            .map(|spec| {
                let source_index = spec.variants.iter().find_map(|variant| {
                    let wanted = variant.to_lowercase();
                    normalised.iter().position(|header| *header == wanted)
                });
                let source_name = source_index
                    .and_then(|index| observed.get(index))
                    .map(|header| clean_header(header.as_ref()).to_owned());
                MappedColumn {
                    canonical: spec.canonical,
                    source_index,
                    source_name,
                }
            })
            .collect();
        ColumnMapping {
            table: self,
            columns,
        }
    }

    /// Canonical column names in output order.
    #[must_use]
    pub fn canonical_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|spec| spec.canonical).collect()
    }
}

impl ColumnMapping {
    /// Pick the table that matches the most observed headers.
    ///
    /// Ties keep the earlier table.
    #[must_use]
    pub fn best_of<S: AsRef<str>>(tables: &[&'static ColumnTable], observed: &[S]) -> Option<Self> {
        let mut best: Option<Self> = None;
        for table in tables {
            let candidate = table.map_headers(observed);
            let better = best
                .as_ref()
                .is_none_or(|current| candidate.matched_count() > current.matched_count());
            if better {
                best = Some(candidate);
            }
        }
        best
    }

    /// Table this mapping was computed against.
    #[must_use]
    pub const fn table(&self) -> &'static ColumnTable {
        self.table
    }

    /// Per-column resolution, in canonical order.
    #[must_use]
    pub fn columns(&self) -> &[MappedColumn] {
        &self.columns
    }

    /// Canonical header names, in canonical order.
    #[must_use]
    pub fn headers(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| column.canonical.to_owned())
            .collect()
    }

    /// Number of canonical columns that found an observed header.
    #[must_use]
    pub fn matched_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|column| column.source_index.is_some())
            .count()
    }

    /// Canonical columns with no observed counterpart.
    pub fn missing(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .filter(|column| column.source_index.is_none())
            .map(|column| column.canonical)
    }

    /// Project raw cells onto the canonical columns.
    ///
    /// The result always has one cell per canonical column; unmapped columns
    /// and cells beyond the end of `cells` become empty strings.
    #[must_use]
    pub fn project<S: AsRef<str>>(&self, cells: &[S]) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| {
                column
                    .source_index
                    .and_then(|index| cells.get(index))
                    .map(|cell| cell.as_ref().to_owned())
                    .unwrap_or_default()
            })
            .collect()
    }
}

fn clean_header(raw: &str) -> &str {
    raw.trim_start_matches('\u{feff}').trim()
}

fn normalise_header(raw: &str) -> String {
    clean_header(raw).to_lowercase()
}
