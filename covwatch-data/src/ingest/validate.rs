//! Post-parse shape checks.

use std::collections::HashSet;
use std::fmt;

use crate::parse::ParsedTable;

/// Which post-parse check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureCheck {
    /// The parser produced no headers.
    NoHeaders,
    /// The parser produced no rows.
    NoRows,
    /// A header name appears more than once (ignoring case).
    DuplicateHeader {
        /// The repeated header.
        name: String,
    },
    /// A row does not have one cell per header.
    RaggedRow {
        /// Zero-based row index.
        index: usize,
        /// Cells in the row.
        cells: usize,
        /// Expected cell count.
        expected: usize,
    },
}

impl fmt::Display for StructureCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHeaders => f.write_str("headers must be a non-empty sequence"),
            Self::NoRows => f.write_str("rows must be a non-empty sequence"),
            Self::DuplicateHeader { name } => write!(f, "header {name:?} appears more than once"),
            Self::RaggedRow {
                index,
                cells,
                expected,
            } => write!(f, "row {index} has {cells} cells, expected {expected}"),
        }
    }
}

pub(crate) fn check_structure(table: &ParsedTable) -> Result<(), StructureCheck> {
    if table.headers.is_empty() {
        return Err(StructureCheck::NoHeaders);
    }
    if table.rows.is_empty() {
        return Err(StructureCheck::NoRows);
    }
    let mut seen = HashSet::with_capacity(table.headers.len());
    if let Some(name) = table
        .headers
        .iter()
        .find(|header| !seen.insert(header.trim().to_lowercase()))
    {
        return Err(StructureCheck::DuplicateHeader { name: name.clone() });
    }
    let expected = table.headers.len();
    if let Some((index, row)) = table
        .rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != expected)
    {
        return Err(StructureCheck::RaggedRow {
            index,
            cells: row.len(),
            expected,
        });
    }
    Ok(())
}
