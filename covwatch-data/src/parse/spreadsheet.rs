//! Workbook ingestion: sheet selection, date extraction and row filtering.

use std::io::Cursor;

use calamine::{Reader, Xlsx};
use covwatch_core::APPLICATION_COLUMNS;

use super::{ParseError, ParsedTable, SourceDetails};

/// One worksheet as a grid of display strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    /// Sheet name as shown on its tab.
    pub name: String,
    /// Cell text, row by row.
    pub rows: Vec<Vec<String>>,
}

/// An in-memory workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Build a workbook from already-read sheets.
    #[must_use]
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Read an `.xlsx` container.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Workbook`] when the container cannot be opened
    /// and [`ParseError::Sheet`] when a sheet cannot be read.
    pub fn from_xlsx_bytes(bytes: Vec<u8>) -> Result<Self, ParseError> {
        let mut workbook: Xlsx<_> =
            Xlsx::new(Cursor::new(bytes)).map_err(|source| ParseError::Workbook { source })?;
        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|source| ParseError::Sheet {
                    sheet: name.clone(),
                    source,
                })?;
            let rows = range
                .rows()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect();
            sheets.push(Sheet { name, rows });
        }
        Ok(Self { sheets })
    }

    /// Sheets in workbook order.
    #[must_use]
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// Sheet names in workbook order.
    #[must_use]
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }
}

/// Which sheet was read and what its name revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSelection {
    /// All sheet names in workbook order.
    pub sheet_names: Vec<String>,
    /// Name of the sheet that was read.
    pub active_sheet: String,
    /// One-based position of the sheet that was read.
    pub sheet_index: usize,
    /// `YYYY-MM-DD` token found in the sheet name, if any.
    pub extracted_date: Option<String>,
}

/// Find the first `DDDD-DD-DD` token in a sheet name.
///
/// # Examples
///
/// ```
/// use covwatch_data::parse::extract_date_token;
///
/// assert_eq!(extract_date_token("Export 2024-01-15").as_deref(), Some("2024-01-15"));
/// assert_eq!(extract_date_token("Summary"), None);
/// ```
#[must_use]
pub fn extract_date_token(name: &str) -> Option<String> {
    const PATTERN: &[u8; 10] = b"dddd-dd-dd";
    name.as_bytes()
        .windows(PATTERN.len())
        .position(|window| {
            window.iter().zip(PATTERN).all(|(byte, expected)| match *expected {
                b'd' => byte.is_ascii_digit(),
                other => *byte == other,
            })
        })
        .and_then(|start| name.get(start..start + PATTERN.len()))
        .map(str::to_owned)
}

/// Parse the relevant sheet of a workbook against the application schema.
///
/// The second sheet is read when the workbook has more than one, otherwise
/// the first. Rows whose mapped cells are all empty are dropped.
///
/// # Errors
///
/// Returns [`ParseError::NoSheets`] for a workbook without sheets and
/// [`ParseError::EmptySheet`] when the selected sheet has no header row.
pub fn parse_workbook(workbook: &Workbook) -> Result<ParsedTable, ParseError> {
    let index = if workbook.sheets.len() > 1 { 1 } else { 0 };
    let sheet = workbook.sheets.get(index).ok_or(ParseError::NoSheets)?;
    let header = sheet.rows.first().ok_or_else(|| ParseError::EmptySheet {
        sheet: sheet.name.clone(),
    })?;
    let mapping = APPLICATION_COLUMNS.map_headers(header);

    let rows = sheet
        .rows
        .iter()
        .skip(1)
        .map(|cells| {
            let trimmed: Vec<&str> = cells.iter().map(|cell| cell.trim()).collect();
            mapping.project(&trimmed)
        })
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    let selection = SheetSelection {
        sheet_names: workbook.sheet_names(),
        active_sheet: sheet.name.clone(),
        sheet_index: index + 1,
        extracted_date: extract_date_token(&sheet.name),
    };
    log::debug!(
        "reading sheet {:?} ({} of {})",
        selection.active_sheet,
        selection.sheet_index,
        selection.sheet_names.len()
    );
    Ok(ParsedTable::from_mapping(
        &mapping,
        rows,
        SourceDetails::Spreadsheet(selection),
    ))
}
