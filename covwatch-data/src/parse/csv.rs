//! Semicolon-delimited exports with quote-aware field splitting.

use covwatch_core::{APPLICATION_COLUMNS, ColumnMapping, ColumnTable, KNOWN_TABLES, MappedColumn};

use super::{ParseError, ParsedTable, SourceDetails};

/// Delimiter used by the upstream exports.
pub const DEFAULT_DELIMITER: char = ';';

/// Options for CSV parsing.
#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    /// Field delimiter.
    pub delimiter: char,
    /// Column tables tried against the header row; the best match wins.
    pub tables: &'static [&'static ColumnTable],
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            tables: &KNOWN_TABLES,
        }
    }
}

/// Split one line into raw fields.
///
/// Double quotes toggle an in-quotes state in which the delimiter is taken
/// literally. Quote characters stay in the field text. A trailing field is
/// emitted only when it has content or earlier fields exist, so an empty
/// line yields no fields.
///
/// # Examples
///
/// ```
/// use covwatch_data::parse::split_line;
///
/// assert_eq!(split_line(r#"a;"b;c";d"#, ';'), ["a", r#""b;c""#, "d"]);
/// assert_eq!(split_line("a;", ';'), ["a", ""]);
/// assert!(split_line("", ';').is_empty());
/// ```
#[must_use]
pub fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
            current.push(ch);
        } else if ch == delimiter && !in_quotes {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() || !fields.is_empty() {
        fields.push(current);
    }
    fields
}

/// Trim a raw field and remove its wrapping quotes.
pub(crate) fn clean_field(raw: &str) -> String {
    let trimmed = raw.trim();
    let unwrapped = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let unwrapped = unwrapped.strip_suffix('"').unwrap_or(unwrapped);
    unwrapped.replace("\"\"", "\"").trim().to_owned()
}

fn is_decimal_column(column: &MappedColumn) -> bool {
    column.mentions("EUR")
        || column.canonical == "Montant"
        || column.source_name.as_deref() == Some("Montant")
}

/// Header-derived state shared by the plain and batched parsers.
#[derive(Debug)]
pub(crate) struct CsvRowBuilder {
    mapping: ColumnMapping,
    decimal_columns: Vec<bool>,
    delimiter: char,
}

impl CsvRowBuilder {
    pub(crate) fn from_header(line: &str, options: &CsvOptions) -> Self {
        let raw_headers: Vec<String> = split_line(line, options.delimiter)
            .iter()
            .map(|field| clean_field(field))
            .collect();
        let mapping = ColumnMapping::best_of(options.tables, &raw_headers)
            .unwrap_or_else(|| APPLICATION_COLUMNS.map_headers(&raw_headers));
        let decimal_columns = mapping.columns().iter().map(is_decimal_column).collect();
        Self {
            mapping,
            decimal_columns,
            delimiter: options.delimiter,
        }
    }

    /// Build one canonical row, or `None` for blank lines.
    pub(crate) fn build_row(&self, line: &str) -> Option<Vec<String>> {
        if line.trim().is_empty() {
            return None;
        }
        let cells: Vec<String> = split_line(line, self.delimiter)
            .iter()
            .map(|field| clean_field(field))
            .collect();
        let mut row = self.mapping.project(&cells);
        for (cell, decimal) in row.iter_mut().zip(&self.decimal_columns) {
            if *decimal && cell.contains(',') {
                *cell = cell.replace(',', ".");
            }
        }
        Some(row)
    }

    pub(crate) fn finish(&self, rows: Vec<Vec<String>>, source: SourceDetails) -> ParsedTable {
        ParsedTable::from_mapping(&self.mapping, rows, source)
    }

    pub(crate) const fn delimiter(&self) -> char {
        self.delimiter
    }
}

/// Split a document into its header line and data lines.
pub(crate) fn header_and_body(text: &str) -> Result<(&str, std::str::Lines<'_>), ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::EmptyFile);
    }
    let mut lines = text.lines();
    let header = lines.next().ok_or(ParseError::EmptyFile)?;
    Ok((header, lines))
}

/// Parse a whole CSV document in one pass.
///
/// Line 0 is the header row. Blank data lines are skipped. Amounts in
/// columns mentioning `EUR` (or named `Montant`) have their decimal comma
/// replaced by a point.
///
/// # Errors
///
/// Returns [`ParseError::EmptyFile`] when the document holds only
/// whitespace.
pub fn parse_csv_document(text: &str, options: &CsvOptions) -> Result<ParsedTable, ParseError> {
    let (header, body) = header_and_body(text)?;
    let builder = CsvRowBuilder::from_header(header, options);
    let rows = body.filter_map(|line| builder.build_row(line)).collect();
    Ok(builder.finish(
        rows,
        SourceDetails::Csv {
            separator: builder.delimiter(),
            batches: None,
        },
    ))
}
