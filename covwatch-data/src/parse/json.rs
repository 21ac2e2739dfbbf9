//! `{ "headers": [...], "rows": [...] }` table documents.

use covwatch_core::{APPLICATION_COLUMNS, ColumnMapping, KNOWN_TABLES};
use serde::Deserialize;
use serde_json::Value;

use super::{ParseError, ParsedTable, SourceDetails};

#[derive(Debug, Deserialize)]
struct RawTable {
    headers: Vec<String>,
    rows: Vec<Value>,
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.trim().to_owned(),
        other => other.to_string(),
    }
}

fn row_cells(row: &Value, headers: &[String]) -> Result<Vec<String>, ParseError> {
    match row {
        Value::Array(items) => Ok(items.iter().map(scalar_text).collect()),
        Value::Object(fields) => Ok(headers
            .iter()
            .map(|header| fields.get(header).map(scalar_text).unwrap_or_default())
            .collect()),
        _ => Err(ParseError::JsonShape {
            reason: "rows must contain arrays or objects",
        }),
    }
}

/// Parse a JSON table document.
///
/// Rows may be positional arrays or objects keyed by header name.
///
/// # Errors
///
/// Returns [`ParseError::Json`] for malformed JSON and
/// [`ParseError::JsonShape`] when `headers` or `rows` is empty or a row is
/// neither an array nor an object.
pub fn parse_json_table(text: &str) -> Result<ParsedTable, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::EmptyFile);
    }
    let raw: RawTable =
        serde_json::from_str(text).map_err(|source| ParseError::Json { source })?;
    if raw.headers.is_empty() {
        return Err(ParseError::JsonShape {
            reason: "headers must be a non-empty array",
        });
    }
    if raw.rows.is_empty() {
        return Err(ParseError::JsonShape {
            reason: "rows must be a non-empty array",
        });
    }

    let mapping = ColumnMapping::best_of(&KNOWN_TABLES, &raw.headers)
        .unwrap_or_else(|| APPLICATION_COLUMNS.map_headers(&raw.headers));
    let rows = raw
        .rows
        .iter()
        .map(|row| row_cells(row, &raw.headers).map(|cells| mapping.project(&cells)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ParsedTable::from_mapping(&mapping, rows, SourceDetails::Json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn parses_array_rows() {
        let text = r#"{"headers":["Dx","App Appli","Business criticality"],
                       "rows":[["DPA","Billing","Critical"],["DPB",null,3]]}"#;
        let table = parse_json_table(text).expect("parse json");
        assert_eq!(table.table, "applications");
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[1][1], "");
        assert_eq!(table.rows[1][4], "3");
    }

    #[rstest]
    fn parses_object_rows() {
        let text = r#"{"headers":["Dx","In HCC"],"rows":[{"Dx":"DPS","In HCC":"YES"}]}"#;
        let table = parse_json_table(text).expect("parse json");
        let row = table.rows.first().expect("row");
        assert_eq!(row[0], "DPS");
        assert_eq!(row[6], "YES");
    }

    #[rstest]
    #[case(r#"{"headers":[],"rows":[["a"]]}"#)]
    #[case(r#"{"headers":["Dx"],"rows":[]}"#)]
    #[case(r#"{"headers":["Dx"],"rows":["DPA"]}"#)]
    fn rejects_wrong_shapes(#[case] text: &str) {
        let err = parse_json_table(text).expect_err("shape");
        assert!(matches!(err, ParseError::JsonShape { .. }));
    }

    #[rstest]
    fn rejects_malformed_json() {
        let err = parse_json_table("{not json").expect_err("malformed");
        assert!(matches!(err, ParseError::Json { .. }));
    }
}
