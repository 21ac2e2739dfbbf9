//! End-to-end parsing scenarios and the batched parser parity property.

use std::future::Future;

use covwatch_data::parse::{
    BatchOptions, BatchProgress, CsvOptions, Sheet, SourceDetails, TableFormat, Workbook,
    parse_csv, parse_csv_batched, parse_csv_document, parse_workbook,
};
use proptest::prelude::*;
use rstest::rstest;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("build runtime")
        .block_on(future)
}

fn column<'a>(headers: &[String], row: &'a [String], name: &str) -> &'a str {
    let index = headers
        .iter()
        .position(|header| header == name)
        .unwrap_or_else(|| panic!("missing header {name}"));
    &row[index]
}

#[rstest]
fn transaction_export_normalises_amounts() {
    let text = "Date;Heure;Dossier;Type;Opér.;Client;Mont., EUR;Dif./EnCom., EUR\n\
                2024-01-15;10:30;D1;Sale;5;Acme;\"1,50\";\"0,00\"\n";
    let table = parse_csv_document(text, &CsvOptions::default()).expect("parse export");
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.format(), TableFormat::Csv);
    assert!(table.batches().is_none());
    let row = &table.rows[0];
    assert_eq!(column(&table.headers, row, "Montant"), "1.50");
    assert_eq!(column(&table.headers, row, "Operateur"), "5");
    assert_eq!(column(&table.headers, row, "Commission EUR"), "0.00");
    assert_eq!(column(&table.headers, row, "Client"), "Acme");
}

#[rstest]
fn second_sheet_is_used_and_dated() {
    let summary = Sheet {
        name: "Summary".into(),
        rows: vec![vec!["ignored".into()]],
    };
    let extract = Sheet {
        name: "Extract_2024-03-01".into(),
        rows: vec![
            vec!["Dx".into(), "App Appli".into(), "Business criticality".into()],
            vec!["DP".into(), "Billing".into(), "Critical".into()],
        ],
    };
    let table = parse_workbook(&Workbook::new(vec![summary, extract])).expect("parse workbook");

    let SourceDetails::Spreadsheet(selection) = &table.source else {
        panic!("expected spreadsheet details");
    };
    assert_eq!(selection.active_sheet, "Extract_2024-03-01");
    assert_eq!(selection.sheet_index, 2);
    assert_eq!(selection.extracted_date.as_deref(), Some("2024-03-01"));
    assert_eq!(selection.sheet_names, ["Summary", "Extract_2024-03-01"]);
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.format(), TableFormat::Xlsx);
    assert!(!table.processed_in_batches());
}

#[rstest]
fn large_export_reports_progress_per_chunk() {
    let mut text = String::from("Dx;App Appli;Business criticality\n");
    for index in 0..5999 {
        text.push_str(&format!("DP;App {index};Critical\n"));
    }
    let mut reports: Vec<BatchProgress> = Vec::new();
    let table = block_on(parse_csv(
        &text,
        &CsvOptions::default(),
        &BatchOptions::default(),
        |progress| reports.push(progress),
    ))
    .expect("parse large export");

    assert!(table.processed_in_batches());
    assert_eq!(table.row_count(), 5999);
    assert_eq!(reports.len(), 6);
    assert!(reports.iter().all(|report| report.total_lines == 5999));
    assert_eq!(reports.iter().map(|report| report.chunk_size).sum::<usize>(), 5999);
    let last = reports.last().expect("final report");
    assert_eq!(last.total_processed, last.total_lines);
    assert_eq!(last.percent_complete, 100);
    assert_eq!(table.batches().map(|batch| batch.total_batches), Some(6));
}

#[rstest]
fn small_export_skips_batching() {
    let text = "Dx;App Appli\nDP;Billing\n";
    let mut calls = 0;
    let table = block_on(parse_csv(
        text,
        &CsvOptions::default(),
        &BatchOptions::default(),
        |_| calls += 1,
    ))
    .expect("parse small export");
    assert!(!table.processed_in_batches());
    assert_eq!(calls, 0);
}

fn cell() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z0-9 ]{0,8}",
        "[0-9]{1,4},[0-9]{2}".prop_map(|amount| format!("\"{amount}\"")),
    ]
}

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::collection::vec(cell(), 8), 1..40).prop_map(|rows| {
        let mut text = String::from("Date;Heure;Dossier;Type;Opér.;Client;Mont., EUR;Dif./EnCom., EUR\n");
        for row in rows {
            text.push_str(&row.join(";"));
            text.push('\n');
        }
        text
    })
}

proptest! {
    #[test]
    fn batched_parse_matches_single_pass(text in document(), chunk_size in 1_usize..7) {
        let options = CsvOptions::default();
        let single = parse_csv_document(&text, &options).expect("single pass");
        let forced = BatchOptions {
            chunk_size,
            size_threshold_bytes: 0,
            line_threshold: 0,
        };
        let batched = block_on(parse_csv_batched(&text, &options, &forced, |_| {}))
            .expect("batched pass");
        prop_assert_eq!(&batched.headers, &single.headers);
        prop_assert_eq!(&batched.rows, &single.rows);
        prop_assert!(batched.processed_in_batches());
    }
}
