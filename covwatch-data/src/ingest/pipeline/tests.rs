use super::*;
use crate::error_log::Severity;
use crate::ingest::{NoopObserver, StructureCheck};
use crate::mirror::MemoryStorage;
use crate::parse::{BatchOptions, BatchProgress};
use crate::store::RecordStore;
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;

const APPLICATIONS_CSV: &str = "Dx;App Appli;App Code;Operator/Department;Business criticality;Functional monitoring (BSM);In HCC;HCC eligibility\n\
DP;Billing;BIL;Finance;Critical;YES;YES;YES\n\
DPA;Ledger;LED;Finance;High;NO;NO;NO\n";

#[derive(Debug, Default)]
struct Recorder {
    steps: Vec<(PipelineStep, StepStatus)>,
    progress: Vec<BatchProgress>,
    warnings: Vec<String>,
}

impl PipelineObserver for Recorder {
    fn step_changed(&mut self, step: PipelineStep, status: StepStatus) {
        self.steps.push((step, status));
    }

    fn batch_progress(&mut self, progress: &BatchProgress) {
        self.progress.push(*progress);
    }

    fn warning(&mut self, message: &str) {
        self.warnings.push(message.to_owned());
    }
}

#[fixture]
fn dashboard() -> Dashboard<MemoryStorage> {
    Dashboard::new(
        RecordStore::open_in_memory().expect("open store"),
        MemoryStorage::new(),
    )
}

fn bytes(name: &str, content: &str) -> FileInput {
    FileInput::Bytes {
        name: name.to_owned(),
        bytes: content.as_bytes().to_vec(),
    }
}

#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn csv_ingestion_walks_every_step(mut dashboard: Dashboard<MemoryStorage>) {
    let mut pipeline = IngestionPipeline::default();
    let mut recorder = Recorder::default();
    let summary = pipeline
        .run(&mut dashboard, bytes("apps.CSV", APPLICATIONS_CSV), &mut recorder)
        .await
        .expect("ingest csv");

    assert_eq!(pipeline.state(), &PipelineState::Done);
    assert_eq!(summary.row_count, 2);
    assert_eq!(summary.format, TableFormat::Csv);
    assert!(summary.missing_columns.is_empty());
    assert!(!summary.sampled);
    let completed: Vec<PipelineStep> = recorder
        .steps
        .iter()
        .filter(|(_, status)| *status == StepStatus::Completed)
        .map(|(step, _)| *step)
        .collect();
    assert_eq!(
        completed,
        [
            PipelineStep::Reading,
            PipelineStep::Parsing,
            PipelineStep::Validating,
            PipelineStep::Persisting,
        ]
    );

    let stored = dashboard.store().read_all().expect("read").records();
    assert_eq!(stored[0].app_appli, "Billing");
    let mirrored = dashboard.mirror().load_data().expect("load").expect("snapshot");
    assert_eq!(mirrored.rows.len(), 2);
    assert_eq!(mirrored.file.media_type, "text/csv");
}

#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn unsupported_extension_fails_while_reading(mut dashboard: Dashboard<MemoryStorage>) {
    let mut pipeline = IngestionPipeline::default();
    let err = pipeline
        .run(&mut dashboard, bytes("notes.txt", "hello"), &mut NoopObserver)
        .await
        .expect_err("unsupported");
    assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
    let PipelineState::Error(failure) = pipeline.state() else {
        panic!("expected error state");
    };
    assert_eq!(failure.step, PipelineStep::Reading);
    let entry = &dashboard.errors().entries()[0];
    assert_eq!(entry.severity, Severity::Error);
    assert_eq!(entry.origin, "reading");

    pipeline.reset();
    assert_eq!(pipeline.state(), &PipelineState::Idle);
}

#[rstest]
#[case("empty.csv", "  \n")]
#[case("empty.json", "")]
#[tokio::test(flavor = "current_thread")]
async fn empty_files_fail_while_parsing(
    mut dashboard: Dashboard<MemoryStorage>,
    #[case] name: &str,
    #[case] content: &str,
) {
    let mut pipeline = IngestionPipeline::default();
    let err = pipeline
        .run(&mut dashboard, bytes(name, content), &mut NoopObserver)
        .await
        .expect_err("empty");
    assert!(matches!(err, IngestError::Parse(ParseError::EmptyFile)));
    assert!(matches!(
        pipeline.state(),
        PipelineState::Error(PipelineFailure {
            step: PipelineStep::Parsing,
            ..
        })
    ));
}

#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn header_only_csv_fails_validation(mut dashboard: Dashboard<MemoryStorage>) {
    let mut pipeline = IngestionPipeline::default();
    let err = pipeline
        .run(&mut dashboard, bytes("apps.csv", "Dx;App Appli\n"), &mut NoopObserver)
        .await
        .expect_err("no rows");
    assert!(matches!(
        err,
        IngestError::InvalidStructure {
            check: StructureCheck::NoRows
        }
    ));
}

#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn missing_columns_warn_but_succeed(mut dashboard: Dashboard<MemoryStorage>) {
    let mut pipeline = IngestionPipeline::default();
    let mut recorder = Recorder::default();
    let summary = pipeline
        .run(
            &mut dashboard,
            bytes("apps.json", r#"{"headers":["Dx","App Appli"],"rows":[["DP","Billing"]]}"#),
            &mut recorder,
        )
        .await
        .expect("ingest json");
    assert_eq!(summary.missing_columns.len(), 6);
    assert_eq!(recorder.warnings.len(), 6);
    assert!(
        dashboard
            .errors()
            .entries()
            .iter()
            .all(|entry| entry.severity == Severity::Warning)
    );
}

#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn large_csv_is_batched_and_sampled(mut dashboard: Dashboard<MemoryStorage>) {
    let mut text = String::from("Dx;App Appli;Business criticality\n");
    for index in 1..6000 {
        text.push_str(&format!("DP;App {index};Critical\n"));
    }
    let mut pipeline = IngestionPipeline::default();
    let mut recorder = Recorder::default();
    let summary = pipeline
        .run(&mut dashboard, bytes("big.csv", &text), &mut recorder)
        .await
        .expect("ingest large csv");

    assert_eq!(summary.row_count, 5999);
    assert!(summary.sampled);
    let last = recorder.progress.last().expect("progress reported");
    assert_eq!(last.total_lines, 5999);
    assert_eq!(last.total_processed, last.total_lines);
    let chunk_sum: usize = recorder.progress.iter().map(|report| report.chunk_size).sum();
    assert_eq!(chunk_sum, 5999);

    let mirrored = dashboard.mirror().load_data().expect("load").expect("snapshot");
    assert_eq!(mirrored.rows.len(), 100);
    assert_eq!(mirrored.sample.map(|stats| stats.total_rows), Some(5999));
}

#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn forced_batching_matches_plain_parse(mut dashboard: Dashboard<MemoryStorage>) {
    let options = IngestOptions {
        batch: BatchOptions {
            chunk_size: 1,
            size_threshold_bytes: 0,
            line_threshold: 0,
        },
        ..IngestOptions::default()
    };
    let mut pipeline = IngestionPipeline::new(options);
    let summary = pipeline
        .run(&mut dashboard, bytes("apps.csv", APPLICATIONS_CSV), &mut NoopObserver)
        .await
        .expect("ingest");
    assert_eq!(summary.batches.map(|batch| batch.total_batches), Some(2));
    assert_eq!(dashboard.store().record_count().expect("count"), 2);
}

#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn quota_failure_keeps_previous_records() {
    let mut dashboard = Dashboard::new(
        RecordStore::open_in_memory().expect("open store"),
        MemoryStorage::with_quota(1500),
    );
    let mut pipeline = IngestionPipeline::default();
    pipeline
        .run(&mut dashboard, bytes("apps.csv", APPLICATIONS_CSV), &mut NoopObserver)
        .await
        .expect("small export fits the quota");

    let mut larger = APPLICATIONS_CSV.to_owned();
    for index in 0..40 {
        larger.push_str(&format!(
            "DPS;Application {index};A{index:03};Operations;Medium;NO;NO;NO\n"
        ));
    }
    let err = pipeline
        .run(&mut dashboard, bytes("apps.csv", &larger), &mut NoopObserver)
        .await
        .expect_err("larger export overflows the quota");

    assert!(matches!(err, IngestError::StorageQuota { .. }));
    assert_eq!(dashboard.store().record_count().expect("count"), 2);
    let mirrored = dashboard
        .mirror()
        .load_data()
        .expect("load snapshot")
        .expect("previous snapshot kept");
    assert_eq!(mirrored.rows.len(), 2);
}

#[rstest]
#[tokio::test(flavor = "current_thread")]
async fn reads_files_from_disk(mut dashboard: Dashboard<MemoryStorage>) {
    let dir = TempDir::new().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("apps.csv")).expect("utf-8 path");
    covwatch_fs::write_bytes(&path, APPLICATIONS_CSV.as_bytes()).expect("write fixture");

    let summary = IngestionPipeline::default()
        .run(&mut dashboard, FileInput::Path(path), &mut NoopObserver)
        .await
        .expect("ingest from disk");
    assert_eq!(summary.file.name, "apps.csv");
    assert_eq!(summary.file.size, APPLICATIONS_CSV.len() as u64);
    assert!(summary.file.modified.is_some());
}
