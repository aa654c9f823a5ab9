//! End-to-end pipeline tests with in-process converters

mod common;

use common::*;
use mol2_pdbqt::{
    Config, DuplicatePolicy, Error, Event, Pipeline, RecordSplitter, TaskError, TaskOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn pipeline_with(config: Config, converter: Arc<StubConverter>) -> Pipeline {
    Pipeline::new(config, converter).unwrap()
}

#[tokio::test]
async fn two_records_become_two_targets_and_no_staging() {
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "ZINC_AA.mol2.gz", TWO_RECORD_ARCHIVE);

    let report = pipeline_with(Config::default(), Arc::new(StubConverter::succeeding()))
        .process_archive(&archive)
        .await
        .unwrap();

    assert_eq!(report.output_dir, dir.path().join("ZINC_AA"));
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.is_clean());
    assert_eq!(
        file_names(&report.output_dir),
        vec!["ZINC001.pdbqt", "ZINC002.pdbqt"]
    );

    let first = std::fs::read_to_string(report.output_dir.join("ZINC001.pdbqt")).unwrap();
    assert!(first.starts_with("@<TRIPOS>MOLECULE\nZINC001\n"), "{first}");
    assert!(first.contains("foo"));
    assert!(!first.contains("ZINC002"));
}

#[tokio::test]
async fn failing_record_keeps_its_staging_file() {
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "ZINC_AB.mol2.gz", TWO_RECORD_ARCHIVE);

    let report = pipeline_with(
        Config::default(),
        Arc::new(StubConverter::failing_on(&["ZINC002"])),
    )
    .process_archive(&archive)
    .await
    .unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert!(!report.is_clean());

    let ok = report
        .outcomes
        .iter()
        .find(|o| o.identifier() == "ZINC001")
        .unwrap();
    assert!(ok.is_success());

    match report.failures().next().unwrap() {
        TaskOutcome::Failure {
            identifier,
            staging,
            error: TaskError::Conversion(e),
        } => {
            assert_eq!(identifier, "ZINC002");
            assert_eq!(e.exit_status(), Some(1));
            assert!(staging.exists());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(
        file_names(&report.output_dir),
        vec!["ZINC001.pdbqt", "ZINC002.mol2"]
    );
}

#[tokio::test]
async fn conversions_respect_the_configured_concurrency() {
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "big.mol2.gz", &generated_archive(40));
    let converter = Arc::new(StubConverter::slow(Duration::from_millis(10)));
    let config = Config {
        concurrency: 4,
        ..Config::default()
    };

    let report = pipeline_with(config, converter.clone())
        .process_archive(&archive)
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 40);
    assert_eq!(converter.calls().len(), 40);
    let peak = converter.peak();
    assert!(peak <= 4, "peak concurrency {peak} exceeded 4");
    assert!(peak >= 2, "expected parallel conversions, peak {peak}");
}

#[tokio::test]
async fn duplicate_identifiers_are_renamed_by_default() {
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "dups.mol2.gz", DUPLICATE_ARCHIVE);

    let report = pipeline_with(Config::default(), Arc::new(StubConverter::succeeding()))
        .process_archive(&archive)
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.renamed.len(), 1);
    assert_eq!(report.renamed[0].identifier, "ZINC001");
    assert_eq!(report.renamed[0].stem, "ZINC001_2");
    assert_eq!(
        file_names(&report.output_dir),
        vec!["ZINC001.pdbqt", "ZINC001_2.pdbqt", "ZINC003.pdbqt"]
    );
}

#[tokio::test]
async fn duplicate_identifiers_can_abort_the_archive() {
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "dups.mol2.gz", DUPLICATE_ARCHIVE);
    let config = Config {
        duplicate_policy: DuplicatePolicy::Fail,
        ..Config::default()
    };
    let converter = Arc::new(StubConverter::succeeding());

    let err = pipeline_with(config, converter.clone())
        .process_archive(&archive)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DuplicateIdentifier { .. }), "{err}");
    assert!(converter.calls().is_empty());
}

#[tokio::test]
async fn overwrite_converts_only_the_last_duplicate() {
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "dups.mol2.gz", DUPLICATE_ARCHIVE);
    let config = Config {
        duplicate_policy: DuplicatePolicy::Overwrite,
        ..Config::default()
    };
    let converter = Arc::new(StubConverter::slow(Duration::from_millis(20)));

    let report = pipeline_with(config, converter.clone())
        .process_archive(&archive)
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.superseded.len(), 1);
    assert_eq!(report.superseded[0].index, 0);
    assert_eq!(report.superseded[0].by, 1);
    assert_eq!(converter.calls().len(), 2);

    let kept = std::fs::read_to_string(report.output_dir.join("ZINC001.pdbqt")).unwrap();
    assert!(kept.contains("second"), "{kept}");
    assert_eq!(
        file_names(&report.output_dir),
        vec!["ZINC001.pdbqt", "ZINC003.pdbqt"]
    );
}

#[tokio::test]
async fn rerun_with_skip_existing_resumes_without_converting() {
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "ZINC_AC.mol2.gz", TWO_RECORD_ARCHIVE);

    pipeline_with(Config::default(), Arc::new(StubConverter::succeeding()))
        .process_archive(&archive)
        .await
        .unwrap();

    // Second run would fail on everything if it actually converted
    let converter = Arc::new(StubConverter::failing_on(&["ZINC001", "ZINC002"]));
    let config = Config {
        skip_existing: true,
        ..Config::default()
    };
    let report = pipeline_with(config, converter.clone())
        .process_archive(&archive)
        .await
        .unwrap();

    assert!(report.is_clean());
    assert!(converter.calls().is_empty());
    assert!(report.outcomes.iter().all(|o| matches!(
        o,
        TaskOutcome::Success { resumed: true, .. }
    )));
    assert_eq!(report.summary().resumed, 2);
}

#[tokio::test]
async fn rerun_with_skip_existing_retries_records_that_failed() {
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "ZINC_AD.mol2.gz", TWO_RECORD_ARCHIVE);

    let first = pipeline_with(
        Config::default(),
        Arc::new(StubConverter::failing_after_writing(&["ZINC001", "ZINC002"])),
    )
    .process_archive(&archive)
    .await
    .unwrap();
    assert_eq!(first.failed(), 2);
    assert_eq!(
        file_names(&first.output_dir),
        vec!["ZINC001.mol2", "ZINC002.mol2"],
        "a failed conversion must not leave a target behind"
    );

    let converter = Arc::new(StubConverter::succeeding());
    let config = Config {
        skip_existing: true,
        ..Config::default()
    };
    let second = pipeline_with(config, converter.clone())
        .process_archive(&archive)
        .await
        .unwrap();

    assert_eq!(second.succeeded(), 2);
    assert_eq!(second.summary().resumed, 0);
    assert_eq!(converter.calls().len(), 2);
}

#[tokio::test]
async fn staging_files_can_be_kept() {
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "keep.mol2.gz", TWO_RECORD_ARCHIVE);
    let config = Config {
        remove_staging_on_success: false,
        ..Config::default()
    };

    let report = pipeline_with(config, Arc::new(StubConverter::succeeding()))
        .process_archive(&archive)
        .await
        .unwrap();

    assert_eq!(
        file_names(&report.output_dir),
        vec!["ZINC001.mol2", "ZINC001.pdbqt", "ZINC002.mol2", "ZINC002.pdbqt"]
    );
}

#[tokio::test]
async fn every_marker_is_accounted_for() {
    let text = format!(
        "{}@<TRIPOS>MOLECULE\n\n   \n@<TRIPOS>MOLECULE\n../escape\n",
        generated_archive(5)
    );
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "mixed.mol2.gz", &text);

    let report = pipeline_with(Config::default(), Arc::new(StubConverter::succeeding()))
        .process_archive(&archive)
        .await
        .unwrap();

    let markers = RecordSplitter::new("@<TRIPOS>MOLECULE")
        .split_str(&text)
        .marker_count();
    assert_eq!(markers, 7);
    assert_eq!(report.outcomes.len() + report.rejected.len(), markers);
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(report.succeeded(), 5);
}

#[tokio::test]
async fn plain_and_gzip_archives_get_separate_directories() {
    let dir = TempDir::new().unwrap();
    let gz = write_gz(dir.path(), "first.mol2.gz", TWO_RECORD_ARCHIVE);
    let plain = dir.path().join("second.mol2");
    std::fs::write(&plain, generated_archive(3)).unwrap();

    let pipeline = pipeline_with(Config::default(), Arc::new(StubConverter::succeeding()));
    let first = pipeline.process_archive(&gz).await.unwrap();
    let second = pipeline.process_archive(&plain).await.unwrap();

    assert_eq!(first.output_dir, dir.path().join("first"));
    assert_eq!(second.output_dir, dir.path().join("second"));
    assert_eq!(file_names(&first.output_dir).len(), 2);
    assert_eq!(file_names(&second.output_dir).len(), 3);
}

#[tokio::test]
async fn corrupt_archive_aborts_without_output_directory() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("broken.mol2.gz");
    let mut bytes = vec![0x1f, 0x8b];
    bytes.extend_from_slice(b"definitely not deflate");
    std::fs::write(&archive, bytes).unwrap();

    let err = pipeline_with(Config::default(), Arc::new(StubConverter::succeeding()))
        .process_archive(&archive)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Decompression { .. }), "{err}");
    assert!(!dir.path().join("broken").exists());
}

#[tokio::test]
async fn unrecognized_archive_name_is_rejected() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("molecules.sdf");
    std::fs::write(&archive, TWO_RECORD_ARCHIVE).unwrap();

    let err = pipeline_with(Config::default(), Arc::new(StubConverter::succeeding()))
        .process_archive(&archive)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidArchiveName { .. }), "{err}");
}

#[tokio::test]
async fn cancelled_pipeline_converts_nothing() {
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "late.mol2.gz", &generated_archive(5));
    let converter = Arc::new(StubConverter::succeeding());
    let pipeline = pipeline_with(Config::default(), converter.clone());

    pipeline.cancellation_token().cancel();
    let report = pipeline.process_archive(&archive).await.unwrap();

    assert_eq!(report.outcomes.len(), 5);
    assert!(report.outcomes.iter().all(|o| matches!(
        o,
        TaskOutcome::Failure {
            error: TaskError::Cancelled,
            ..
        }
    )));
    assert!(converter.calls().is_empty());
}

#[tokio::test]
async fn subscribers_see_one_event_per_record() {
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "events.mol2.gz", TWO_RECORD_ARCHIVE);
    let pipeline = pipeline_with(
        Config::default(),
        Arc::new(StubConverter::failing_on(&["ZINC001"])),
    );
    let mut events = pipeline.subscribe();

    pipeline.process_archive(&archive).await.unwrap();

    let mut converted = 0;
    let mut failed = 0;
    let mut finished = false;
    while let Ok(event) = events.try_recv() {
        match event {
            Event::RecordConverted { .. } => converted += 1,
            Event::RecordFailed { .. } => failed += 1,
            Event::ArchiveFinished { .. } => finished = true,
            _ => {}
        }
    }
    assert_eq!((converted, failed), (1, 1));
    assert!(finished);
}

#[tokio::test]
async fn report_summary_serializes_failures() {
    let dir = TempDir::new().unwrap();
    let archive = write_gz(dir.path(), "json.mol2.gz", TWO_RECORD_ARCHIVE);

    let report = pipeline_with(
        Config::default(),
        Arc::new(StubConverter::failing_on(&["ZINC002"])),
    )
    .process_archive(&archive)
    .await
    .unwrap();

    let json = serde_json::to_value(report.summary()).unwrap();
    assert_eq!(json["records"], 2);
    assert_eq!(json["succeeded"], 1);
    assert_eq!(json["failed"], 1);
    assert_eq!(json["failures"][0]["identifier"], "ZINC002");
    assert_eq!(json["failures"][0]["exit_status"], 1);
    assert_eq!(json["failures"][0]["stderr"], "cannot parse ZINC002");
}
