//! Run lifecycle integration tests.
//!
//! These tests drive whole runs through the orchestrator against in-memory
//! backends: filter -> upload -> submit -> poll -> download -> cleanup

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::mpsc::Receiver;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use doctrans_core::{
    create_event_channel,
    glossary::GlossaryError,
    testing::{fixtures, InMemoryStorage, MockTranslator},
    JobPhase, ObjectStorage, RunConfig, RunError, RunEvent, RunEventEnvelope, RunOrchestrator,
    RunRequest, ServiceError, StatusUpdate, SweepPolicy,
};

/// Test helper bundling the in-memory backends and a scratch directory.
struct TestHarness {
    storage: Arc<InMemoryStorage>,
    translator: Arc<MockTranslator>,
    dir: TempDir,
}

impl TestHarness {
    async fn new() -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let translator = Arc::new(MockTranslator::new());
        translator
            .echo_through(storage.clone() as Arc<dyn ObjectStorage>)
            .await;

        Self {
            storage,
            translator,
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn config() -> RunConfig {
        RunConfig {
            allowed_extensions: vec!["docx".to_string()],
            max_concurrency: 4,
            poll_interval_ms: 1,
            sweep_probability: 0.0,
            ..RunConfig::default()
        }
    }

    fn orchestrator(&self, config: RunConfig) -> (RunOrchestrator, Receiver<RunEventEnvelope>) {
        let (sink, rx) = create_event_channel(256);
        let orchestrator = RunOrchestrator::new(
            self.storage.clone(),
            self.translator.clone(),
            config,
        )
        .with_events(sink);
        (orchestrator, rx)
    }

    fn write(&self, files: &[(&str, usize)]) -> Vec<PathBuf> {
        fixtures::write_files(self.dir.path(), files)
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn request(&self, files: Vec<PathBuf>) -> RunRequest {
        RunRequest::new(files, "de", self.output_dir())
    }
}

fn drain(rx: &mut Receiver<RunEventEnvelope>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        events.push(envelope.event);
    }
    events
}

fn status_events(events: &[RunEvent]) -> Vec<&StatusUpdate> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::StatusUpdate(update) => Some(update),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_three_files_one_discarded_end_to_end() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 10), ("notes.txt", 5), ("b.docx", 20)]);
    harness
        .translator
        .script_statuses(vec![
            fixtures::snapshot_at("NotStarted", 0, 2, 0, 0, 0),
            fixtures::snapshot_at("Running", 2, 0, 0, 0, 1),
            fixtures::snapshot_at("Running", 2, 0, 0, 0, 1),
            fixtures::snapshot_at("Succeeded", 0, 0, 2, 0, 2),
        ])
        .await;

    let (orchestrator, mut rx) = harness.orchestrator(TestHarness::config());
    let outcome = assert_ok!(
        orchestrator
            .run(harness.request(files.clone()), &CancellationToken::new())
            .await
    );

    assert_eq!(outcome.final_status, JobPhase::Succeeded);
    assert_eq!(outcome.discarded, vec![files[1].clone()]);
    assert_eq!(outcome.upload.count, 2);
    assert_eq!(outcome.upload.total_bytes, 30);
    assert_eq!(outcome.download.count, 2);
    assert_eq!(outcome.download.total_bytes, 30);
    assert!(outcome.is_complete());

    let out = harness.output_dir();
    assert_eq!(std::fs::read(out.join("a.docx")).unwrap().len(), 10);
    assert_eq!(std::fs::read(out.join("b.docx")).unwrap().len(), 20);
    assert!(!out.join("notes.txt").exists());

    // Events arrive in phase order, duplicate polls collapsed.
    let events = drain(&mut rx);
    let kinds: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(
        kinds,
        vec![
            "files_discarded",
            "upload_complete",
            "status_update",
            "status_update",
            "status_update",
            "download_complete",
        ]
    );
    assert!(matches!(
        &events[0],
        RunEvent::FilesDiscarded { paths } if paths == &vec![files[1].clone()]
    ));

    let submitted = harness.translator.submitted_requests().await;
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0].source.language.is_none());
    assert_eq!(submitted[0].targets[0].language, "de");
    assert!(submitted[0].targets[0].glossaries.is_empty());

    // Everything the run created is gone.
    assert!(harness.storage.container_names().await.is_empty());
    assert_eq!(harness.storage.deletions().await.len(), 3);
}

#[tokio::test]
async fn test_empty_input_fails_without_remote_calls() {
    let harness = TestHarness::new().await;
    let (orchestrator, mut rx) = harness.orchestrator(TestHarness::config());

    let err = assert_err!(
        orchestrator
            .run(harness.request(Vec::new()), &CancellationToken::new())
            .await
    );

    assert!(matches!(err, RunError::Argument(_)));
    assert_eq!(harness.storage.call_count(), 0);
    assert_eq!(harness.translator.total_calls(), 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_all_files_filtered_out() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("notes.txt", 3), ("image.png", 3)]);
    let (orchestrator, mut rx) = harness.orchestrator(TestHarness::config());

    let err = assert_err!(
        orchestrator
            .run(harness.request(files), &CancellationToken::new())
            .await
    );

    assert!(matches!(err, RunError::Argument(_)));
    assert_eq!(harness.storage.call_count(), 0);
    assert_eq!(harness.translator.total_calls(), 0);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type(), "files_discarded");
}

#[tokio::test]
async fn test_unsupported_target_language() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3)]);
    let (orchestrator, _rx) = harness.orchestrator(TestHarness::config());

    let request = RunRequest::new(files, "xx", harness.output_dir());
    let err = assert_err!(orchestrator.run(request, &CancellationToken::new()).await);

    assert!(matches!(err, RunError::Argument(_)));
    // Only the language lookup reached the service; nothing was created.
    assert_eq!(harness.translator.total_calls(), 1);
    assert_eq!(harness.storage.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_language_rejected_locally() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3)]);
    let (orchestrator, _rx) = harness.orchestrator(TestHarness::config());

    let request = RunRequest::new(files, "de", harness.output_dir()).with_source_language("en_US");
    let err = assert_err!(orchestrator.run(request, &CancellationToken::new()).await);

    assert!(matches!(err, RunError::Argument(_)));
    assert_eq!(harness.translator.total_calls(), 0);
}

#[tokio::test]
async fn test_submission_error_cleans_up_without_polling() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3), ("b.docx", 4)]);
    let payload = ServiceError::new("InvalidRequest", "Cannot access source document location.");
    harness.translator.reject_submissions(payload.clone()).await;

    let (orchestrator, mut rx) = harness.orchestrator(TestHarness::config());
    let err = assert_err!(
        orchestrator
            .run(harness.request(files), &CancellationToken::new())
            .await
    );

    match err {
        RunError::Submission(error) => assert_eq!(error, payload),
        other => panic!("expected submission error, got {:?}", other),
    }

    let events = drain(&mut rx);
    let statuses = status_events(&events);
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0], &StatusUpdate::Rejected(payload));
    assert!(!events.iter().any(|e| e.event_type() == "download_complete"));

    assert_eq!(harness.translator.status_checks(), 0);
    assert!(harness.storage.container_names().await.is_empty());
    assert_eq!(harness.storage.deletions().await.len(), 3);
}

#[tokio::test]
async fn test_failed_job_stops_before_download() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3)]);
    harness
        .translator
        .script_statuses(vec![fixtures::snapshot("ValidationFailed", 0, 0, 0, 1)])
        .await;

    let (orchestrator, mut rx) = harness.orchestrator(TestHarness::config());
    let err = assert_err!(
        orchestrator
            .run(harness.request(files), &CancellationToken::new())
            .await
    );

    assert!(matches!(
        err,
        RunError::TerminalFailure { ref status } if status == "ValidationFailed"
    ));
    let events = drain(&mut rx);
    assert!(!events.iter().any(|e| e.event_type() == "download_complete"));
    assert!(!harness.output_dir().exists());
    assert!(harness.storage.container_names().await.is_empty());
}

#[tokio::test]
async fn test_partial_failure_still_downloads() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3), ("b.docx", 4)]);
    harness
        .translator
        .script_statuses(vec![fixtures::snapshot("Succeeded", 0, 0, 1, 1)])
        .await;

    let (orchestrator, _rx) = harness.orchestrator(TestHarness::config());
    let outcome = assert_ok!(
        orchestrator
            .run(harness.request(files), &CancellationToken::new())
            .await
    );

    assert_eq!(outcome.final_status, JobPhase::PartiallyFailed);
    assert_eq!(outcome.download.count, 2);
    assert!(!outcome.is_complete());
}

#[tokio::test]
async fn test_cancelled_job_downloads_what_exists() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3)]);
    harness
        .translator
        .script_statuses(vec![
            fixtures::snapshot_at("Cancelling", 1, 0, 0, 0, 0),
            fixtures::snapshot_at("Cancelled", 0, 0, 1, 0, 1),
        ])
        .await;

    let (orchestrator, _rx) = harness.orchestrator(TestHarness::config());
    let outcome = assert_ok!(
        orchestrator
            .run(harness.request(files), &CancellationToken::new())
            .await
    );

    assert_eq!(outcome.final_status, JobPhase::Cancelled);
    assert_eq!(outcome.download.count, 1);
}

#[tokio::test]
async fn test_no_delete_keeps_containers() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3)]);
    let config = RunConfig {
        no_delete: true,
        ..TestHarness::config()
    };

    let (orchestrator, _rx) = harness.orchestrator(config);
    let outcome = assert_ok!(
        orchestrator
            .run(harness.request(files), &CancellationToken::new())
            .await
    );

    assert!(outcome.cleanup.is_none());
    let mut expected = vec![
        outcome.containers.glossary.clone(),
        outcome.containers.source.clone(),
        outcome.containers.target.clone(),
    ];
    expected.sort();
    assert_eq!(harness.storage.container_names().await, expected);
    assert!(harness.storage.deletions().await.is_empty());
}

#[tokio::test]
async fn test_cleanup_errors_do_not_fail_the_run() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3)]);
    harness.storage.fail_all_deletes();

    let (orchestrator, _rx) = harness.orchestrator(TestHarness::config());
    let outcome = assert_ok!(
        orchestrator
            .run(harness.request(files), &CancellationToken::new())
            .await
    );

    let report = outcome.cleanup.expect("cleanup should have run");
    assert!(report.deleted.is_empty());
    assert_eq!(report.failed.len(), 3);
    assert_eq!(harness.storage.container_names().await.len(), 3);
}

#[tokio::test]
async fn test_cancellation_during_polling_still_cleans_up() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3)]);
    harness
        .translator
        .script_statuses(vec![fixtures::snapshot("Running", 1, 0, 0, 0)])
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let (orchestrator, mut rx) = harness.orchestrator(TestHarness::config());
    let err = assert_err!(orchestrator.run(harness.request(files), &cancel).await);

    assert!(matches!(err, RunError::Cancelled));
    assert!(harness.translator.status_checks() >= 1);
    assert!(harness.storage.container_names().await.is_empty());
    let events = drain(&mut rx);
    assert!(!events.iter().any(|e| e.event_type() == "download_complete"));
}

#[tokio::test]
async fn test_cleanup_sweeps_abandoned_containers() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3)]);
    let now = Utc::now();
    harness
        .storage
        .insert_container("stalesrc", now - chrono::Duration::days(30))
        .await;
    harness
        .storage
        .insert_container("recenttgt", now - chrono::Duration::days(1))
        .await;

    let (orchestrator, _rx) = harness.orchestrator(TestHarness::config());
    let orchestrator = orchestrator.with_sweep_policy(SweepPolicy::always());
    let outcome = assert_ok!(
        orchestrator
            .run(harness.request(files), &CancellationToken::new())
            .await
    );

    assert_eq!(outcome.swept, Some(1));
    assert_eq!(harness.storage.container_names().await, vec!["recenttgt"]);
}

#[tokio::test]
async fn test_glossaries_are_attached_to_the_target() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3)]);
    let glossaries = harness.write(&[("terms.tsv", 12)]);

    let (orchestrator, _rx) = harness.orchestrator(TestHarness::config());
    let request = harness
        .request(files)
        .with_glossaries(glossaries)
        .with_source_language("en")
        .with_category("general");
    let outcome = assert_ok!(orchestrator.run(request, &CancellationToken::new()).await);

    let submitted = harness.translator.submitted_requests().await;
    let target = &submitted[0].targets[0];
    assert_eq!(target.glossaries.len(), 1);
    assert_eq!(target.glossaries[0].format, "TSV");
    assert!(target.glossaries[0]
        .glossary_url
        .contains(&format!("{}/terms.tsv", outcome.containers.glossary)));
    assert_eq!(target.category.as_deref(), Some("general"));
    assert_eq!(submitted[0].source.language.as_deref(), Some("en"));
    assert!(submitted[0]
        .source
        .source_url
        .contains(&outcome.containers.source));

    // The glossary container goes with the rest of the run.
    let cleanup = outcome.cleanup.as_ref().unwrap();
    assert!(cleanup.deleted.contains(&outcome.containers.glossary));
    assert!(!harness.storage.has_container(&outcome.containers.glossary).await);
}

#[tokio::test]
async fn test_unsupported_glossary_format_fails_before_remote_calls() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3)]);
    let glossaries = harness.write(&[("terms.pdf", 12)]);

    let (orchestrator, _rx) = harness.orchestrator(TestHarness::config());
    let err = assert_err!(
        orchestrator
            .run(
                harness.request(files).with_glossaries(glossaries),
                &CancellationToken::new()
            )
            .await
    );

    assert!(matches!(
        err,
        RunError::Glossary(GlossaryError::UnsupportedFormat { .. })
    ));
    assert_eq!(harness.storage.call_count(), 0);
    assert_eq!(harness.translator.total_calls(), 0);
}

#[tokio::test]
async fn test_transfers_respect_concurrency_bound() {
    let harness = TestHarness::new().await;
    let names: Vec<String> = (0..10).map(|i| format!("doc{}.docx", i)).collect();
    let specs: Vec<(&str, usize)> = names.iter().map(|n| (n.as_str(), 8)).collect();
    let files = harness.write(&specs);
    harness.storage.set_latency(Duration::from_millis(5)).await;

    let config = RunConfig {
        max_concurrency: 3,
        ..TestHarness::config()
    };
    let (orchestrator, _rx) = harness.orchestrator(config);
    let outcome = assert_ok!(
        orchestrator
            .run(harness.request(files), &CancellationToken::new())
            .await
    );

    assert_eq!(outcome.upload.count, 10);
    assert_eq!(outcome.download.count, 10);
    assert_eq!(outcome.download.total_bytes, 80);
    assert!(harness.storage.peak_in_flight() <= 3);
}

#[tokio::test]
async fn test_failed_uploads_are_reported_not_fatal() {
    let harness = TestHarness::new().await;
    let files = harness.write(&[("a.docx", 3), ("b.docx", 4)]);
    harness.storage.fail_uploads_of("b.docx").await;

    let (orchestrator, mut rx) = harness.orchestrator(TestHarness::config());
    let outcome = assert_ok!(
        orchestrator
            .run(harness.request(files), &CancellationToken::new())
            .await
    );

    assert_eq!(outcome.upload.count, 1);
    assert_eq!(outcome.upload.failures.len(), 1);
    assert_eq!(outcome.upload.failures[0].name, "b.docx");
    assert_eq!(outcome.download.count, 1);

    let events = drain(&mut rx);
    assert!(matches!(
        &events[0],
        RunEvent::UploadComplete(summary) if summary.failures.len() == 1
    ));
}

#[tokio::test]
async fn test_colliding_base_names_keep_the_last_file() {
    let harness = TestHarness::new().await;
    let mut files = Vec::new();
    for (sub, size) in [("a", 10), ("b", 20)] {
        let dir = harness.dir.path().join(sub);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("x.docx");
        std::fs::write(&path, vec![b'x'; size]).unwrap();
        files.push(path);
    }

    let (orchestrator, _rx) = harness.orchestrator(TestHarness::config());
    let outcome = assert_ok!(
        orchestrator
            .run(harness.request(files.clone()), &CancellationToken::new())
            .await
    );

    assert_eq!(outcome.upload.count, 1);
    assert_eq!(outcome.upload.total_bytes, 20);
    assert_eq!(outcome.upload.failures.len(), 1);
    assert!(outcome.upload.failures[0]
        .error
        .contains(&files[0].display().to_string()));
    assert!(!outcome.is_complete());

    assert_eq!(outcome.download.count, 1);
    assert_eq!(
        std::fs::read(harness.output_dir().join("x.docx")).unwrap().len(),
        20
    );
}

#[tokio::test]
async fn test_sweep_follows_the_roll_against_the_probability() {
    let config = RunConfig {
        sweep_probability: 0.5,
        ..TestHarness::config()
    };

    let cases: [(fn() -> f64, Option<usize>); 2] = [(low_roll, Some(1)), (high_roll, None)];
    for (roll, expected) in cases {
        let harness = TestHarness::new().await;
        let files = harness.write(&[("a.docx", 3)]);
        harness
            .storage
            .insert_container("stalegls", Utc::now() - chrono::Duration::days(30))
            .await;

        let (orchestrator, _rx) = harness.orchestrator(config.clone());
        let outcome = assert_ok!(
            orchestrator
                .with_sweep_roll(roll)
                .run(harness.request(files), &CancellationToken::new())
                .await
        );

        assert_eq!(outcome.swept, expected);
        assert_eq!(
            harness.storage.has_container("stalegls").await,
            expected.is_none()
        );
    }
}

fn low_roll() -> f64 {
    0.25
}

fn high_roll() -> f64 {
    0.75
}
