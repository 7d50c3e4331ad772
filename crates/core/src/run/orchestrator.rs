//! Drives one translation run from local files to translated files.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, RunConfig};
use crate::events::{EventSink, RunEvent, StatusUpdate};
use crate::filter::partition_by_extension;
use crate::glossary::{check_formats, GlossaryManager};
use crate::lifecycle::{CleanupReport, ContainerLifecycleManager, SweepPolicy};
use crate::metrics::{RUNS_TOTAL, RUN_DURATION};
use crate::naming::RunContainers;
use crate::poller::StatusPoller;
use crate::storage::{ObjectStorage, StorageError, UrlPermissions};
use crate::transfer::{DownloadManager, SourceFile, UploadManager};
use crate::translator::{JobRequest, SourceInput, StorageType, TargetInput, TranslationBackend};

use super::types::{RunError, RunOutcome, RunRequest};

/// Language tags as accepted by the service: `de`, `en-GB`, `zh-Hans`, `sr-Latn-RS`.
static LANGUAGE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{2,3}(?:-[A-Za-z0-9]{2,8})*$").unwrap());

fn check_language_syntax(code: &str, what: &str) -> Result<(), RunError> {
    if LANGUAGE_CODE.is_match(code) {
        Ok(())
    } else {
        Err(RunError::Argument(format!("invalid {} language code {:?}", what, code)))
    }
}

/// State owned by one run.
struct TranslationRun {
    run_id: String,
    containers: RunContainers,
    expires_at: DateTime<Utc>,
    /// Set once cleanup has been attempted so it never runs twice.
    cleaned_up: bool,
}

/// Sequences filtering, upload, submission, polling, download and cleanup.
pub struct RunOrchestrator {
    storage: Arc<dyn ObjectStorage>,
    translator: Arc<dyn TranslationBackend>,
    config: RunConfig,
    url_expiry: chrono::Duration,
    sweep: SweepPolicy,
    /// Source of the uniform `[0, 1)` roll compared against the sweep probability.
    sweep_roll: fn() -> f64,
    events: EventSink,
}

impl RunOrchestrator {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        translator: Arc<dyn TranslationBackend>,
        config: RunConfig,
    ) -> Self {
        let sweep = SweepPolicy::new(config.sweep_probability);
        Self {
            storage,
            translator,
            config,
            url_expiry: chrono::Duration::hours(48),
            sweep,
            sweep_roll: rand::random::<f64>,
            events: EventSink::disabled(),
        }
    }

    /// Build from a full configuration.
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn ObjectStorage>,
        translator: Arc<dyn TranslationBackend>,
    ) -> Self {
        Self::new(storage, translator, config.run.clone())
            .with_url_expiry(chrono::Duration::hours(i64::from(config.storage.url_expiry_hours)))
    }

    /// Send run events to `sink`.
    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.events = sink;
        self
    }

    /// Lifetime of the URLs handed to the translation service.
    pub fn with_url_expiry(mut self, expiry: chrono::Duration) -> Self {
        self.url_expiry = expiry;
        self
    }

    pub fn with_sweep_policy(mut self, policy: SweepPolicy) -> Self {
        self.sweep = policy;
        self
    }

    /// Replace the random roll that decides whether cleanup also sweeps.
    pub fn with_sweep_roll(mut self, roll: fn() -> f64) -> Self {
        self.sweep_roll = roll;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run one translation end to end.
    ///
    /// Once containers exist every exit path attempts cleanup, including
    /// cancellation, unless `no_delete` is configured.
    pub async fn run(
        &self,
        request: RunRequest,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        let started = Instant::now();
        let containers = RunContainers::generate();
        let run_id = containers.token.clone();

        info!(
            run_id = %run_id,
            files = request.files.len(),
            target = %request.target_language,
            "Starting translation run"
        );

        let result = match Utc::now().checked_add_signed(self.url_expiry) {
            Some(expires_at) => {
                let mut run = TranslationRun {
                    run_id: run_id.clone(),
                    containers,
                    expires_at,
                    cleaned_up: false,
                };
                self.execute(&mut run, &request, cancel).await
            }
            None => Err(RunError::Configuration(format!(
                "URL expiry of {} hours is out of range",
                self.url_expiry.num_hours()
            ))),
        };

        let label = match &result {
            Ok(outcome) => outcome.final_status.as_str(),
            Err(e) => e.outcome_label(),
        };
        RUNS_TOTAL.with_label_values(&[label]).inc();
        RUN_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => info!(
                run_id = %run_id,
                status = %outcome.final_status,
                uploaded = outcome.upload.count,
                downloaded = outcome.download.count,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Translation run finished"
            ),
            Err(e) => warn!(run_id = %run_id, outcome = label, error = %e, "Translation run failed"),
        }
        result
    }

    async fn execute(
        &self,
        run: &mut TranslationRun,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        // Everything up to container creation is local or read-only.
        if request.files.is_empty() {
            return Err(RunError::Argument("no input files given".to_string()));
        }
        check_language_syntax(&request.target_language, "target")?;
        if let Some(source) = &request.source_language {
            check_language_syntax(source, "source")?;
        }

        let filtered = partition_by_extension(&request.files, &self.config.allowed_extensions)?;
        if !filtered.discarded.is_empty() {
            info!(
                run_id = %run.run_id,
                discarded = filtered.discarded.len(),
                "Discarding files with unsupported extensions"
            );
            self.events
                .emit(
                    &run.run_id,
                    RunEvent::FilesDiscarded {
                        paths: filtered.discarded.clone(),
                    },
                )
                .await;
        }
        if filtered.accepted.is_empty() {
            return Err(RunError::Argument(
                "no input file has an allowed extension".to_string(),
            ));
        }
        check_formats(&request.glossaries)?;

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        self.check_languages_supported(request).await?;

        let lifecycle = ContainerLifecycleManager::new(Arc::clone(&self.storage));
        let created = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RunError::Cancelled),
            result = lifecycle.create_run_containers(&run.containers) => result.map_err(RunError::from),
        };

        let result = match created {
            Ok(()) => self.process(run, request, &filtered.accepted, cancel).await,
            Err(e) => Err(e),
        };

        let (cleanup, swept) = self.cleanup(&lifecycle, run).await;
        result.map(|mut outcome| {
            outcome.discarded = filtered.discarded;
            outcome.cleanup = cleanup;
            outcome.swept = swept;
            outcome
        })
    }

    async fn check_languages_supported(&self, request: &RunRequest) -> Result<(), RunError> {
        let supported = self
            .translator
            .supported_languages()
            .await
            .map_err(RunError::LanguageLookup)?;
        let is_supported =
            |code: &str| supported.iter().any(|lang| lang.eq_ignore_ascii_case(code));

        if !is_supported(&request.target_language) {
            return Err(RunError::Argument(format!(
                "target language {:?} is not supported",
                request.target_language
            )));
        }
        if let Some(source) = &request.source_language {
            if !is_supported(source) {
                return Err(RunError::Argument(format!(
                    "source language {:?} is not supported",
                    source
                )));
            }
        }
        Ok(())
    }

    /// Upload, submit, poll and download. Containers exist when this runs.
    async fn process(
        &self,
        run: &TranslationRun,
        request: &RunRequest,
        accepted: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RunError> {
        let containers = &run.containers;

        let files: Vec<SourceFile> = accepted.iter().cloned().filter_map(SourceFile::new).collect();
        let upload = UploadManager::new(Arc::clone(&self.storage), self.config.max_concurrency)
            .upload(&containers.source, &files, cancel)
            .await;
        self.events
            .emit(&run.run_id, RunEvent::UploadComplete(upload.clone()))
            .await;
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        if upload.count == 0 {
            return Err(RunError::Storage(StorageError::Backend(
                "every upload failed".to_string(),
            )));
        }

        let glossaries = GlossaryManager::new(Arc::clone(&self.storage), containers.glossary.clone());
        let descriptors = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Cancelled),
            result = glossaries.upload(&request.glossaries, run.expires_at) => result?,
        };

        let job = JobRequest {
            storage_type: StorageType::Folder,
            source: SourceInput {
                source_url: self.container_url(&containers.source, run.expires_at).await?,
                language: request.source_language.clone(),
            },
            targets: vec![TargetInput {
                target_url: self.container_url(&containers.target, run.expires_at).await?,
                language: request.target_language.clone(),
                glossaries: descriptors,
                category: request.category.clone(),
            }],
        };

        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Cancelled),
            result = self.translator.submit_job(&job) => result,
        };
        let handle = match submitted {
            Ok(handle) => handle,
            Err(e) => {
                let payload = e.service_error();
                warn!(
                    run_id = %run.run_id,
                    code = %payload.code,
                    message = %payload.message,
                    "Translation service rejected the job"
                );
                self.events
                    .emit(
                        &run.run_id,
                        RunEvent::StatusUpdate(StatusUpdate::Rejected(payload.clone())),
                    )
                    .await;
                return Err(RunError::Submission(payload));
            }
        };
        info!(run_id = %run.run_id, handle = %handle, "Job submitted");

        let polled = StatusPoller::new(Arc::clone(&self.translator), self.config.poll_interval())
            .poll_until_done(&handle, &run.run_id, &self.events, cancel)
            .await?;
        if !polled.phase.proceeds_to_download() {
            return Err(RunError::TerminalFailure {
                status: polled.snapshot.status,
            });
        }

        let download = DownloadManager::new(Arc::clone(&self.storage), self.config.max_concurrency)
            .download(&containers.target, &request.output_dir, cancel)
            .await?;
        self.events
            .emit(&run.run_id, RunEvent::DownloadComplete(download.clone()))
            .await;
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        Ok(RunOutcome {
            run_id: run.run_id.clone(),
            containers: containers.clone(),
            final_status: polled.phase,
            service_status: polled.snapshot.status,
            discarded: Vec::new(),
            upload,
            download,
            cleanup: None,
            swept: None,
        })
    }

    async fn container_url(
        &self,
        container: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String, RunError> {
        Ok(self
            .storage
            .generate_url(container, None, UrlPermissions::full(), expires_at)
            .await?)
    }

    /// Delete the run's containers at most once, then maybe sweep.
    async fn cleanup(
        &self,
        lifecycle: &ContainerLifecycleManager,
        run: &mut TranslationRun,
    ) -> (Option<CleanupReport>, Option<usize>) {
        if self.config.no_delete {
            info!(
                run_id = %run.run_id,
                source = %run.containers.source,
                target = %run.containers.target,
                glossary = %run.containers.glossary,
                "Leaving run containers in place"
            );
            return (None, None);
        }
        if run.cleaned_up {
            return (None, None);
        }
        run.cleaned_up = true;

        let report = lifecycle.delete_run_containers(&run.containers).await;
        debug!(
            run_id = %run.run_id,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Run containers cleaned up"
        );

        let swept = if self.sweep.should_sweep((self.sweep_roll)()) {
            match lifecycle
                .sweep_abandoned(self.config.retention(), Utc::now())
                .await
            {
                Ok(count) => {
                    info!(run_id = %run.run_id, swept = count, "Abandoned container sweep finished");
                    Some(count)
                }
                Err(e) => {
                    warn!(run_id = %run.run_id, error = %e, "Abandoned container sweep failed");
                    None
                }
            }
        } else {
            None
        };

        (Some(report), swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_syntax() {
        for code in ["de", "en-GB", "zh-Hans", "sr-Latn-RS", "yue"] {
            assert!(check_language_syntax(code, "target").is_ok(), "{}", code);
        }
        for code in ["", "d", "german!", "en_GB", "en-", "-en"] {
            assert!(check_language_syntax(code, "target").is_err(), "{}", code);
        }
    }
}
