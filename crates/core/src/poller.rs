//! Status polling of submitted translation jobs.
//!
//! The poller reads the job status on a fixed interval until the service
//! stops reporting activity, forwarding changed snapshots to the event sink.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::{EventSink, RunEvent, StatusUpdate};
use crate::metrics::STATUS_POLLS;
use crate::run::RunError;
use crate::translator::{JobStatusSnapshot, ProcessingHandle, TranslationBackend};

/// Where a submitted job stands from the run's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Nothing read yet.
    Unknown,
    Submitted,
    Polling,
    Succeeded,
    /// Finished, but some documents failed.
    PartiallyFailed,
    Failed,
    Cancelled,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Succeeded | JobPhase::PartiallyFailed | JobPhase::Failed | JobPhase::Cancelled
        )
    }

    /// Whether results should be fetched after reaching this phase.
    pub fn proceeds_to_download(&self) -> bool {
        matches!(
            self,
            JobPhase::Succeeded | JobPhase::PartiallyFailed | JobPhase::Cancelled
        )
    }

    /// Classify the last snapshot of a job that is no longer active.
    pub fn from_final_snapshot(snapshot: &JobStatusSnapshot) -> Self {
        let status = snapshot.status.to_ascii_lowercase();
        if status.contains("fail") {
            JobPhase::Failed
        } else if status == "canceled" || status == "cancelled" {
            JobPhase::Cancelled
        } else if snapshot.documents.failed > 0 {
            JobPhase::PartiallyFailed
        } else {
            JobPhase::Succeeded
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Unknown => "unknown",
            JobPhase::Submitted => "submitted",
            JobPhase::Polling => "polling",
            JobPhase::Succeeded => "succeeded",
            JobPhase::PartiallyFailed => "partially_failed",
            JobPhase::Failed => "failed",
            JobPhase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the service still reports work on the job.
pub fn is_active(snapshot: &JobStatusSnapshot) -> bool {
    snapshot.documents.in_progress > 0
        || snapshot.documents.not_yet_started > 0
        || snapshot.status.eq_ignore_ascii_case("NotStarted")
        || snapshot.status.eq_ignore_ascii_case("Cancelling")
}

/// Result of polling a job to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub phase: JobPhase,
    /// The snapshot that ended the loop.
    pub snapshot: JobStatusSnapshot,
    /// Status checks issued, including the last one.
    pub checks: u32,
}

/// Polls one job until it stops being active.
pub struct StatusPoller {
    backend: Arc<dyn TranslationBackend>,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(backend: Arc<dyn TranslationBackend>, interval: Duration) -> Self {
        Self { backend, interval }
    }

    /// Check the status every interval until the job is no longer active.
    ///
    /// A status event is emitted whenever the job's last-action timestamp
    /// moves, plus one final event for the snapshot that ends the loop.
    pub async fn poll_until_done(
        &self,
        handle: &ProcessingHandle,
        run_id: &str,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, RunError> {
        let mut phase = JobPhase::Submitted;
        let mut last_action_at = None;
        let mut checks = 0u32;

        loop {
            checks += 1;
            STATUS_POLLS.inc();

            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RunError::Cancelled),
                result = self.backend.check_status(handle) => result.map_err(RunError::StatusCheck)?,
            };

            if !is_active(&snapshot) {
                let terminal = JobPhase::from_final_snapshot(&snapshot);
                sink.emit(
                    run_id,
                    RunEvent::StatusUpdate(StatusUpdate::Snapshot(snapshot.clone())),
                )
                .await;
                info!(
                    run_id = %run_id,
                    job_id = %snapshot.job_id,
                    status = %snapshot.status,
                    phase = %terminal,
                    checks,
                    succeeded = snapshot.documents.succeeded,
                    failed = snapshot.documents.failed,
                    "Job finished"
                );
                return Ok(PollOutcome {
                    phase: terminal,
                    snapshot,
                    checks,
                });
            }

            if phase != JobPhase::Polling {
                debug!(run_id = %run_id, from = %phase, to = %JobPhase::Polling, "Job phase changed");
                phase = JobPhase::Polling;
            }

            if last_action_at != Some(snapshot.last_action_at) {
                last_action_at = Some(snapshot.last_action_at);
                debug!(
                    run_id = %run_id,
                    status = %snapshot.status,
                    in_progress = snapshot.documents.in_progress,
                    not_yet_started = snapshot.documents.not_yet_started,
                    "Job status changed"
                );
                sink.emit(
                    run_id,
                    RunEvent::StatusUpdate(StatusUpdate::Snapshot(snapshot)),
                )
                .await;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RunError::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
