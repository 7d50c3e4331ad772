//! Run event surface.
//!
//! The orchestrator reports progress through an [`EventSink`]: discarded
//! files, upload completion, job status updates and download completion, in
//! that order. Events travel over a bounded channel the caller drains.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::transfer::TransferSummary;
use crate::translator::{JobStatusSnapshot, ServiceError};

/// A job status notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusUpdate {
    /// A fresh status read of the submitted job.
    Snapshot(JobStatusSnapshot),
    /// The service refused the job request.
    Rejected(ServiceError),
}

/// Something a caller may want to show while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Inputs dropped because their extension is not allowed.
    FilesDiscarded { paths: Vec<PathBuf> },
    UploadComplete(TransferSummary),
    StatusUpdate(StatusUpdate),
    DownloadComplete(TransferSummary),
}

impl RunEvent {
    /// Short name for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            RunEvent::FilesDiscarded { .. } => "files_discarded",
            RunEvent::UploadComplete(_) => "upload_complete",
            RunEvent::StatusUpdate(_) => "status_update",
            RunEvent::DownloadComplete(_) => "download_complete",
        }
    }
}

/// Envelope wrapping a run event with metadata
#[derive(Debug, Clone, Serialize)]
pub struct RunEventEnvelope {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: RunEvent,
}

/// Handle for emitting run events
///
/// This is cheaply cloneable. A sink without a channel drops every event,
/// which suits callers that only care about the final outcome.
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<RunEventEnvelope>>,
}

impl EventSink {
    /// Create a new sink from a channel sender
    pub fn new(tx: mpsc::Sender<RunEventEnvelope>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit an event for `run_id`.
    ///
    /// Waits for channel capacity. If the receiver is gone the error is logged
    /// and the run carries on.
    pub async fn emit(&self, run_id: &str, event: RunEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        let envelope = RunEventEnvelope {
            run_id: run_id.to_string(),
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = tx.send(envelope).await {
            tracing::warn!(
                run_id = %run_id,
                event = e.0.event.event_type(),
                "Dropped run event, receiver closed"
            );
        }
    }
}

/// Create a sink and the receiver the caller drains.
pub fn create_event_channel(buffer_size: usize) -> (EventSink, mpsc::Receiver<RunEventEnvelope>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (EventSink::new(tx), rx)
}
