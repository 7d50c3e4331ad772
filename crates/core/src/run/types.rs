//! Types for translation runs.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::glossary::GlossaryError;
use crate::lifecycle::CleanupReport;
use crate::naming::RunContainers;
use crate::poller::JobPhase;
use crate::storage::StorageError;
use crate::transfer::TransferSummary;
use crate::translator::{ServiceError, TranslatorError};

/// Errors that end a translation run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The request cannot be run as given. Raised before anything remote exists.
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The translation service refused the job.
    #[error("job submission rejected: {0}")]
    Submission(ServiceError),

    /// The job ended in a failed state; nothing was downloaded.
    #[error("job finished with status {status}")]
    TerminalFailure { status: String },

    #[error("status check failed: {0}")]
    StatusCheck(TranslatorError),

    #[error("language lookup failed: {0}")]
    LanguageLookup(TranslatorError),

    #[error("glossary error: {0}")]
    Glossary(#[from] GlossaryError),

    #[error("run cancelled")]
    Cancelled,
}

impl RunError {
    /// Metrics label for a run that ended with this error.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            RunError::Argument(_) | RunError::Configuration(_) => "invalid",
            RunError::Glossary(GlossaryError::UnsupportedFormat { .. }) => "invalid",
            RunError::Submission(_) => "rejected",
            RunError::TerminalFailure { .. } => "failed",
            RunError::Cancelled => "cancelled",
            RunError::Storage(_)
            | RunError::StatusCheck(_)
            | RunError::LanguageLookup(_)
            | RunError::Glossary(_) => "error",
        }
    }
}

/// What to translate and where to put the results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub files: Vec<PathBuf>,
    /// `None` lets the service detect the source language.
    pub source_language: Option<String>,
    pub target_language: String,
    pub output_dir: PathBuf,
    pub glossaries: Vec<PathBuf>,
    /// Custom translation category (model id).
    pub category: Option<String>,
}

impl RunRequest {
    pub fn new(
        files: Vec<PathBuf>,
        target_language: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            files,
            source_language: None,
            target_language: target_language.into(),
            output_dir: output_dir.into(),
            glossaries: Vec::new(),
            category: None,
        }
    }

    pub fn with_source_language(mut self, language: impl Into<String>) -> Self {
        self.source_language = Some(language.into());
        self
    }

    pub fn with_glossaries(mut self, glossaries: Vec<PathBuf>) -> Self {
        self.glossaries = glossaries;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Summary of a run that reached the download phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub containers: RunContainers,
    pub final_status: JobPhase,
    /// Job status text as last reported by the service.
    pub service_status: String,
    pub discarded: Vec<PathBuf>,
    pub upload: TransferSummary,
    pub download: TransferSummary,
    /// `None` when cleanup was suppressed.
    pub cleanup: Option<CleanupReport>,
    /// Containers removed by the abandoned-container sweep, if it ran.
    pub swept: Option<usize>,
}

impl RunOutcome {
    /// Whether every accepted file made it through both transfers.
    pub fn is_complete(&self) -> bool {
        self.final_status == JobPhase::Succeeded
            && self.upload.is_complete()
            && self.download.is_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(RunError::Argument("x".into()).outcome_label(), "invalid");
        assert_eq!(
            RunError::Submission(ServiceError::new("InvalidRequest", "bad")).outcome_label(),
            "rejected"
        );
        assert_eq!(
            RunError::TerminalFailure {
                status: "Failed".into()
            }
            .outcome_label(),
            "failed"
        );
        assert_eq!(RunError::Cancelled.outcome_label(), "cancelled");
        assert_eq!(
            RunError::StatusCheck(TranslatorError::Timeout).outcome_label(),
            "error"
        );
    }

    #[test]
    fn test_request_builder() {
        let request = RunRequest::new(vec![PathBuf::from("a.docx")], "de", "out")
            .with_source_language("en")
            .with_category("general")
            .with_glossaries(vec![PathBuf::from("terms.tsv")]);

        assert_eq!(request.source_language.as_deref(), Some("en"));
        assert_eq!(request.category.as_deref(), Some("general"));
        assert_eq!(request.glossaries.len(), 1);
        assert_eq!(request.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_submission_error_display() {
        let err = RunError::Submission(ServiceError::new("InvalidRequest", "no access"));
        assert_eq!(
            err.to_string(),
            "job submission rejected: InvalidRequest: no access"
        );
    }
}
