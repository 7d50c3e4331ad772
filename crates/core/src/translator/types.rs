//! Types for translation service operations.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error payload returned by the translation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<Box<ServiceError>>,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            target: None,
            inner_error: None,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(inner) = &self.inner_error {
            write!(f, " ({})", inner)?;
        }
        Ok(())
    }
}

/// Errors that can occur during translation service operations.
#[derive(Debug, Error)]
pub enum TranslatorError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    /// The service answered with a structured error.
    #[error("Request rejected (HTTP {status}): {error}")]
    Rejected { status: u16, error: ServiceError },

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TranslatorError {
    /// The service's structured payload, synthesizing one for transport failures.
    pub fn service_error(&self) -> ServiceError {
        match self {
            TranslatorError::Rejected { error, .. } => error.clone(),
            TranslatorError::ConnectionFailed(msg) => ServiceError::new("ConnectionFailed", msg),
            TranslatorError::Timeout => ServiceError::new("Timeout", "request timed out"),
            TranslatorError::ApiError(msg) => ServiceError::new("ApiError", msg),
            TranslatorError::InvalidResponse(msg) => ServiceError::new("InvalidResponse", msg),
        }
    }
}

/// How source and target locations are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageType {
    /// The URL addresses a whole container.
    #[default]
    Folder,
    /// The URL addresses a single document.
    File,
}

/// A glossary attached to a translation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryDescriptor {
    pub glossary_url: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInput {
    pub source_url: String,
    /// Omitted to let the service detect the language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInput {
    pub target_url: String,
    pub language: String,
    #[serde(default)]
    pub glossaries: Vec<GlossaryDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// A batch translation job as submitted to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub storage_type: StorageType,
    pub source: SourceInput,
    pub targets: Vec<TargetInput>,
}

/// Opaque reference to a submitted job, used for status checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessingHandle(pub String);

impl ProcessingHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-document progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCounts {
    pub total: u32,
    pub not_yet_started: u32,
    pub in_progress: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub cancelled: u32,
}

/// Point-in-time read of a remote job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusSnapshot {
    pub job_id: String,
    /// Status string exactly as reported by the service.
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_action_at: DateTime<Utc>,
    pub documents: DocumentCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ServiceError>,
}

/// A hosted batch document translation service.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Returns the name of this backend implementation.
    fn name(&self) -> &str;

    /// Submits a job, returning the handle to poll it with.
    async fn submit_job(&self, request: &JobRequest) -> Result<ProcessingHandle, TranslatorError>;

    async fn check_status(
        &self,
        handle: &ProcessingHandle,
    ) -> Result<JobStatusSnapshot, TranslatorError>;

    /// Language codes accepted as translation targets.
    async fn supported_languages(&self) -> Result<Vec<String>, TranslatorError>;
}
