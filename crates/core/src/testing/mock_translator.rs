//! Mock translation service for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::ObjectStorage;
use crate::translator::{
    JobRequest, JobStatusSnapshot, ProcessingHandle, ServiceError, TranslationBackend,
    TranslatorError,
};

use super::fixtures;

/// Mock implementation of the TranslationBackend trait.
///
/// Provides controllable behavior for testing:
/// - Scripted status sequences (the last snapshot repeats)
/// - Rejected submissions and failing status checks
/// - Recorded job requests and call counters
/// - Optional "echo" mode that copies source objects into the target
///   container on submission, standing in for the translated output
///
/// # Example
///
/// ```rust,ignore
/// let translator = MockTranslator::new();
/// translator.script_statuses(vec![
///     fixtures::snapshot("Running", 1, 0, 0, 0),
///     fixtures::snapshot("Succeeded", 0, 0, 1, 0),
/// ]).await;
///
/// // ... run ...
///
/// assert_eq!(translator.submitted_requests().await.len(), 1);
/// assert_eq!(translator.status_checks(), 2);
/// ```
pub struct MockTranslator {
    languages: Arc<RwLock<Vec<String>>>,
    /// If set, every submission is rejected with this payload.
    rejection: Arc<RwLock<Option<ServiceError>>>,
    /// If set, every status check fails with this message.
    status_error: Arc<RwLock<Option<String>>>,
    script: Arc<RwLock<VecDeque<JobStatusSnapshot>>>,
    submitted: Arc<RwLock<Vec<JobRequest>>>,
    /// Storage the echo mode copies through.
    echo_storage: Arc<RwLock<Option<Arc<dyn ObjectStorage>>>>,
    status_checks: AtomicUsize,
    total_calls: AtomicUsize,
}

impl std::fmt::Debug for MockTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTranslator")
            .field("status_checks", &self.status_checks())
            .field("total_calls", &self.total_calls())
            .finish()
    }
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranslator {
    /// Create a mock that accepts common languages and reports success.
    pub fn new() -> Self {
        Self {
            languages: Arc::new(RwLock::new(
                ["de", "en", "es", "fr", "it", "ja", "zh-Hans"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            )),
            rejection: Arc::new(RwLock::new(None)),
            status_error: Arc::new(RwLock::new(None)),
            script: Arc::new(RwLock::new(VecDeque::new())),
            submitted: Arc::new(RwLock::new(Vec::new())),
            echo_storage: Arc::new(RwLock::new(None)),
            status_checks: AtomicUsize::new(0),
            total_calls: AtomicUsize::new(0),
        }
    }

    pub async fn set_languages(&self, languages: &[&str]) {
        *self.languages.write().await = languages.iter().map(|s| s.to_string()).collect();
    }

    /// Reject every submission with `error`.
    pub async fn reject_submissions(&self, error: ServiceError) {
        *self.rejection.write().await = Some(error);
    }

    /// Fail every status check.
    pub async fn fail_status_checks(&self, message: &str) {
        *self.status_error.write().await = Some(message.to_string());
    }

    /// Snapshots returned by successive status checks.
    pub async fn script_statuses(&self, snapshots: Vec<JobStatusSnapshot>) {
        *self.script.write().await = snapshots.into();
    }

    /// Copy source objects into the target container on submission.
    pub async fn echo_through(&self, storage: Arc<dyn ObjectStorage>) {
        *self.echo_storage.write().await = Some(storage);
    }

    pub async fn submitted_requests(&self) -> Vec<JobRequest> {
        self.submitted.read().await.clone()
    }

    pub fn status_checks(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }

    /// Every call made through the trait.
    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    async fn echo(&self, request: &JobRequest) -> Result<(), TranslatorError> {
        let Some(storage) = self.echo_storage.read().await.clone() else {
            return Ok(());
        };
        let source = container_from_url(&request.source.source_url);
        let io_error = |e: crate::storage::StorageError| TranslatorError::ApiError(e.to_string());

        for target in &request.targets {
            let target_container = container_from_url(&target.target_url);
            for object in storage.list_objects(&source).await.map_err(io_error)? {
                let data = storage
                    .download_object(&source, &object.name)
                    .await
                    .map_err(io_error)?;
                storage
                    .upload_object(&target_container, &object.name, data)
                    .await
                    .map_err(io_error)?;
            }
        }
        Ok(())
    }
}

/// Last path segment of a container URL, ignoring the query.
fn container_from_url(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    let without_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    without_scheme
        .split('/')
        .filter(|s| !s.is_empty())
        .last()
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl TranslationBackend for MockTranslator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit_job(&self, request: &JobRequest) -> Result<ProcessingHandle, TranslatorError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.write().await.push(request.clone());

        if let Some(error) = self.rejection.read().await.clone() {
            return Err(TranslatorError::Rejected { status: 400, error });
        }

        self.echo(request).await?;
        let count = self.submitted.read().await.len();
        Ok(ProcessingHandle(format!("mock://batches/job-{}", count)))
    }

    async fn check_status(
        &self,
        _handle: &ProcessingHandle,
    ) -> Result<JobStatusSnapshot, TranslatorError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        self.status_checks.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.status_error.read().await.clone() {
            return Err(TranslatorError::ConnectionFailed(message));
        }

        let mut script = self.script.write().await;
        let snapshot = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        Ok(snapshot.unwrap_or_else(|| fixtures::snapshot("Succeeded", 0, 0, 0, 0)))
    }

    async fn supported_languages(&self) -> Result<Vec<String>, TranslatorError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.languages.read().await.clone())
    }
}
