//! Concurrent upload of local files into a container.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{BYTES_TRANSFERRED, FILES_TRANSFERRED};
use crate::storage::ObjectStorage;

use super::{SourceFile, TransferDirection, TransferSummary};

/// Error text recorded for files skipped because the run was cancelled.
pub(crate) const CANCELLED: &str = "transfer cancelled";

/// Pushes local files into a container, at most `max_concurrency` at a time.
pub struct UploadManager {
    storage: Arc<dyn ObjectStorage>,
    max_concurrency: usize,
}

impl UploadManager {
    pub fn new(storage: Arc<dyn ObjectStorage>, max_concurrency: usize) -> Self {
        Self {
            storage,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Upload every file under its flattened name.
    ///
    /// When several files flatten to the same name only the last one in
    /// input order is uploaded; the others are reported as failures.
    /// Failed files are reported in the summary and never abort the batch.
    /// Returns once every upload has settled.
    pub async fn upload(
        &self,
        container: &str,
        files: &[SourceFile],
        cancel: &CancellationToken,
    ) -> TransferSummary {
        let mut summary = TransferSummary::default();
        let direction = TransferDirection::Upload.as_str();

        let (files, superseded) = latest_by_name(files);
        for (file, replacement) in superseded {
            FILES_TRANSFERRED.with_label_values(&[direction, "error"]).inc();
            warn!(
                path = %file.path.display(),
                replacement = %replacement.path.display(),
                name = %file.name,
                "Skipping file that shares its storage name with a later file"
            );
            summary.record_failure(
                file.name.clone(),
                format!(
                    "{} superseded by {}",
                    file.path.display(),
                    replacement.path.display()
                ),
            );
        }

        // One gate per phase; a permit covers the whole transfer.
        let gate = Arc::new(Semaphore::new(self.max_concurrency));

        let results = join_all(files.into_iter().map(|file| {
            let gate = Arc::clone(&gate);
            async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(CANCELLED.to_string()),
                    result = async {
                        let _permit = gate
                            .acquire_owned()
                            .await
                            .map_err(|e| e.to_string())?;
                        self.upload_one(container, file).await
                    } => result,
                };
                (file, result)
            }
        }))
        .await;

        for (file, result) in results {
            match result {
                Ok(bytes) => {
                    FILES_TRANSFERRED.with_label_values(&[direction, "ok"]).inc();
                    BYTES_TRANSFERRED.with_label_values(&[direction]).inc_by(bytes);
                    summary.record_success(file.name.clone(), bytes);
                }
                Err(error) => {
                    FILES_TRANSFERRED.with_label_values(&[direction, "error"]).inc();
                    warn!(
                        path = %file.path.display(),
                        container = %container,
                        error = %error,
                        "Upload failed"
                    );
                    summary.record_failure(file.name.clone(), error);
                }
            }
        }

        info!(
            container = %container,
            count = summary.count,
            bytes = summary.total_bytes,
            failed = summary.failures.len(),
            "Upload phase complete"
        );
        summary
    }

    async fn upload_one(&self, container: &str, file: &SourceFile) -> Result<u64, String> {
        let data = tokio::fs::read(&file.path)
            .await
            .map_err(|e| format!("failed to read {}: {}", file.path.display(), e))?;
        let bytes = data.len() as u64;

        self.storage
            .upload_object(container, &file.name, data)
            .await
            .map_err(|e| e.to_string())?;

        debug!(name = %file.name, bytes, "Uploaded file");
        Ok(bytes)
    }
}

/// Keep the last file for each storage name, preserving input order.
///
/// Also returns every dropped file paired with the file that replaced it.
fn latest_by_name(files: &[SourceFile]) -> (Vec<&SourceFile>, Vec<(&SourceFile, &SourceFile)>) {
    let mut last: HashMap<&str, usize> = HashMap::new();
    for (index, file) in files.iter().enumerate() {
        last.insert(file.name.as_str(), index);
    }

    let mut kept = Vec::with_capacity(last.len());
    let mut superseded = Vec::new();
    for (index, file) in files.iter().enumerate() {
        match last.get(file.name.as_str()) {
            Some(&winner) if winner != index => superseded.push((file, &files[winner])),
            _ => kept.push(file),
        }
    }
    (kept, superseded)
}
