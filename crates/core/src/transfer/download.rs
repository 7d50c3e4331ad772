//! Concurrent download of a container into a local directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{BYTES_TRANSFERRED, FILES_TRANSFERRED};
use crate::storage::{ObjectInfo, ObjectStorage, StorageError};

use super::upload::CANCELLED;
use super::{TransferDirection, TransferSummary};

/// Pulls every object of a container into a directory, at most
/// `max_concurrency` at a time.
pub struct DownloadManager {
    storage: Arc<dyn ObjectStorage>,
    max_concurrency: usize,
}

impl DownloadManager {
    pub fn new(storage: Arc<dyn ObjectStorage>, max_concurrency: usize) -> Self {
        Self {
            storage,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Download everything currently listed in `container` into `dest_dir`.
    ///
    /// The directory is created if absent. Listing or directory creation
    /// failures fail the phase; per-object failures are reported in the summary.
    pub async fn download(
        &self,
        container: &str,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<TransferSummary, StorageError> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let objects = self.storage.list_objects(container).await?;
        debug!(container = %container, objects = objects.len(), "Listed target container");

        let gate = Arc::new(Semaphore::new(self.max_concurrency));

        let results = join_all(objects.iter().map(|object| {
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
                        self.download_one(container, object, dest_dir).await
                    } => result,
                };
                (object, result)
            }
        }))
        .await;

        let mut summary = TransferSummary::default();
        let direction = TransferDirection::Download.as_str();
        for (object, result) in results {
            match result {
                Ok(bytes) => {
                    FILES_TRANSFERRED.with_label_values(&[direction, "ok"]).inc();
                    BYTES_TRANSFERRED.with_label_values(&[direction]).inc_by(bytes);
                    summary.record_success(object.name.clone(), bytes);
                }
                Err(error) => {
                    FILES_TRANSFERRED.with_label_values(&[direction, "error"]).inc();
                    warn!(
                        name = %object.name,
                        container = %container,
                        error = %error,
                        "Download failed"
                    );
                    summary.record_failure(object.name.clone(), error);
                }
            }
        }

        info!(
            container = %container,
            dest = %dest_dir.display(),
            count = summary.count,
            bytes = summary.total_bytes,
            failed = summary.failures.len(),
            "Download phase complete"
        );
        Ok(summary)
    }

    async fn download_one(
        &self,
        container: &str,
        object: &ObjectInfo,
        dest_dir: &Path,
    ) -> Result<u64, String> {
        let dest = local_path(dest_dir, &object.name)
            .ok_or_else(|| format!("refusing unsafe object name {:?}", object.name))?;

        let data = self
            .storage
            .download_object(container, &object.name)
            .await
            .map_err(|e| e.to_string())?;
        let bytes = data.len() as u64;

        tokio::fs::write(&dest, data)
            .await
            .map_err(|e| format!("failed to write {}: {}", dest.display(), e))?;

        debug!(name = %object.name, bytes, "Downloaded file");
        Ok(bytes)
    }
}

/// Destination for an object, rejecting names that would leave `dest_dir`.
fn local_path(dest_dir: &Path, name: &str) -> Option<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(std::path::Component::Normal(file)), None) => Some(dest_dir.join(file)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStorage;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn seeded_storage(objects: &[(&str, usize)]) -> Arc<InMemoryStorage> {
        let storage = Arc::new(InMemoryStorage::new());
        storage.create_container_if_absent("runtgt").await.unwrap();
        for (name, size) in objects {
            storage
                .upload_object("runtgt", name, vec![0u8; *size])
                .await
                .unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn test_download_creates_directory_and_sums_bytes() {
        let storage = seeded_storage(&[("a.docx", 10), ("b.docx", 32)]).await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out/nested");

        let summary = DownloadManager::new(storage, 4)
            .download("runtgt", &dest, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_bytes, 42);
        assert_eq!(std::fs::read(dest.join("a.docx")).unwrap().len(), 10);
        assert_eq!(std::fs::read(dest.join("b.docx")).unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_empty_container_downloads_nothing() {
        let storage = seeded_storage(&[]).await;
        let dir = TempDir::new().unwrap();

        let summary = DownloadManager::new(storage, 4)
            .download("runtgt", dir.path(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary, TransferSummary::default());
    }

    #[tokio::test]
    async fn test_missing_container_fails_phase() {
        let storage = Arc::new(InMemoryStorage::new());
        let dir = TempDir::new().unwrap();

        let result = DownloadManager::new(storage, 4)
            .download("nonetgt", dir.path(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(StorageError::ContainerNotFound(_))));
    }

    #[tokio::test]
    async fn test_download_failure_is_reported_per_file() {
        let storage = seeded_storage(&[("a.docx", 1), ("b.docx", 2), ("c.docx", 3)]).await;
        storage.fail_downloads_of("b.docx").await;
        let dir = TempDir::new().unwrap();

        let summary = DownloadManager::new(storage, 2)
            .download("runtgt", dir.path(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_bytes, 4);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].name, "b.docx");
        assert!(!dir.path().join("b.docx").exists());
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_limit() {
        let names: Vec<String> = (0..12).map(|i| format!("doc{}.pdf", i)).collect();
        let objects: Vec<(&str, usize)> = names.iter().map(|n| (n.as_str(), 4)).collect();
        let storage = seeded_storage(&objects).await;
        storage.set_latency(Duration::from_millis(5)).await;
        storage.reset_peak_in_flight();
        let dir = TempDir::new().unwrap();

        let summary = DownloadManager::new(storage.clone(), 3)
            .download("runtgt", dir.path(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.count, 12);
        assert!(storage.peak_in_flight() <= 3);
        assert!(storage.peak_in_flight() >= 1);
    }

    #[test]
    fn test_local_path_rejects_traversal() {
        let dest = Path::new("/out");
        assert_eq!(local_path(dest, "a.docx"), Some(PathBuf::from("/out/a.docx")));
        assert_eq!(local_path(dest, "../a.docx"), None);
        assert_eq!(local_path(dest, "sub/a.docx"), None);
        assert_eq!(local_path(dest, "/etc/passwd"), None);
        assert_eq!(local_path(dest, ""), None);
    }
}
