//! In-memory object storage for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::naming::is_valid_container_name;
use crate::storage::{ContainerInfo, ObjectInfo, ObjectStorage, StorageError, UrlPermissions};

#[derive(Debug, Clone)]
struct MemoryContainer {
    objects: BTreeMap<String, Vec<u8>>,
    last_modified: DateTime<Utc>,
}

impl MemoryContainer {
    fn new(last_modified: DateTime<Utc>) -> Self {
        Self {
            objects: BTreeMap::new(),
            last_modified,
        }
    }
}

/// Decrements the in-flight gauge when a transfer settles or is dropped.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock implementation of the ObjectStorage trait.
///
/// Provides controllable behavior for testing:
/// - Containers and objects kept in memory
/// - Per-object upload/download and per-container delete failures
/// - Artificial latency with a peak in-flight transfer gauge
/// - A counter of every storage call made
///
/// # Example
///
/// ```rust,ignore
/// let storage = Arc::new(InMemoryStorage::new());
/// storage.set_latency(Duration::from_millis(5)).await;
/// storage.fail_uploads_of("broken.docx").await;
///
/// // ... run uploads ...
///
/// assert!(storage.peak_in_flight() <= 4);
/// assert_eq!(storage.object_names("abcsrc").await, vec!["a.docx"]);
/// ```
#[derive(Debug)]
pub struct InMemoryStorage {
    containers: Arc<RwLock<BTreeMap<String, MemoryContainer>>>,
    failing_uploads: Arc<RwLock<HashSet<String>>>,
    failing_downloads: Arc<RwLock<HashSet<String>>>,
    failing_deletes: Arc<RwLock<HashSet<String>>>,
    fail_every_delete: AtomicBool,
    /// Containers deleted, in call order.
    deletions: Arc<RwLock<Vec<String>>>,
    latency: Arc<RwLock<Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    /// Create an empty storage with no latency.
    pub fn new() -> Self {
        Self {
            containers: Arc::new(RwLock::new(BTreeMap::new())),
            failing_uploads: Arc::new(RwLock::new(HashSet::new())),
            failing_downloads: Arc::new(RwLock::new(HashSet::new())),
            failing_deletes: Arc::new(RwLock::new(HashSet::new())),
            fail_every_delete: AtomicBool::new(false),
            deletions: Arc::new(RwLock::new(Vec::new())),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Add a container with a given modification time, bypassing name checks.
    pub async fn insert_container(&self, name: &str, last_modified: DateTime<Utc>) {
        self.containers
            .write()
            .await
            .insert(name.to_string(), MemoryContainer::new(last_modified));
    }

    /// Make every upload of `name` fail.
    pub async fn fail_uploads_of(&self, name: &str) {
        self.failing_uploads.write().await.insert(name.to_string());
    }

    /// Make every download of `name` fail.
    pub async fn fail_downloads_of(&self, name: &str) {
        self.failing_downloads.write().await.insert(name.to_string());
    }

    /// Make every delete of `container` fail.
    pub async fn fail_deletes_of(&self, container: &str) {
        self.failing_deletes.write().await.insert(container.to_string());
    }

    /// Make every container delete fail.
    pub fn fail_all_deletes(&self) {
        self.fail_every_delete.store(true, Ordering::SeqCst);
    }

    /// Delay applied to each upload and download.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    pub fn reset_peak_in_flight(&self) {
        self.peak_in_flight.store(0, Ordering::SeqCst);
    }

    /// Highest number of simultaneous uploads/downloads observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Total storage calls made through the trait.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn has_container(&self, name: &str) -> bool {
        self.containers.read().await.contains_key(name)
    }

    /// Sorted container names.
    pub async fn container_names(&self) -> Vec<String> {
        self.containers.read().await.keys().cloned().collect()
    }

    /// Sorted object names of a container, empty if it does not exist.
    pub async fn object_names(&self, container: &str) -> Vec<String> {
        self.containers
            .read()
            .await
            .get(container)
            .map(|c| c.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Containers successfully deleted, in call order.
    pub async fn deletions(&self) -> Vec<String> {
        self.deletions.read().await.clone()
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn begin_transfer(&self) -> InFlightGuard<'_> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlightGuard(&self.in_flight);

        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        guard
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_container_if_absent(&self, container: &str) -> Result<bool, StorageError> {
        self.record_call();
        if !is_valid_container_name(container) {
            return Err(StorageError::InvalidName(container.to_string()));
        }

        let mut containers = self.containers.write().await;
        if containers.contains_key(container) {
            return Ok(false);
        }
        containers.insert(container.to_string(), MemoryContainer::new(Utc::now()));
        Ok(true)
    }

    async fn upload_object(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.record_call();
        let _guard = self.begin_transfer().await;

        if self.failing_uploads.read().await.contains(name) {
            return Err(StorageError::Backend(format!("simulated upload failure: {}", name)));
        }

        let mut containers = self.containers.write().await;
        let entry = containers
            .get_mut(container)
            .ok_or_else(|| StorageError::ContainerNotFound(container.to_string()))?;
        entry.objects.insert(name.to_string(), data);
        entry.last_modified = Utc::now();
        Ok(())
    }

    async fn list_objects(&self, container: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        self.record_call();
        let containers = self.containers.read().await;
        let entry = containers
            .get(container)
            .ok_or_else(|| StorageError::ContainerNotFound(container.to_string()))?;
        Ok(entry
            .objects
            .iter()
            .map(|(name, data)| ObjectInfo {
                name: name.clone(),
                size_bytes: data.len() as u64,
            })
            .collect())
    }

    async fn download_object(&self, container: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        self.record_call();
        let _guard = self.begin_transfer().await;

        if self.failing_downloads.read().await.contains(name) {
            return Err(StorageError::Backend(format!("simulated download failure: {}", name)));
        }

        let containers = self.containers.read().await;
        let entry = containers
            .get(container)
            .ok_or_else(|| StorageError::ContainerNotFound(container.to_string()))?;
        entry
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::ObjectNotFound {
                container: container.to_string(),
                name: name.to_string(),
            })
    }

    async fn delete_container(&self, container: &str) -> Result<(), StorageError> {
        self.record_call();
        if self.fail_every_delete.load(Ordering::SeqCst)
            || self.failing_deletes.read().await.contains(container)
        {
            return Err(StorageError::Backend(format!(
                "simulated delete failure: {}",
                container
            )));
        }

        if self.containers.write().await.remove(container).is_none() {
            return Err(StorageError::ContainerNotFound(container.to_string()));
        }
        self.deletions.write().await.push(container.to_string());
        Ok(())
    }

    async fn list_containers(&self, prefix: Option<&str>) -> Result<Vec<ContainerInfo>, StorageError> {
        self.record_call();
        Ok(self
            .containers
            .read()
            .await
            .iter()
            .filter(|(name, _)| prefix.map_or(true, |p| name.starts_with(p)))
            .map(|(name, c)| ContainerInfo {
                name: name.clone(),
                last_modified: c.last_modified,
            })
            .collect())
    }

    async fn generate_url(
        &self,
        container: &str,
        object: Option<&str>,
        permissions: UrlPermissions,
        expires_at: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        self.record_call();
        if !self.has_container(container).await {
            return Err(StorageError::ContainerNotFound(container.to_string()));
        }

        let resource = match object {
            Some(name) => format!("{}/{}", container, name),
            None => container.to_string(),
        };
        Ok(format!(
            "memory://{}?sp={}&se={}",
            resource,
            permissions.as_str(),
            expires_at.timestamp()
        ))
    }
}
