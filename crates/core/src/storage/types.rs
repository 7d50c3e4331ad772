//! Types for object storage operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Object not found: {container}/{name}")]
    ObjectNotFound { container: String, name: String },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A container as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
    pub last_modified: DateTime<Utc>,
}

/// An object as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    pub size_bytes: u64,
}

/// Permissions granted by a time-limited URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlPermissions {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub list: bool,
}

impl UrlPermissions {
    /// Full access, as handed to the translation service for run containers.
    pub fn full() -> Self {
        Self {
            read: true,
            write: true,
            delete: true,
            list: true,
        }
    }

    pub fn read_only() -> Self {
        Self {
            read: true,
            write: false,
            delete: false,
            list: false,
        }
    }

    /// Compact permission string (subset of "rwdl").
    pub fn as_str(&self) -> String {
        let mut s = String::with_capacity(4);
        if self.read {
            s.push('r');
        }
        if self.write {
            s.push('w');
        }
        if self.delete {
            s.push('d');
        }
        if self.list {
            s.push('l');
        }
        s
    }
}

/// Remote object storage consumed by a translation run.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Returns the name of this storage implementation.
    fn name(&self) -> &str;

    /// Creates a container. Returns `false` if it already existed.
    async fn create_container_if_absent(&self, container: &str) -> Result<bool, StorageError>;

    /// Stores `data` under `name`, replacing any existing object.
    async fn upload_object(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError>;

    async fn list_objects(&self, container: &str) -> Result<Vec<ObjectInfo>, StorageError>;

    async fn download_object(&self, container: &str, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Deletes a container and everything in it.
    async fn delete_container(&self, container: &str) -> Result<(), StorageError>;

    /// Lists containers, optionally restricted to names starting with `prefix`.
    async fn list_containers(&self, prefix: Option<&str>) -> Result<Vec<ContainerInfo>, StorageError>;

    /// Generates a URL granting `permissions` until `expires_at`.
    ///
    /// With `object = None` the URL addresses the whole container.
    async fn generate_url(
        &self,
        container: &str,
        object: Option<&str>,
        permissions: UrlPermissions,
        expires_at: DateTime<Utc>,
    ) -> Result<String, StorageError>;
}
