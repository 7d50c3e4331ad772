//! Directory-backed object storage.
//!
//! Each container is a directory under the configured root and each object
//! is a regular file inside it. Useful for development and for translation
//! services that can reach the same filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::naming::is_valid_container_name;

use super::{ContainerInfo, ObjectInfo, ObjectStorage, StorageError, UrlPermissions};

/// Local filesystem implementation of [`ObjectStorage`].
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    account_key: String,
}

impl LocalObjectStorage {
    /// Create a storage rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>, account_key: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            account_key: account_key.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_path(&self, container: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_container_name(container) {
            return Err(StorageError::InvalidName(container.to_string()));
        }
        Ok(self.root.join(container))
    }

    fn object_path(&self, container: &str, name: &str) -> Result<PathBuf, StorageError> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.container_path(container)?.join(name))
    }

    async fn require_container(&self, container: &str) -> Result<PathBuf, StorageError> {
        let path = self.container_path(container)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(StorageError::ContainerNotFound(container.to_string()));
        }
        Ok(path)
    }

    /// Signature over the resource, permissions and expiry, keyed by the account key.
    fn sign(&self, resource: &str, permissions: &str, expiry: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.account_key.as_bytes());
        hasher.update(b"\n");
        hasher.update(resource.as_bytes());
        hasher.update(b"\n");
        hasher.update(permissions.as_bytes());
        hasher.update(b"\n");
        hasher.update(expiry.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    fn name(&self) -> &str {
        "local"
    }

    async fn create_container_if_absent(&self, container: &str) -> Result<bool, StorageError> {
        let path = self.container_path(container)?;
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        tokio::fs::create_dir_all(&path).await?;
        debug!(container = %container, "Created container");
        Ok(true)
    }

    async fn upload_object(
        &self,
        container: &str,
        name: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.require_container(container).await?;
        let path = self.object_path(container, name)?;
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn list_objects(&self, container: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let path = self.require_container(container).await?;
        let mut entries = tokio::fs::read_dir(&path).await?;
        let mut objects = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            objects.push(ObjectInfo {
                name: entry.file_name().to_string_lossy().to_string(),
                size_bytes: metadata.len(),
            });
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    async fn download_object(&self, container: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        self.require_container(container).await?;
        let path = self.object_path(container, name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::ObjectNotFound {
                    container: container.to_string(),
                    name: name.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_container(&self, container: &str) -> Result<(), StorageError> {
        let path = self.container_path(container)?;
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                debug!(container = %container, "Deleted container");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::ContainerNotFound(container.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_containers(&self, prefix: Option<&str>) -> Result<Vec<ContainerInfo>, StorageError> {
        if !tokio::fs::try_exists(&self.root).await? {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut containers = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(prefix) = prefix {
                if !name.starts_with(prefix) {
                    continue;
                }
            }
            let last_modified: DateTime<Utc> = metadata.modified()?.into();
            containers.push(ContainerInfo {
                name,
                last_modified,
            });
        }

        containers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(containers)
    }

    async fn generate_url(
        &self,
        container: &str,
        object: Option<&str>,
        permissions: UrlPermissions,
        expires_at: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let container_path = self.require_container(container).await?;
        let path = match object {
            Some(name) => self.object_path(container, name)?,
            None => container_path,
        };
        let absolute = std::path::absolute(&path)?;
        let resource = absolute.to_string_lossy().replace('\\', "/");

        let sp = permissions.as_str();
        let se = expires_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let sig = self.sign(&resource, &sp, &se);

        let encoded = resource
            .split('/')
            .map(urlencoding::encode)
            .collect::<Vec<_>>()
            .join("/");
        let encoded = if encoded.starts_with('/') {
            encoded
        } else {
            format!("/{}", encoded)
        };

        Ok(format!(
            "file://{}?sp={}&se={}&sig={}",
            encoded,
            sp,
            urlencoding::encode(&se),
            sig
        ))
    }
}
