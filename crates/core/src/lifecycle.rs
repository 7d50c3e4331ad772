//! Creation, deletion and garbage collection of run containers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::metrics::{CONTAINERS_SWEPT, CONTAINER_DELETIONS};
use crate::naming::{ContainerRole, RunContainers};
use crate::storage::{ObjectStorage, StorageError};

/// Result of a best-effort cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    /// Containers that could not be deleted, with the error.
    pub failed: Vec<(String, String)>,
}

/// When a cleanup should also sweep abandoned containers.
///
/// Listing every container is expensive when many runs share one account,
/// so only a fraction of cleanups pay for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPolicy {
    probability: f64,
}

impl SweepPolicy {
    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }

    pub fn never() -> Self {
        Self::new(0.0)
    }

    pub fn always() -> Self {
        Self::new(1.0)
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Decide from a uniform roll in `[0, 1)`.
    pub fn should_sweep(&self, roll: f64) -> bool {
        roll < self.probability
    }
}

/// Manages the containers of translation runs.
pub struct ContainerLifecycleManager {
    storage: Arc<dyn ObjectStorage>,
}

impl ContainerLifecycleManager {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Create the three containers of a run. Existing containers are kept.
    pub async fn create_run_containers(&self, names: &RunContainers) -> Result<(), StorageError> {
        for (role, name) in names.iter() {
            let created = self.storage.create_container_if_absent(name).await?;
            debug!(container = %name, role = %role, created, "Ensured run container");
        }
        Ok(())
    }

    /// Delete the three containers of a run.
    ///
    /// Failures are logged and reported, never returned as errors.
    pub async fn delete_run_containers(&self, names: &RunContainers) -> CleanupReport {
        let mut report = CleanupReport::default();

        for (role, name) in names.iter() {
            match self.storage.delete_container(name).await {
                Ok(()) => {
                    CONTAINER_DELETIONS.with_label_values(&["ok"]).inc();
                    debug!(container = %name, role = %role, "Deleted run container");
                    report.deleted.push(name.to_string());
                }
                Err(e) => {
                    CONTAINER_DELETIONS.with_label_values(&["error"]).inc();
                    warn!(container = %name, role = %role, error = %e, "Failed to delete run container");
                    report.failed.push((name.to_string(), e.to_string()));
                }
            }
        }

        report
    }

    /// Delete run containers last modified more than `retention` before `now`.
    ///
    /// Only names carrying a role suffix are considered. A container exactly
    /// `retention` old is kept. Returns how many were deleted.
    pub async fn sweep_abandoned(
        &self,
        retention: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let containers = self.storage.list_containers(None).await?;
        let mut deleted = 0;

        for container in containers {
            if ContainerRole::from_container_name(&container.name).is_none() {
                continue;
            }
            let age = now - container.last_modified;
            if age <= retention {
                continue;
            }

            match self.storage.delete_container(&container.name).await {
                Ok(()) => {
                    CONTAINERS_SWEPT.inc();
                    info!(
                        container = %container.name,
                        age_hours = age.num_hours(),
                        "Swept abandoned container"
                    );
                    deleted += 1;
                }
                Err(e) => {
                    warn!(container = %container.name, error = %e, "Failed to sweep container");
                }
            }
        }

        Ok(deleted)
    }
}
