//! Testing utilities and in-memory backends.
//!
//! This module provides implementations of the storage and translation
//! traits that run entirely in memory, so whole runs can be exercised
//! without a real account.
//!
//! # Example
//!
//! ```rust,ignore
//! use doctrans_core::testing::{fixtures, InMemoryStorage, MockTranslator};
//!
//! let storage = Arc::new(InMemoryStorage::new());
//! let translator = Arc::new(MockTranslator::new());
//! translator.echo_through(storage.clone()).await;
//! translator.script_statuses(vec![fixtures::snapshot("Succeeded", 0, 0, 2, 0)]).await;
//! ```

mod mock_storage;
mod mock_translator;

pub use mock_storage::InMemoryStorage;
pub use mock_translator::MockTranslator;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::translator::{DocumentCounts, JobStatusSnapshot};

    /// Creation time shared by every fixture snapshot.
    pub fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// A snapshot with the given counts, last touched at the base time.
    pub fn snapshot(
        status: &str,
        in_progress: u32,
        not_yet_started: u32,
        succeeded: u32,
        failed: u32,
    ) -> JobStatusSnapshot {
        snapshot_at(status, in_progress, not_yet_started, succeeded, failed, 0)
    }

    /// A snapshot last touched `tick` seconds after the base time.
    pub fn snapshot_at(
        status: &str,
        in_progress: u32,
        not_yet_started: u32,
        succeeded: u32,
        failed: u32,
        tick: i64,
    ) -> JobStatusSnapshot {
        JobStatusSnapshot {
            job_id: "mock-job".to_string(),
            status: status.to_string(),
            created_at: base_time(),
            last_action_at: base_time() + Duration::seconds(tick),
            documents: DocumentCounts {
                total: in_progress + not_yet_started + succeeded + failed,
                not_yet_started,
                in_progress,
                succeeded,
                failed,
                cancelled: 0,
            },
            error: None,
        }
    }

    /// Write `(name, size)` files filled with `x` into `dir`.
    pub fn write_files(dir: &Path, files: &[(&str, usize)]) -> Vec<PathBuf> {
        files
            .iter()
            .map(|(name, size)| {
                let path = dir.join(name);
                std::fs::write(&path, vec![b'x'; *size]).expect("write fixture file");
                path
            })
            .collect()
    }
}
