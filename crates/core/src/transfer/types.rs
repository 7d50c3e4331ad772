//! Types for transfer operations.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// A local file queued for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Name in storage: the base filename, directories are flattened.
    pub name: String,
}

impl SourceFile {
    /// Returns `None` when the path has no file name component.
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let name = path.file_name()?.to_string_lossy().to_string();
        Some(Self { path, name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Direction of a transfer, used for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Upload,
    Download,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferDirection::Upload => "upload",
            TransferDirection::Download => "download",
        }
    }
}

/// A file that could not be transferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferFailure {
    pub name: String,
    pub error: String,
}

/// Outcome of one transfer phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    /// Number of files transferred successfully.
    pub count: usize,
    /// Bytes of the successfully transferred files.
    pub total_bytes: u64,
    /// Names of the transferred files.
    pub transferred: Vec<String>,
    pub failures: Vec<TransferFailure>,
}

impl TransferSummary {
    pub fn record_success(&mut self, name: String, bytes: u64) {
        self.count += 1;
        self.total_bytes += bytes;
        self.transferred.push(name);
    }

    pub fn record_failure(&mut self, name: String, error: impl ToString) {
        self.failures.push(TransferFailure {
            name,
            error: error.to_string(),
        });
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
