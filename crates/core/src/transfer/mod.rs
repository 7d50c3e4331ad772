//! Bounded-concurrency transfers between local files and a container.
//!
//! Uploads and downloads share the same shape: one admission gate of
//! `max_concurrency` permits per phase, a permit held for the whole transfer,
//! per-file failures collected rather than aborting the batch, and a join
//! barrier before the summary is returned.

mod download;
mod types;
mod upload;

pub use download::DownloadManager;
pub use types::*;
pub use upload::UploadManager;
