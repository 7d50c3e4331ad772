//! Extension-based partitioning of candidate input files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::run::RunError;

/// Result of partitioning a file list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Files whose extension is allowed, in input order.
    pub accepted: Vec<PathBuf>,
    /// Everything else, in input order.
    pub discarded: Vec<PathBuf>,
}

/// Lowercase extension without the leading dot.
pub fn normalized_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Split `paths` into files with an allowed extension and the rest.
///
/// Allowed extensions are compared case-insensitively and may be given with
/// or without a leading dot. An empty allow-set is a configuration error.
pub fn partition_by_extension<I, P, S>(paths: I, allowed: &[S]) -> Result<FilterOutcome, RunError>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
    S: AsRef<str>,
{
    let allowed: HashSet<String> = allowed
        .iter()
        .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();

    if allowed.is_empty() {
        return Err(RunError::Configuration(
            "no allowed file extensions configured".to_string(),
        ));
    }

    let mut outcome = FilterOutcome::default();
    for path in paths {
        let path = path.into();
        match normalized_extension(&path) {
            Some(ext) if allowed.contains(&ext) => outcome.accepted.push(path),
            _ => outcome.discarded.push(path),
        }
    }

    Ok(outcome)
}
