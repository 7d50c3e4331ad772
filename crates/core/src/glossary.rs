//! Glossary staging.
//!
//! Glossary files are uploaded into the run's glossary container and turned
//! into descriptors the job request can reference.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::filter::normalized_extension;
use crate::storage::{ObjectStorage, StorageError, UrlPermissions};
use crate::transfer::SourceFile;
use crate::translator::GlossaryDescriptor;

/// Errors that can occur while staging glossaries.
#[derive(Debug, Error)]
pub enum GlossaryError {
    #[error("Unsupported glossary format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to read glossary {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Glossary storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Service format name for a glossary file, by extension.
pub fn glossary_format(path: &Path) -> Option<&'static str> {
    let format = match normalized_extension(path)?.as_str() {
        "tsv" | "tab" => "TSV",
        "csv" => "CSV",
        "xlf" | "xliff" => "XLIFF",
        "tmx" => "TMX",
        "utx" => "UTX",
        "xlsx" => "XLSX",
        _ => return None,
    };
    Some(format)
}

/// Check every glossary has a known format before anything is uploaded.
pub fn check_formats(files: &[PathBuf]) -> Result<(), GlossaryError> {
    for path in files {
        if glossary_format(path).is_none() {
            return Err(GlossaryError::UnsupportedFormat { path: path.clone() });
        }
    }
    Ok(())
}

/// Uploads glossaries into one container and cleans it up again.
pub struct GlossaryManager {
    storage: Arc<dyn ObjectStorage>,
    container: String,
}

impl GlossaryManager {
    pub fn new(storage: Arc<dyn ObjectStorage>, container: impl Into<String>) -> Self {
        Self {
            storage,
            container: container.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Upload `files` and return one descriptor per storage name.
    ///
    /// Files sharing a base name map to the same object; the later file wins.
    /// The descriptor URLs are readable until `expires_at`.
    pub async fn upload(
        &self,
        files: &[PathBuf],
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<GlossaryDescriptor>, GlossaryError> {
        let mut descriptors: BTreeMap<String, GlossaryDescriptor> = BTreeMap::new();

        for path in files {
            let format = glossary_format(path)
                .ok_or_else(|| GlossaryError::UnsupportedFormat { path: path.clone() })?;
            let file = SourceFile::new(path.clone())
                .ok_or_else(|| GlossaryError::UnsupportedFormat { path: path.clone() })?;

            let data = tokio::fs::read(&file.path)
                .await
                .map_err(|source| GlossaryError::Read {
                    path: file.path.clone(),
                    source,
                })?;

            self.storage
                .upload_object(&self.container, &file.name, data)
                .await?;
            let url = self
                .storage
                .generate_url(
                    &self.container,
                    Some(&file.name),
                    UrlPermissions::read_only(),
                    expires_at,
                )
                .await?;

            debug!(name = %file.name, format, "Staged glossary");
            descriptors.insert(
                file.name,
                GlossaryDescriptor {
                    glossary_url: url,
                    format: format.to_string(),
                },
            );
        }

        if !descriptors.is_empty() {
            info!(
                container = %self.container,
                count = descriptors.len(),
                "Glossaries uploaded"
            );
        }
        Ok(descriptors.into_values().collect())
    }
}
