use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the local backend.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Secret used to sign time-limited container URLs.
    #[serde(default)]
    pub account_key: String,
    /// Lifetime of generated container URLs.
    #[serde(default = "default_url_expiry_hours")]
    pub url_expiry_hours: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_storage_root(),
            account_key: String::new(),
            url_expiry_hours: default_url_expiry_hours(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("doctrans-storage")
}

fn default_url_expiry_hours() -> u32 {
    48
}

/// Available object storage backends
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Local,
}

/// Translation service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranslatorConfig {
    /// Service endpoint (e.g., "https://myresource.cognitiveservices.azure.com")
    pub endpoint: String,
    /// Subscription key
    pub api_key: String,
    /// Resource region, sent along with the key when set
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Host serving the supported-language list.
    #[serde(default = "default_languages_endpoint")]
    pub languages_endpoint: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_api_version() -> String {
    "v1.1".to_string()
}

fn default_languages_endpoint() -> String {
    "https://api.cognitive.microsofttranslator.com".to_string()
}

fn default_timeout() -> u32 {
    30
}

/// Per-run behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Lowercase file extensions (without the dot) accepted for translation.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Maximum in-flight transfers per phase.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Delay between job status checks (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Containers from abandoned runs older than this are swept.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Chance (0.0-1.0) that a cleanup also sweeps abandoned containers.
    #[serde(default = "default_sweep_probability")]
    pub sweep_probability: f64,
    /// Leave all containers in place after the run (debugging aid).
    #[serde(default)]
    pub no_delete: bool,
    /// Capacity of the run event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_allowed_extensions() -> Vec<String> {
    [
        "docx", "xlsx", "pptx", "pdf", "html", "htm", "txt", "md", "msg", "odt", "ods", "odp",
        "rtf", "tsv", "csv", "xlf", "xliff",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_concurrency() -> usize {
    100
}

fn default_poll_interval() -> u64 {
    1000 // 1 second
}

fn default_retention_days() -> u32 {
    7
}

fn default_sweep_probability() -> f64 {
    0.1
}

fn default_event_buffer() -> usize {
    64
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            max_concurrency: default_max_concurrency(),
            poll_interval_ms: default_poll_interval(),
            retention_days: default_retention_days(),
            sweep_probability: default_sweep_probability(),
            no_delete: false,
            event_buffer: default_event_buffer(),
        }
    }
}

impl RunConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}

/// Sanitized config for display (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub storage: SanitizedStorageConfig,
    pub translator: SanitizedTranslatorConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub backend: String,
    pub root: PathBuf,
    pub account_key_configured: bool,
    pub url_expiry_hours: u32,
}

/// Sanitized translator config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTranslatorConfig {
    pub endpoint: String,
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub api_version: String,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            storage: SanitizedStorageConfig {
                backend: match config.storage.backend {
                    StorageBackend::Local => "local".to_string(),
                },
                root: config.storage.root.clone(),
                account_key_configured: !config.storage.account_key.is_empty(),
                url_expiry_hours: config.storage.url_expiry_hours,
            },
            translator: SanitizedTranslatorConfig {
                endpoint: config.translator.endpoint.clone(),
                api_key_configured: !config.translator.api_key.is_empty(),
                region: config.translator.region.clone(),
                api_version: config.translator.api_version.clone(),
                timeout_secs: config.translator.timeout_secs,
            },
            run: config.run.clone(),
        }
    }
}
