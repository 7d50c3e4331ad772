pub mod config;
pub mod events;
pub mod filter;
pub mod glossary;
pub mod lifecycle;
pub mod metrics;
pub mod naming;
pub mod poller;
pub mod run;
pub mod storage;
pub mod testing;
pub mod transfer;
pub mod translator;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, RunConfig,
    SanitizedConfig, StorageBackend, MAX_RETENTION_DAYS, MAX_URL_EXPIRY_HOURS,
};
pub use events::{create_event_channel, EventSink, RunEvent, RunEventEnvelope, StatusUpdate};
pub use lifecycle::{CleanupReport, ContainerLifecycleManager, SweepPolicy};
pub use naming::{ContainerRole, RunContainers};
pub use poller::JobPhase;
pub use run::{RunError, RunOrchestrator, RunOutcome, RunRequest};
pub use storage::{LocalObjectStorage, ObjectStorage, StorageError};
pub use transfer::TransferSummary;
pub use translator::{HttpTranslator, JobStatusSnapshot, ServiceError, TranslationBackend};
