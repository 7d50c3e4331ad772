mod cli;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doctrans_core::{
    create_event_channel, load_config, validate_config, Config, ContainerLifecycleManager,
    HttpTranslator, LocalObjectStorage, ObjectStorage, RunError, RunEvent, RunEventEnvelope,
    RunOrchestrator, RunOutcome, RunRequest, SanitizedConfig, StatusUpdate, StorageBackend,
    TranslationBackend,
};

use cli::{Cli, Command, SweepArgs, TranslateArgs};

/// Exit code when the run finished but some documents were lost.
const EXIT_INCOMPLETE: i32 = 2;
/// Exit code after Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json);

    let registry = match metrics::registry() {
        Ok(registry) => registry,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    };
    let metrics_path = cli.metrics.clone();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            1
        }
    };

    if let Some(path) = metrics_path {
        if let Err(e) = metrics::write_metrics(&registry, &path) {
            warn!("{:#}", e);
        }
    }
    std::process::exit(code);
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays clean for results.
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<i32> {
    info!("Loading configuration from {:?}", cli.config);
    let mut config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    info!(
        storage_root = %sanitized.storage.root.display(),
        endpoint = %sanitized.translator.endpoint,
        max_concurrency = sanitized.run.max_concurrency,
        "Configuration loaded"
    );

    let storage = create_storage(&config);

    match cli.command {
        Command::Translate(args) => {
            let translator: Arc<dyn TranslationBackend> = Arc::new(
                HttpTranslator::new(config.translator.clone())
                    .context("Failed to create translation client")?,
            );
            if args.no_delete {
                config.run.no_delete = true;
            }
            translate(&config, storage, translator, args, cli.json).await
        }
        Command::Sweep(args) => sweep(&config, storage, args, cli.json).await,
    }
}

fn create_storage(config: &Config) -> Arc<dyn ObjectStorage> {
    match config.storage.backend {
        StorageBackend::Local => {
            info!("Using local object storage at {:?}", config.storage.root);
            Arc::new(LocalObjectStorage::new(
                config.storage.root.clone(),
                config.storage.account_key.clone(),
            ))
        }
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            token.cancel();
        }
    });
}

async fn translate(
    config: &Config,
    storage: Arc<dyn ObjectStorage>,
    translator: Arc<dyn TranslationBackend>,
    args: TranslateArgs,
    json: bool,
) -> Result<i32> {
    let (sink, rx) = create_event_channel(config.run.event_buffer);
    let printer = tokio::spawn(print_events(rx, json));

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let mut request = RunRequest::new(args.files, args.to, args.output).with_glossaries(args.glossaries);
    if let Some(from) = args.from {
        request = request.with_source_language(from);
    }
    if let Some(category) = args.category {
        request = request.with_category(category);
    }

    let orchestrator = RunOrchestrator::from_config(config, storage, translator).with_events(sink);
    let result = orchestrator.run(request, &cancel).await;

    // Dropping the orchestrator closes the event channel.
    drop(orchestrator);
    if let Err(e) = printer.await {
        warn!("Event printer stopped abnormally: {}", e);
    }

    match result {
        Ok(outcome) => {
            print_outcome(&outcome, json)?;
            Ok(if outcome.is_complete() { 0 } else { EXIT_INCOMPLETE })
        }
        Err(RunError::Cancelled) => {
            warn!("Run cancelled");
            Ok(EXIT_CANCELLED)
        }
        Err(e) => Err(e).context("Translation run failed"),
    }
}

async fn sweep(
    config: &Config,
    storage: Arc<dyn ObjectStorage>,
    args: SweepArgs,
    json: bool,
) -> Result<i32> {
    let retention_days = args.retention_days.unwrap_or(config.run.retention_days);
    let retention = chrono::Duration::days(i64::from(retention_days));

    let deleted = ContainerLifecycleManager::new(storage)
        .sweep_abandoned(retention, chrono::Utc::now())
        .await
        .context("Sweep failed")?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "retention_days": retention_days, "deleted": deleted })
        );
    } else {
        println!(
            "Deleted {} container(s) older than {} day(s)",
            deleted, retention_days
        );
    }
    Ok(0)
}

async fn print_events(mut rx: mpsc::Receiver<RunEventEnvelope>, json: bool) {
    while let Some(envelope) = rx.recv().await {
        if json {
            match serde_json::to_string(&envelope) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
            continue;
        }

        match &envelope.event {
            RunEvent::FilesDiscarded { paths } => {
                for path in paths {
                    println!("skipped   {} (unsupported extension)", path.display());
                }
            }
            RunEvent::UploadComplete(summary) => {
                println!(
                    "uploaded  {} file(s), {} bytes",
                    summary.count, summary.total_bytes
                );
                for failure in &summary.failures {
                    println!("  failed  {}: {}", failure.name, failure.error);
                }
            }
            RunEvent::StatusUpdate(StatusUpdate::Snapshot(snapshot)) => {
                let docs = &snapshot.documents;
                println!(
                    "status    {} ({} done, {} running, {} waiting, {} failed of {})",
                    snapshot.status,
                    docs.succeeded,
                    docs.in_progress,
                    docs.not_yet_started,
                    docs.failed,
                    docs.total
                );
            }
            RunEvent::StatusUpdate(StatusUpdate::Rejected(error)) => {
                println!("rejected  {}", error);
            }
            RunEvent::DownloadComplete(summary) => {
                println!(
                    "download  {} file(s), {} bytes",
                    summary.count, summary.total_bytes
                );
                for failure in &summary.failures {
                    println!("  failed  {}: {}", failure.name, failure.error);
                }
            }
        }
    }
}

fn print_outcome(outcome: &RunOutcome, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string(outcome).context("Failed to serialize outcome")?
        );
        return Ok(());
    }

    println!(
        "finished  run {} with status {} ({})",
        outcome.run_id, outcome.final_status, outcome.service_status
    );
    match &outcome.cleanup {
        Some(report) if !report.failed.is_empty() => {
            for (container, error) in &report.failed {
                println!("  cleanup failed for {}: {}", container, error);
            }
        }
        Some(_) => {}
        None => println!(
            "  kept containers {}, {}, {}",
            outcome.containers.source, outcome.containers.target, outcome.containers.glossary
        ),
    }
    if let Some(swept) = outcome.swept {
        println!("  swept {} abandoned container(s)", swept);
    }
    Ok(())
}
