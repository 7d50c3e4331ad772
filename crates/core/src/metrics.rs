//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Runs (outcomes, duration)
//! - Transfers (files and bytes per direction)
//! - Job polling and container cleanup

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Runs
// =============================================================================

/// Runs finished, by outcome.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("doctrans_runs_total", "Total translation runs"),
        &["outcome"], // "succeeded", "failed", "rejected", "cancelled", "invalid"
    )
    .unwrap()
});

/// End-to-end run duration in seconds.
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("doctrans_run_duration_seconds", "Duration of translation runs")
            .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Transfers
// =============================================================================

/// Files transferred by direction and result.
pub static FILES_TRANSFERRED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("doctrans_files_transferred_total", "Files uploaded or downloaded"),
        &["direction", "result"], // direction: "upload", "download"; result: "ok", "error"
    )
    .unwrap()
});

/// Bytes transferred by direction.
pub static BYTES_TRANSFERRED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("doctrans_bytes_transferred_total", "Bytes uploaded or downloaded"),
        &["direction"],
    )
    .unwrap()
});

// =============================================================================
// Jobs and containers
// =============================================================================

/// Status checks issued against the translation service.
pub static STATUS_POLLS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("doctrans_status_polls_total", "Job status checks").unwrap()
});

/// Container deletions by result.
pub static CONTAINER_DELETIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("doctrans_container_deletions_total", "Container deletion attempts"),
        &["result"],
    )
    .unwrap()
});

/// Abandoned containers removed by the sweep.
pub static CONTAINERS_SWEPT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "doctrans_containers_swept_total",
        "Containers removed by the abandoned-container sweep",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RUNS_TOTAL.clone()),
        Box::new(RUN_DURATION.clone()),
        Box::new(FILES_TRANSFERRED.clone()),
        Box::new(BYTES_TRANSFERRED.clone()),
        Box::new(STATUS_POLLS.clone()),
        Box::new(CONTAINER_DELETIONS.clone()),
        Box::new(CONTAINERS_SWEPT.clone()),
    ]
}
