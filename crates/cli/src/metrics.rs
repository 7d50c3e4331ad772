//! Prometheus export of the core run metrics.

use std::path::Path;

use anyhow::{Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};

/// Registry holding every core collector.
pub fn registry() -> Result<Registry> {
    let registry = Registry::new();
    for metric in doctrans_core::metrics::all_metrics() {
        registry
            .register(metric)
            .context("Failed to register metric")?;
    }
    Ok(registry)
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics(registry: &Registry) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}

/// Write the current metric values to `path`.
pub fn write_metrics(registry: &Registry, path: &Path) -> Result<()> {
    let output = encode_metrics(registry)?;
    std::fs::write(path, output)
        .with_context(|| format!("Failed to write metrics to {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctrans_core::metrics::{CONTAINERS_SWEPT, RUNS_TOTAL};
    use tempfile::TempDir;

    #[test]
    fn test_registry_contains_core_metrics() {
        let registry = registry().unwrap();
        RUNS_TOTAL.with_label_values(&["succeeded"]).inc();
        CONTAINERS_SWEPT.inc();

        let output = encode_metrics(&registry).unwrap();
        assert!(output.contains("doctrans_runs_total"));
        assert!(output.contains("doctrans_containers_swept_total"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_write_metrics_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.prom");
        let registry = registry().unwrap();
        RUNS_TOTAL.with_label_values(&["failed"]).inc();

        write_metrics(&registry, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("doctrans_runs_total{outcome=\"failed\"}"));
    }
}
