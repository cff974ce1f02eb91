pub mod metrics;
pub(crate) mod tracing;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};

use self::metrics::Metrics;

/// Metrics registry plus the process-wide tracing subscriber.
#[derive(Debug, Clone)]
pub struct Telemetry {
    registry: Arc<Registry>,
    metrics: Arc<Metrics>,
}

impl Telemetry {
    /// Initializes tracing and registers every metric.
    ///
    /// # Errors
    /// Fails when the subscriber cannot be installed or a metric cannot be registered.
    pub fn new() -> Result<Self> {
        tracing::init()?;
        Self::without_tracing()
    }

    /// Metrics only, for callers that install their own subscriber.
    ///
    /// # Errors
    /// Fails when a metric cannot be registered.
    pub fn without_tracing() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(
            Metrics::new(Arc::clone(&registry)).context("failed to register metrics")?,
        );
        Ok(Self { registry, metrics })
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Renders the registry in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Writes the rendered metrics to `path` for a node-exporter textfile collector.
    ///
    /// # Errors
    /// Fails when the file cannot be written.
    pub async fn write_textfile(&self, path: &Path) -> Result<()> {
        let rendered = self.render_prometheus();
        let staging = path.with_extension("prom.tmp");
        tokio::fs::write(&staging, rendered)
            .await
            .with_context(|| format!("failed to write metrics to {}", staging.display()))?;
        tokio::fs::rename(&staging, path)
            .await
            .with_context(|| format!("failed to move metrics into {}", path.display()))?;
        Ok(())
    }
}
