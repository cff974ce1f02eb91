/// Prometheus metric definitions.
use prometheus::{
    Counter, Gauge, Histogram, Registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};
use std::sync::Arc;

use crate::pipeline::RunStats;

#[derive(Debug, Clone)]
pub struct Metrics {
    // counters
    pub jobs_completed: Counter,
    pub jobs_failed: Counter,
    pub retries_total: Counter,
    pub window_records: Counter,
    pub candidates_found: Counter,
    pub duplicates_found: Counter,
    pub malformed_payloads: Counter,

    // histograms
    pub job_duration: Histogram,

    // gauges
    pub active_jobs: Gauge,
}

impl Metrics {
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            jobs_completed: register_counter_with_registry!(
                "order_dup_jobs_completed_total",
                "Total number of report dates processed successfully",
                registry
            )?,
            jobs_failed: register_counter_with_registry!(
                "order_dup_jobs_failed_total",
                "Total number of report dates that failed after all attempts",
                registry
            )?,
            retries_total: register_counter_with_registry!(
                "order_dup_retries_total",
                "Total number of report date retries",
                registry
            )?,
            window_records: register_counter_with_registry!(
                "order_dup_window_records_total",
                "Total number of order requests read across report windows",
                registry
            )?,
            candidates_found: register_counter_with_registry!(
                "order_dup_candidates_total",
                "Total number of candidates surviving the primary duplicate pass",
                registry
            )?,
            duplicates_found: register_counter_with_registry!(
                "order_dup_duplicates_total",
                "Total number of confirmed duplicate order requests reported",
                registry
            )?,
            malformed_payloads: register_counter_with_registry!(
                "order_dup_malformed_patch_payloads_total",
                "Total number of first patches whose payload could not be parsed",
                registry
            )?,
            job_duration: register_histogram_with_registry!(
                "order_dup_job_duration_seconds",
                "Duration of one report date including retries",
                registry
            )?,
            active_jobs: register_gauge_with_registry!(
                "order_dup_active_jobs",
                "Number of report dates currently being built",
                registry
            )?,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn record_run(&self, stats: &RunStats) {
        self.jobs_completed.inc();
        self.window_records.inc_by(stats.window_records as f64);
        self.candidates_found.inc_by(stats.candidates as f64);
        self.duplicates_found.inc_by(stats.duplicates as f64);
        self.malformed_payloads.inc_by(stats.malformed_payloads as f64);
    }
}
