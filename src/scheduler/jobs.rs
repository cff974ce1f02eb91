use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures::{StreamExt, stream};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::observability::metrics::Metrics;
use crate::pipeline::{DailyReport, DuplicateReportPipeline, PipelineError};
use crate::report::ReportWriter;
use crate::util::error::{ErrorKind, classify_error, is_retryable};
use crate::util::retry::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobContext {
    pub job_id: Uuid,
    pub report_date: NaiveDate,
}

impl JobContext {
    #[must_use]
    pub fn new(report_date: NaiveDate) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            report_date,
        }
    }
}

/// Result of a batch over several report dates.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Report files written, in the order the dates were requested.
    pub written: Vec<(NaiveDate, PathBuf)>,
    pub failed: Vec<(NaiveDate, anyhow::Error)>,
    /// Dates never started because a date failed fatally.
    pub skipped: Vec<NaiveDate>,
}

impl BatchOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Runs report dates through the pipeline and writes one file per date.
#[derive(Clone)]
pub struct Scheduler {
    pipeline: Arc<DuplicateReportPipeline>,
    writer: Arc<ReportWriter>,
    retry: RetryConfig,
    max_concurrency: NonZeroUsize,
    metrics: Arc<Metrics>,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<DuplicateReportPipeline>,
        writer: Arc<ReportWriter>,
        retry: RetryConfig,
        max_concurrency: NonZeroUsize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            pipeline,
            writer,
            retry,
            max_concurrency,
            metrics,
        }
    }

    /// Builds and writes the report for one date, retrying transient source failures.
    ///
    /// # Errors
    /// Returns the last pipeline error once attempts are exhausted or the
    /// failure is not retryable, or the writer error.
    pub async fn run_job(&self, context: JobContext) -> Result<PathBuf> {
        let span = info_span!(
            "report_job",
            job_id = %context.job_id,
            report_date = %context.report_date
        );
        async {
            let started = Instant::now();
            self.metrics.active_jobs.inc();
            let result = self.build_and_write(context.report_date).await;
            self.metrics.active_jobs.dec();
            self.metrics
                .job_duration
                .observe(started.elapsed().as_secs_f64());

            match &result {
                Ok(path) => info!(path = %path.display(), "report job finished"),
                Err(e) => {
                    self.metrics.jobs_failed.inc();
                    error!(error = ?e, "report job failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn build_and_write(&self, report_date: NaiveDate) -> Result<PathBuf> {
        let report = self.run_with_retry(report_date).await?;
        self.metrics.record_run(&report.stats);
        self.writer
            .write(&report)
            .await
            .with_context(|| format!("failed to write report for {report_date}"))
    }

    async fn run_with_retry(&self, report_date: NaiveDate) -> Result<DailyReport, PipelineError> {
        let mut attempt = 0;
        loop {
            let delay = self.retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.pipeline.run(report_date).await {
                Ok(report) => return Ok(report),
                Err(error) => {
                    attempt += 1;
                    if !is_retryable(&error) || !self.retry.can_retry(attempt) {
                        return Err(error);
                    }
                    self.metrics.retries_total.inc();
                    warn!(attempt, error = %error, "report date failed, retrying");
                }
            }
        }
    }

    /// Runs `dates` with at most `max_concurrency` in flight, reporting
    /// results in request order. After a fatal failure no further date is
    /// started; dates already in flight run to completion and are reported
    /// as written or failed, the rest as skipped.
    pub async fn run_batch(&self, dates: Vec<NaiveDate>) -> BatchOutcome {
        info!(
            dates = dates.len(),
            max_concurrency = self.max_concurrency.get(),
            "starting report batch"
        );

        let stopped = AtomicBool::new(false);
        let stopped = &stopped;
        let mut results = stream::iter(dates)
            .map(|date| async move {
                if stopped.load(Ordering::Acquire) {
                    return (date, None);
                }
                let result = self.run_job(JobContext::new(date)).await;
                if result.as_ref().is_err_and(is_fatal) {
                    stopped.store(true, Ordering::Release);
                }
                (date, Some(result))
            })
            .buffered(self.max_concurrency.get());

        let mut outcome = BatchOutcome::default();
        while let Some((date, result)) = results.next().await {
            match result {
                None => outcome.skipped.push(date),
                Some(Ok(path)) => outcome.written.push((date, path)),
                Some(Err(e)) => {
                    if is_fatal(&e) {
                        error!(%date, "fatal failure, no further report dates will start");
                    }
                    outcome.failed.push((date, e));
                }
            }
        }

        info!(
            written = outcome.written.len(),
            failed = outcome.failed.len(),
            skipped = outcome.skipped.len(),
            "report batch finished"
        );
        outcome
    }
}

fn is_fatal(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<PipelineError>()
        .is_some_and(|error| classify_error(error) == ErrorKind::Fatal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineSettings;
    use crate::report::ReportLayout;
    use crate::store::InMemoryRecordSource;
    use crate::store::models::OrderRecord;
    use chrono::{TimeZone, Utc};
    use prometheus::Registry;
    use tempfile::TempDir;

    fn scheduler(source: InMemoryRecordSource, dir: &TempDir, concurrency: usize) -> Scheduler {
        let pipeline = DuplicateReportPipeline::new(Arc::new(source), PipelineSettings::default());
        Scheduler::new(
            Arc::new(pipeline),
            Arc::new(ReportWriter::new(dir.path(), ReportLayout::default())),
            RetryConfig::default(),
            NonZeroUsize::new(concurrency).unwrap(),
            Arc::new(Metrics::new(Arc::new(Registry::new())).unwrap()),
        )
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[tokio::test]
    async fn run_job_writes_report_and_counts_run() {
        let dir = TempDir::new().unwrap();
        let orders = vec![
            OrderRecord::new(1, "Ivy", "Chen", 4, Utc.with_ymd_and_hms(2024, 6, 8, 9, 0, 0).unwrap()),
            OrderRecord::new(2, "Ivy", "Chen", 4, Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()),
        ];
        let scheduler = scheduler(InMemoryRecordSource::new().with_orders(orders), &dir, 1);

        let path = scheduler.run_job(JobContext::new(date(10))).await.unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 2);
        assert!((scheduler.metrics.duplicates_found.get() - 2.0).abs() < f64::EPSILON);
        assert!((scheduler.metrics.active_jobs.get()).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn run_batch_keeps_request_order() {
        let dir = TempDir::new().unwrap();
        let scheduler = scheduler(InMemoryRecordSource::new(), &dir, 3);

        let outcome = scheduler.run_batch(vec![date(3), date(2), date(1)]).await;

        assert!(outcome.is_success());
        let dates: Vec<NaiveDate> = outcome.written.iter().map(|(d, _)| *d).collect();
        assert_eq!(dates, vec![date(3), date(2), date(1)]);
    }
}
