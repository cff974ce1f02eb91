use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    config::Config,
    observability::Telemetry,
    pipeline::DuplicateReportPipeline,
    report::ReportWriter,
    scheduler::Scheduler,
    store::PgRecordSource,
};

/// Long-lived components of a worker run, wired from [`Config`].
pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    scheduler: Scheduler,
}

impl ComponentRegistry {
    /// Initializes telemetry, the database-backed record source, the pipeline
    /// and the scheduler.
    ///
    /// # Errors
    /// Fails when telemetry cannot be initialized or the database pool cannot be configured.
    pub fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let telemetry = Telemetry::new()?;
        let source = PgRecordSource::connect_lazy(
            config.db_dsn(),
            config.db_max_connections(),
            config.db_acquire_timeout(),
        )
        .context("failed to configure record source")?;
        let pipeline = Arc::new(DuplicateReportPipeline::new(
            Arc::new(source),
            config.pipeline_settings(),
        ));
        let writer = Arc::new(ReportWriter::new(
            config.output_dir().clone(),
            config.report_layout(),
        ));
        let scheduler = Scheduler::new(
            pipeline,
            writer,
            config.retry_config(),
            config.max_concurrency(),
            telemetry.metrics(),
        );

        Ok(Self {
            config,
            telemetry,
            scheduler,
        })
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }
}
