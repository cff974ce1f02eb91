use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};

use order_dup_worker::{app::ComponentRegistry, cli::Cli, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                column = location.column(),
                message,
                "panic occurred"
            );
        } else {
            error!(
                thread = thread_name,
                message, "panic occurred without location information"
            );
        }
    }));

    let cli = Cli::parse();
    // Tracing initialization is handled by Telemetry::new()
    let config = Config::from_env().context("failed to load configuration")?;
    let registry = ComponentRegistry::build(config).context("failed to build component registry")?;

    let today = Utc::now().date_naive();
    let target = cli.target(today);
    let dates = target.report_dates(today);
    if dates.is_empty() {
        warn!(?target, "no elapsed report dates for target");
    }
    info!(?target, dates = dates.len(), "running duplicate report");

    let outcome = registry.scheduler().run_batch(dates).await;

    let config = registry.config();
    if let Some(path) = config.metrics_path() {
        if let Err(e) = registry.telemetry().write_textfile(path).await {
            warn!(error = ?e, path = %path.display(), "failed to write metrics textfile");
        }
    }

    for (date, e) in &outcome.failed {
        error!(%date, error = ?e, "report date failed");
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
