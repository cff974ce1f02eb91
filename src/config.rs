use std::{env, num::NonZeroUsize, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::pipeline::PipelineSettings;
use crate::report::ReportLayout;
use crate::util::retry::RetryConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    db_dsn: String,
    db_max_connections: u32,
    db_acquire_timeout: Duration,
    window_days: u32,
    family_slug: String,
    patch_channel: String,
    output_dir: PathBuf,
    show_names: bool,
    max_concurrency: NonZeroUsize,
    max_attempts: NonZeroUsize,
    backoff_base_ms: u64,
    backoff_cap_ms: u64,
    metrics_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// Reads and validates the worker settings from the environment.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when `DUP_REPORT_DB_DSN` is unset or any value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_dsn = env_var("DUP_REPORT_DB_DSN")?;
        let db_max_connections = parse_u32("DUP_REPORT_DB_MAX_CONNECTIONS", 5)?;
        let db_acquire_timeout = parse_duration_secs("DUP_REPORT_DB_ACQUIRE_TIMEOUT_SECS", 30)?;

        // Detection settings
        let window_days = parse_non_zero_u32("DUP_REPORT_WINDOW_DAYS", 30)?;
        let family_slug = non_empty_var("DUP_REPORT_FAMILY_SLUG", "genesight")?;
        let patch_channel = non_empty_var("DUP_REPORT_PATCH_CHANNEL", "/sales/transfer-kits/")?;

        // Output
        let output_dir = PathBuf::from(env::var("DUP_REPORT_OUTPUT_DIR").unwrap_or_else(|_| ".".to_string()));
        let show_names = parse_bool("DUP_REPORT_SHOW_NAMES", false)?;
        let metrics_path = env::var("DUP_REPORT_METRICS_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        // Batch execution
        let max_concurrency = parse_non_zero_usize("DUP_REPORT_MAX_CONCURRENCY", 1)?;
        let max_attempts = parse_non_zero_usize("DUP_REPORT_MAX_ATTEMPTS", 1)?;
        let backoff_base_ms = parse_u64("DUP_REPORT_BACKOFF_BASE_MS", 500)?;
        let backoff_cap_ms = parse_u64("DUP_REPORT_BACKOFF_CAP_MS", 10_000)?;

        Ok(Self {
            db_dsn,
            db_max_connections,
            db_acquire_timeout,
            window_days,
            family_slug,
            patch_channel,
            output_dir,
            show_names,
            max_concurrency,
            max_attempts,
            backoff_base_ms,
            backoff_cap_ms,
            metrics_path,
        })
    }

    #[must_use]
    pub fn db_dsn(&self) -> &str {
        &self.db_dsn
    }

    #[must_use]
    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
    }

    #[must_use]
    pub fn db_acquire_timeout(&self) -> Duration {
        self.db_acquire_timeout
    }

    #[must_use]
    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    #[must_use]
    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    #[must_use]
    pub fn show_names(&self) -> bool {
        self.show_names
    }

    #[must_use]
    pub fn max_concurrency(&self) -> NonZeroUsize {
        self.max_concurrency
    }

    #[must_use]
    pub fn metrics_path(&self) -> Option<&PathBuf> {
        self.metrics_path.as_ref()
    }

    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            window_days: self.window_days,
            family_slug: self.family_slug.clone(),
            patch_channel: self.patch_channel.clone(),
        }
    }

    #[must_use]
    pub fn report_layout(&self) -> ReportLayout {
        ReportLayout::default().with_show_names(self.show_names)
    }

    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_attempts.get(), self.backoff_base_ms, self.backoff_cap_ms)
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn non_empty_var(name: &'static str, default: &str) -> Result<String, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    if raw.trim().is_empty() {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("must not be empty"),
        });
    }
    Ok(raw)
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_non_zero_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let value = parse_u32(name, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("must be greater than zero"),
        });
    }
    Ok(value)
}

fn parse_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_secs)?;
    Ok(Duration::from_secs(value))
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}
