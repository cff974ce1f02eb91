//! Failure classification used by the batch driver to decide whether a
//! report date is worth running again.
use sqlx::Error as SqlxError;

use crate::pipeline::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient source trouble (pool exhaustion, dropped connections).
    Retryable,
    /// Re-running the same date would fail the same way.
    NonRetryable,
    /// Configuration or data-integrity defect; needs a human.
    Fatal,
}

#[must_use]
pub fn classify_error(error: &PipelineError) -> ErrorKind {
    match error {
        PipelineError::InputUnavailable { source, .. } => source
            .chain()
            .find_map(|cause| cause.downcast_ref::<SqlxError>())
            .map_or(ErrorKind::NonRetryable, classify_sqlx),
        PipelineError::MalformedPatchPayload { .. } => ErrorKind::NonRetryable,
        PipelineError::AmbiguousAggregation { .. } => ErrorKind::Fatal,
    }
}

fn classify_sqlx(error: &SqlxError) -> ErrorKind {
    match error {
        SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) | SqlxError::Database(_) => {
            ErrorKind::Retryable
        }
        SqlxError::Configuration(_) | SqlxError::Tls(_) => ErrorKind::Fatal,
        _ => ErrorKind::NonRetryable,
    }
}

#[must_use]
pub fn is_retryable(error: &PipelineError) -> bool {
    matches!(classify_error(error), ErrorKind::Retryable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};
    use chrono::NaiveDate;

    fn report_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    #[test]
    fn pool_timeout_behind_context_is_retryable() {
        let source = Err::<(), _>(SqlxError::PoolTimedOut)
            .context("failed to fetch order requests")
            .unwrap_err();
        let error = PipelineError::InputUnavailable {
            report_date: report_date(),
            what: "order requests",
            source,
        };

        assert_eq!(classify_error(&error), ErrorKind::Retryable);
        assert!(is_retryable(&error));
    }

    #[test]
    fn opaque_source_failure_is_not_retryable() {
        let error = PipelineError::InputUnavailable {
            report_date: report_date(),
            what: "patches",
            source: anyhow!("snapshot missing"),
        };

        assert_eq!(classify_error(&error), ErrorKind::NonRetryable);
    }

    #[test]
    fn ambiguous_aggregation_is_fatal() {
        let error = PipelineError::AmbiguousAggregation {
            relation: "clinic",
            key: "7".into(),
            rows: 2,
        };

        assert_eq!(classify_error(&error), ErrorKind::Fatal);
        assert!(!is_retryable(&error));
    }
}
