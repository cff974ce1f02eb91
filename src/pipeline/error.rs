use chrono::NaiveDate;
use thiserror::Error;

/// Failures raised while building a daily duplicate report.
///
/// `InputUnavailable` and `AmbiguousAggregation` abort the run for the report
/// date. `MalformedPatchPayload` never leaves the patch stage: the affected
/// candidate keeps its duplicate flag with an empty test list.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("record source could not supply {what} for report date {report_date}")]
    InputUnavailable {
        report_date: NaiveDate,
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("patch {patch_id} carries a malformed payload")]
    MalformedPatchPayload {
        patch_id: i64,
        #[source]
        source: serde_json::Error,
    },
    #[error("{relation} lookup for key {key} returned {rows} rows, expected at most one")]
    AmbiguousAggregation {
        relation: &'static str,
        key: String,
        rows: usize,
    },
}

impl PipelineError {
    pub(crate) fn input_unavailable(
        report_date: NaiveDate,
        what: &'static str,
    ) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::InputUnavailable {
            report_date,
            what,
            source,
        }
    }
}
