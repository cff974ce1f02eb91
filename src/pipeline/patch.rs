use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use super::annotate::AnnotatedRecord;
use super::cluster::ClusterMember;
use super::error::PipelineError;
use crate::store::models::PatchInfo;

/// What the patches of one order request contribute to the report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSummary {
    /// Patches submitted through the tracked channel.
    pub channel_count: i64,
    pub first_patch_id: Option<i64>,
    /// Submitter of the first patch.
    pub submitter: Option<String>,
    /// Sub-test names reported by the first patch, sorted.
    pub sub_tests: Vec<String>,
}

impl PatchSummary {
    /// `;`-joined sub-test names, `None` when the first patch reported none.
    #[must_use]
    pub fn test_names(&self) -> Option<String> {
        if self.sub_tests.is_empty() {
            None
        } else {
            Some(self.sub_tests.join(";"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedCandidate {
    pub candidate: AnnotatedRecord,
    pub patch: PatchSummary,
}

impl ClusterMember for PatchedCandidate {
    fn latest_seen(&self) -> DateTime<Utc> {
        self.candidate.order.created_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchAggregation {
    pub records: Vec<PatchedCandidate>,
    /// First patches whose payload could not be read; their test lists are empty.
    pub malformed_payloads: usize,
}

#[derive(Debug, Deserialize)]
struct PatchPayload {
    order_product: Option<OrderProductPayload>,
}

#[derive(Debug, Deserialize)]
struct OrderProductPayload {
    sub_products: Option<Vec<SubProductPayload>>,
}

#[derive(Debug, Deserialize)]
struct SubProductPayload {
    test_offering_name: Option<String>,
}

/// Extracts the sub-test names carried by a patch payload, sorted.
///
/// # Errors
/// Returns [`PipelineError::MalformedPatchPayload`] when the payload is not the
/// expected JSON document.
pub fn parse_sub_tests(patch: &PatchInfo) -> Result<Vec<String>, PipelineError> {
    let Some(raw) = patch.payload.as_deref() else {
        return Ok(Vec::new());
    };

    let payload: PatchPayload =
        serde_json::from_str(raw).map_err(|source| PipelineError::MalformedPatchPayload {
            patch_id: patch.id,
            source,
        })?;

    let mut names: Vec<String> = payload
        .order_product
        .and_then(|product| product.sub_products)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|sub_product| sub_product.test_offering_name)
        .collect();
    names.sort();
    Ok(names)
}

/// Attaches patch statistics to each candidate.
///
/// `channel` is the endpoint whose patches are counted. The submitter and the
/// sub-test list come from the candidate's lowest-id patch only.
#[must_use]
pub fn aggregate_patches(
    candidates: Vec<AnnotatedRecord>,
    patches: &[PatchInfo],
    channel: &str,
) -> PatchAggregation {
    let mut by_order: HashMap<i64, Vec<&PatchInfo>> = HashMap::new();
    for patch in patches {
        by_order.entry(patch.order_request_id).or_default().push(patch);
    }

    let mut malformed_payloads = 0;
    let records = candidates
        .into_iter()
        .map(|candidate| {
            let order_patches = by_order
                .get(&candidate.order.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let patch = summarize(order_patches, channel, &mut malformed_payloads);
            PatchedCandidate { candidate, patch }
        })
        .collect();

    PatchAggregation {
        records,
        malformed_payloads,
    }
}

fn summarize(patches: &[&PatchInfo], channel: &str, malformed: &mut usize) -> PatchSummary {
    let channel_count = patches
        .iter()
        .filter(|patch| patch.created_by_endpoint.as_deref() == Some(channel))
        .count();
    let channel_count = i64::try_from(channel_count).unwrap_or(i64::MAX);

    let Some(first) = patches.iter().min_by_key(|patch| patch.id) else {
        return PatchSummary {
            channel_count,
            ..PatchSummary::default()
        };
    };

    let sub_tests = parse_sub_tests(first).unwrap_or_else(|error| {
        *malformed += 1;
        warn!(
            patch_id = first.id,
            order_request_id = first.order_request_id,
            error = %error,
            "dropping sub-tests of malformed patch payload"
        );
        Vec::new()
    });

    PatchSummary {
        channel_count,
        first_patch_id: Some(first.id),
        submitter: first.submitter.clone(),
        sub_tests,
    }
}
