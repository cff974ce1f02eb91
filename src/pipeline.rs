use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::RecordSource;
use crate::store::models::OrderRecord;
use crate::util::time::ReportWindow;

pub mod annotate;
pub mod cluster;
pub mod enrich;
pub mod error;
pub mod identity;
pub mod patch;
pub mod primary;
pub mod repartition;

pub use enrich::EnrichedRecord;
pub use error::PipelineError;

use annotate::annotate;
use enrich::{EnrichmentInputs, EnrichmentTables, enrich};
use patch::{PatchedCandidate, aggregate_patches};
use primary::primary_candidates;
use repartition::repartition;

/// Tunables shared by every report date of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Look-back window in days, also the maximum gap between related orders.
    pub window_days: u32,
    /// Slug of the product family whose members are told apart by sub-tests.
    pub family_slug: String,
    /// Patch endpoint counted into `patch_channel_count`.
    pub patch_channel: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            window_days: 30,
            family_slug: "genesight".to_string(),
            patch_channel: "/sales/transfer-kits/".to_string(),
        }
    }
}

/// Stage counters for one report date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub window_records: usize,
    pub candidates: usize,
    pub duplicates: usize,
    pub malformed_payloads: usize,
}

/// Confirmed duplicates for one report date, in report order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReport {
    pub report_date: NaiveDate,
    pub records: Vec<EnrichedRecord>,
    pub stats: RunStats,
}

impl DailyReport {
    fn empty(report_date: NaiveDate, stats: RunStats) -> Self {
        Self {
            report_date,
            records: Vec::new(),
            stats,
        }
    }
}

/// Runs the detection and enrichment stages for a report date against a
/// [`RecordSource`] snapshot.
#[derive(Clone)]
pub struct DuplicateReportPipeline {
    source: Arc<dyn RecordSource>,
    settings: PipelineSettings,
}

impl DuplicateReportPipeline {
    pub fn new(source: Arc<dyn RecordSource>, settings: PipelineSettings) -> Self {
        Self { source, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Builds the duplicate report for `report_date`.
    ///
    /// # Errors
    /// [`PipelineError::InputUnavailable`] when any fetch fails and
    /// [`PipelineError::AmbiguousAggregation`] when a lookup that must be
    /// one-to-one is not. No partial report is produced in either case.
    pub async fn run(&self, report_date: NaiveDate) -> Result<DailyReport, PipelineError> {
        let window = ReportWindow::new(report_date, self.settings.window_days);
        let orders = self
            .source
            .fetch_orders(&window)
            .await
            .map_err(PipelineError::input_unavailable(report_date, "order requests"))?;

        let mut stats = RunStats {
            window_records: orders.len(),
            ..RunStats::default()
        };

        let candidates = primary_candidates(annotate(&orders), self.settings.window_days, report_date);
        stats.candidates = candidates.len();
        debug!(
            %report_date,
            window_records = stats.window_records,
            candidates = stats.candidates,
            "primary duplicate pass finished"
        );
        if candidates.is_empty() {
            info!(%report_date, window_records = stats.window_records, "no duplicate candidates");
            return Ok(DailyReport::empty(report_date, stats));
        }

        let order_ids: Vec<i64> = candidates.iter().map(|c| c.order.id).collect();
        let patches = self
            .source
            .fetch_patches(&order_ids)
            .await
            .map_err(PipelineError::input_unavailable(report_date, "patches"))?;
        let aggregation = aggregate_patches(candidates, &patches, &self.settings.patch_channel);
        stats.malformed_payloads = aggregation.malformed_payloads;

        let duplicates = repartition(aggregation.records, &self.settings.family_slug, report_date);
        stats.duplicates = duplicates.len();
        if duplicates.is_empty() {
            info!(%report_date, candidates = stats.candidates, "no duplicates left after product repartition");
            return Ok(DailyReport::empty(report_date, stats));
        }

        let tables = self.lookup_tables(report_date, &orders, &duplicates).await?;
        let records = enrich(duplicates, &tables);

        info!(
            %report_date,
            window_records = stats.window_records,
            candidates = stats.candidates,
            duplicates = stats.duplicates,
            malformed_payloads = stats.malformed_payloads,
            "duplicate report built"
        );

        Ok(DailyReport {
            report_date,
            records,
            stats,
        })
    }

    async fn lookup_tables(
        &self,
        report_date: NaiveDate,
        window_records: &[OrderRecord],
        duplicates: &[PatchedCandidate],
    ) -> Result<EnrichmentTables, PipelineError> {
        let clinic_ids: Vec<i64> = duplicates
            .iter()
            .filter_map(|d| d.candidate.order.clinic_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let order_refs: Vec<Uuid> = duplicates.iter().map(|d| d.candidate.order.uuid).collect();

        let source = &self.source;
        let (clinics, salesforce_ids, vendors, fulfilled_orders) = futures::try_join!(
            async {
                source
                    .fetch_clinics(&clinic_ids)
                    .await
                    .map_err(PipelineError::input_unavailable(report_date, "clinics"))
            },
            async {
                source
                    .fetch_salesforce_ids(&clinic_ids)
                    .await
                    .map_err(PipelineError::input_unavailable(report_date, "salesforce ids"))
            },
            async {
                source
                    .fetch_vendors(&clinic_ids)
                    .await
                    .map_err(PipelineError::input_unavailable(report_date, "vendors"))
            },
            async {
                source
                    .fetch_fulfilled_orders(&order_refs)
                    .await
                    .map_err(PipelineError::input_unavailable(report_date, "fulfilled orders"))
            },
        )?;

        EnrichmentTables::build(EnrichmentInputs {
            window_records,
            clinics: &clinics,
            salesforce_ids: &salesforce_ids,
            vendors: &vendors,
            fulfilled_orders: &fulfilled_orders,
        })
    }
}
