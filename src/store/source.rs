//! RecordSource trait - read access to the order request snapshot for one report window.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::store::models::{ClinicLink, ClinicRow, FulfilledOrder, OrderRecord, PatchInfo};
use crate::util::time::ReportWindow;

/// Read-only view over order requests and the tables they are enriched from.
///
/// Every call is a bulk lookup; an empty key slice yields an empty result.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Order requests created inside the window, empty names included.
    async fn fetch_orders(&self, window: &ReportWindow) -> Result<Vec<OrderRecord>>;

    /// Every patch attached to the given order requests.
    async fn fetch_patches(&self, order_ids: &[i64]) -> Result<Vec<PatchInfo>>;

    async fn fetch_clinics(&self, clinic_ids: &[i64]) -> Result<Vec<ClinicRow>>;

    /// Salesforce identifiers associated with clinics through the clinic content type.
    async fn fetch_salesforce_ids(&self, clinic_ids: &[i64]) -> Result<Vec<ClinicLink>>;

    /// EMR vendor names configured for the clinics.
    async fn fetch_vendors(&self, clinic_ids: &[i64]) -> Result<Vec<ClinicLink>>;

    /// Fulfilled orders referencing the given order request uuids.
    async fn fetch_fulfilled_orders(&self, order_refs: &[Uuid]) -> Result<Vec<FulfilledOrder>>;
}
