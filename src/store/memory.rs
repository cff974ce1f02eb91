// In-memory RecordSource used by fixtures, integration tests and benchmarks.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::models::{ClinicLink, ClinicRow, FulfilledOrder, OrderRecord, PatchInfo};
use super::source::RecordSource;
use crate::util::time::ReportWindow;

#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordSource {
    orders: Vec<OrderRecord>,
    patches: Vec<PatchInfo>,
    clinics: Vec<ClinicRow>,
    salesforce_ids: Vec<ClinicLink>,
    vendors: Vec<ClinicLink>,
    fulfilled_orders: Vec<FulfilledOrder>,
}

impl InMemoryRecordSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_orders(mut self, orders: impl IntoIterator<Item = OrderRecord>) -> Self {
        self.orders.extend(orders);
        self
    }

    #[must_use]
    pub fn with_patches(mut self, patches: impl IntoIterator<Item = PatchInfo>) -> Self {
        self.patches.extend(patches);
        self
    }

    #[must_use]
    pub fn with_clinics(mut self, clinics: impl IntoIterator<Item = ClinicRow>) -> Self {
        self.clinics.extend(clinics);
        self
    }

    #[must_use]
    pub fn with_salesforce_ids(mut self, links: impl IntoIterator<Item = ClinicLink>) -> Self {
        self.salesforce_ids.extend(links);
        self
    }

    #[must_use]
    pub fn with_vendors(mut self, links: impl IntoIterator<Item = ClinicLink>) -> Self {
        self.vendors.extend(links);
        self
    }

    #[must_use]
    pub fn with_fulfilled_orders(mut self, orders: impl IntoIterator<Item = FulfilledOrder>) -> Self {
        self.fulfilled_orders.extend(orders);
        self
    }
}

fn links_for(links: &[ClinicLink], clinic_ids: &[i64]) -> Vec<ClinicLink> {
    links
        .iter()
        .filter(|link| clinic_ids.contains(&link.clinic_id))
        .cloned()
        .collect()
}

#[async_trait]
impl RecordSource for InMemoryRecordSource {
    async fn fetch_orders(&self, window: &ReportWindow) -> Result<Vec<OrderRecord>> {
        Ok(self
            .orders
            .iter()
            .filter(|order| window.contains(order.created_at))
            .cloned()
            .collect())
    }

    async fn fetch_patches(&self, order_ids: &[i64]) -> Result<Vec<PatchInfo>> {
        Ok(self
            .patches
            .iter()
            .filter(|patch| order_ids.contains(&patch.order_request_id))
            .cloned()
            .collect())
    }

    async fn fetch_clinics(&self, clinic_ids: &[i64]) -> Result<Vec<ClinicRow>> {
        Ok(self
            .clinics
            .iter()
            .filter(|clinic| clinic_ids.contains(&clinic.id))
            .cloned()
            .collect())
    }

    async fn fetch_salesforce_ids(&self, clinic_ids: &[i64]) -> Result<Vec<ClinicLink>> {
        Ok(links_for(&self.salesforce_ids, clinic_ids))
    }

    async fn fetch_vendors(&self, clinic_ids: &[i64]) -> Result<Vec<ClinicLink>> {
        Ok(links_for(&self.vendors, clinic_ids))
    }

    async fn fetch_fulfilled_orders(&self, order_refs: &[Uuid]) -> Result<Vec<FulfilledOrder>> {
        Ok(self
            .fulfilled_orders
            .iter()
            .filter(|order| order_refs.contains(&order.order_request_uuid))
            .cloned()
            .collect())
    }
}
