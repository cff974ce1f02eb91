use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One submitted order request as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRecord {
    pub id: i64,
    /// External reference that fulfilled orders point back to.
    pub uuid: Uuid,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub patient_dob: Option<NaiveDate>,
    pub accession_id: Option<String>,
    pub requisition_number: Option<String>,
    pub barcode: Option<String>,
    pub created_at: DateTime<Utc>,
    pub clinic_id: Option<i64>,
    pub created_by_id: Option<i64>,
    pub product_id: i64,
    pub product_name: String,
    pub product_slug: Option<String>,
    pub order_flow: Option<String>,
}

impl OrderRecord {
    #[must_use]
    pub fn new(
        id: i64,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        product_id: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            patient_first_name: first_name.into(),
            patient_last_name: last_name.into(),
            patient_dob: None,
            accession_id: None,
            requisition_number: None,
            barcode: None,
            created_at,
            clinic_id: None,
            created_by_id: None,
            product_id,
            product_name: format!("product-{product_id}"),
            product_slug: None,
            order_flow: None,
        }
    }

    #[must_use]
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = uuid;
        self
    }

    #[must_use]
    pub fn with_product(mut self, name: impl Into<String>, slug: Option<&str>) -> Self {
        self.product_name = name.into();
        self.product_slug = slug.map(ToString::to_string);
        self
    }

    #[must_use]
    pub fn with_clinic(mut self, clinic_id: i64) -> Self {
        self.clinic_id = Some(clinic_id);
        self
    }

    #[must_use]
    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    #[must_use]
    pub fn with_order_flow(mut self, order_flow: impl Into<String>) -> Self {
        self.order_flow = Some(order_flow.into());
        self
    }

    /// Whether the order's product belongs to the family identified by `family_slug`.
    #[must_use]
    pub fn is_family_member(&self, family_slug: &str) -> bool {
        self.product_slug.as_deref() == Some(family_slug)
    }
}

/// A later amendment to an order request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchInfo {
    pub id: i64,
    pub order_request_id: i64,
    /// Endpoint the patch was submitted through.
    pub created_by_endpoint: Option<String>,
    pub submitter: Option<String>,
    /// Raw JSON document describing the amended order.
    pub payload: Option<String>,
}

impl PatchInfo {
    #[must_use]
    pub fn new(id: i64, order_request_id: i64) -> Self {
        Self {
            id,
            order_request_id,
            created_by_endpoint: None,
            submitter: None,
            payload: None,
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.created_by_endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn with_submitter(mut self, submitter: impl Into<String>) -> Self {
        self.submitter = Some(submitter.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClinicRow {
    pub id: i64,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub emr_enabled_on: Option<DateTime<Utc>>,
}

/// A (clinic, value) pair from a one-to-many clinic association such as
/// salesforce identifiers or EMR vendor names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicLink {
    pub clinic_id: i64,
    pub value: String,
}

impl ClinicLink {
    #[must_use]
    pub fn new(clinic_id: i64, value: impl Into<String>) -> Self {
        Self {
            clinic_id,
            value: value.into(),
        }
    }
}

/// A downstream order created from an order request, with its physical sample count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfilledOrder {
    pub id: i64,
    pub order_request_uuid: Uuid,
    pub sample_count: i64,
}
