use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};
use uuid::Uuid;

use super::models::{ClinicLink, ClinicRow, FulfilledOrder, OrderRecord, PatchInfo};
use super::source::RecordSource;
use crate::util::time::ReportWindow;

/// Content type that scopes salesforce identifiers to clinics.
const CLINIC_APP_LABEL: &str = "healthcare";
const CLINIC_MODEL: &str = "clinic";

/// RecordSource backed by the ordering database.
#[derive(Debug, Clone)]
pub struct PgRecordSource {
    pool: PgPool,
}

impl PgRecordSource {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Configures a lazily connecting pool against `dsn`; connections are
    /// opened on first use.
    ///
    /// # Errors
    /// Returns an error when `dsn` cannot be parsed.
    pub fn connect_lazy(dsn: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .test_before_acquire(true)
            .connect_lazy(dsn)
            .context("failed to configure ordering database pool")?;
        Ok(Self::new(pool))
    }
}

fn collect_links(rows: Vec<PgRow>) -> Result<Vec<ClinicLink>> {
    let mut links = Vec::with_capacity(rows.len());
    for row in rows {
        let clinic_id: i64 = row.try_get("clinic_id")?;
        let value: String = row.try_get("value")?;
        links.push(ClinicLink { clinic_id, value });
    }
    Ok(links)
}

#[async_trait]
impl RecordSource for PgRecordSource {
    async fn fetch_orders(&self, window: &ReportWindow) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(
            r"
            SELECT
                oreq.id::bigint AS id,
                oreq.uuid AS uuid,
                coalesce(oreq.patient_first_name, '')::text AS patient_first_name,
                coalesce(oreq.patient_last_name, '')::text AS patient_last_name,
                oreq.patient_dob AS patient_dob,
                oreq.accession_id::text AS accession_id,
                oreq.requisition_number::text AS requisition_number,
                oreq.barcode::text AS barcode,
                oreq.created_at AS created_at,
                oreq.clinic_id::bigint AS clinic_id,
                oreq.created_by_id::bigint AS created_by_id,
                oreq.product_id::bigint AS product_id,
                op.name::text AS product_name,
                op.slug::text AS product_slug,
                oreq.order_flow::text AS order_flow
            FROM ordering_orderrequest oreq
            JOIN order_product op ON op.id = oreq.product_id
            WHERE oreq.created_at > $1 AND oreq.created_at < $2
            ORDER BY oreq.created_at, oreq.id
            ",
        )
        .bind(window.start())
        .bind(window.end())
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch order requests for window")?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let patient_dob: Option<NaiveDate> = row.try_get("patient_dob")?;
            let created_at: DateTime<Utc> = row.try_get("created_at")?;
            orders.push(OrderRecord {
                id: row.try_get("id")?,
                uuid: row.try_get("uuid")?,
                patient_first_name: row.try_get("patient_first_name")?,
                patient_last_name: row.try_get("patient_last_name")?,
                patient_dob,
                accession_id: row.try_get("accession_id")?,
                requisition_number: row.try_get("requisition_number")?,
                barcode: row.try_get("barcode")?,
                created_at,
                clinic_id: row.try_get("clinic_id")?,
                created_by_id: row.try_get("created_by_id")?,
                product_id: row.try_get("product_id")?,
                product_name: row.try_get("product_name")?,
                product_slug: row.try_get("product_slug")?,
                order_flow: row.try_get("order_flow")?,
            });
        }

        Ok(orders)
    }

    async fn fetch_patches(&self, order_ids: &[i64]) -> Result<Vec<PatchInfo>> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r"
            SELECT
                orp.id::bigint AS id,
                orp.order_request_id::bigint AS order_request_id,
                orp.created_by_endpoint::text AS created_by_endpoint,
                au.email::text AS submitter,
                orp.data::text AS payload
            FROM ordering_orderrequestpatch orp
            LEFT JOIN auth_user au ON au.id = orp.created_by_id
            WHERE orp.order_request_id = ANY($1)
            ORDER BY orp.id
            ",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch order request patches")?;

        let mut patches = Vec::with_capacity(rows.len());
        for row in rows {
            patches.push(PatchInfo {
                id: row.try_get("id")?,
                order_request_id: row.try_get("order_request_id")?,
                created_by_endpoint: row.try_get("created_by_endpoint")?,
                submitter: row.try_get("submitter")?,
                payload: row.try_get("payload")?,
            });
        }

        Ok(patches)
    }

    async fn fetch_clinics(&self, clinic_ids: &[i64]) -> Result<Vec<ClinicRow>> {
        if clinic_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r"
            SELECT
                hc.id::bigint AS id,
                hc.external_id::text AS external_id,
                hc.name::text AS name,
                hc.emr_enabled_on AS emr_enabled_on
            FROM healthcare_clinic hc
            WHERE hc.id = ANY($1)
            ",
        )
        .bind(clinic_ids)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch clinics")?;

        let mut clinics = Vec::with_capacity(rows.len());
        for row in rows {
            clinics.push(ClinicRow {
                id: row.try_get("id")?,
                external_id: row.try_get("external_id")?,
                name: row.try_get("name")?,
                emr_enabled_on: row.try_get("emr_enabled_on")?,
            });
        }

        Ok(clinics)
    }

    async fn fetch_salesforce_ids(&self, clinic_ids: &[i64]) -> Result<Vec<ClinicLink>> {
        if clinic_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r"
            SELECT DISTINCT
                csf.object_id::bigint AS clinic_id,
                csf.salesforce_id::text AS value
            FROM common_salesforceid csf
            JOIN django_content_type dct ON dct.id = csf.content_type_id
            WHERE csf.object_id::bigint = ANY($1)
              AND dct.app_label = $2
              AND dct.model = $3
            ",
        )
        .bind(clinic_ids)
        .bind(CLINIC_APP_LABEL)
        .bind(CLINIC_MODEL)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch clinic salesforce ids")?;

        collect_links(rows)
    }

    async fn fetch_vendors(&self, clinic_ids: &[i64]) -> Result<Vec<ClinicLink>> {
        if clinic_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r"
            SELECT DISTINCT
                emr_c.clinic_id::bigint AS clinic_id,
                emr_v.name::text AS value
            FROM emr_clinicemrsettings emr_c
            JOIN emr_emrvendor emr_v ON emr_v.id = emr_c.emr_vendor_id
            WHERE emr_c.clinic_id = ANY($1)
            ",
        )
        .bind(clinic_ids)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch clinic vendors")?;

        collect_links(rows)
    }

    async fn fetch_fulfilled_orders(&self, order_refs: &[Uuid]) -> Result<Vec<FulfilledOrder>> {
        if order_refs.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r"
            SELECT
                ord.id::bigint AS id,
                ord.order_request_uuid AS order_request_uuid,
                count(sample.id) AS sample_count
            FROM order_order ord
            LEFT JOIN order_orderkit okit ON okit.order_id = ord.id
            LEFT JOIN vendor_sample sample ON sample.orderkit_id = okit.id
            WHERE ord.order_request_uuid = ANY($1)
            GROUP BY ord.id, ord.order_request_uuid
            ",
        )
        .bind(order_refs)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch fulfilled orders")?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(FulfilledOrder {
                id: row.try_get("id")?,
                order_request_uuid: row.try_get("order_request_uuid")?,
                sample_count: row.try_get("sample_count")?,
            });
        }

        Ok(orders)
    }
}
