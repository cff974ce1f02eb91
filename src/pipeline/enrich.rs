use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::error::PipelineError;
use super::identity::IdentityKey;
use super::patch::PatchedCandidate;
use crate::store::models::{ClinicLink, ClinicRow, FulfilledOrder, OrderRecord};

/// A confirmed duplicate with everything the daily report shows about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedRecord {
    pub order: OrderRecord,
    pub clinic_external_id: Option<String>,
    pub clinic_name: Option<String>,
    pub clinic_emr_enabled_on: Option<DateTime<Utc>>,
    /// Distinct salesforce identifiers of the clinic, comma-joined.
    pub salesforces: Option<String>,
    /// Distinct EMR vendor names of the clinic, comma-joined.
    pub vendors: Option<String>,
    /// Distinct barcodes seen for the clinic across the named orders of the window.
    pub clinic_barcode_volume: Option<i64>,
    pub patch_channel_count: i64,
    pub patch_submitter: Option<String>,
    pub test_offering_names: Option<String>,
    pub order_sample_count: Option<i64>,
    pub converted: bool,
}

/// Everything the joiner needs besides the duplicates themselves.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentInputs<'a> {
    pub window_records: &'a [OrderRecord],
    pub clinics: &'a [ClinicRow],
    pub salesforce_ids: &'a [ClinicLink],
    pub vendors: &'a [ClinicLink],
    pub fulfilled_orders: &'a [FulfilledOrder],
}

/// Per-run lookup tables, each keyed the way the report joins on it.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentTables {
    clinics: HashMap<i64, ClinicRow>,
    salesforce_ids: HashMap<i64, String>,
    vendors: HashMap<i64, String>,
    barcode_volume: HashMap<i64, i64>,
    fulfilled_orders: HashMap<Uuid, FulfilledOrder>,
}

impl EnrichmentTables {
    /// Builds every lookup table once.
    ///
    /// # Errors
    /// Returns [`PipelineError::AmbiguousAggregation`] when a clinic id maps to
    /// more than one clinic row or an order request is referenced by more than
    /// one fulfilled order.
    pub fn build(inputs: EnrichmentInputs<'_>) -> Result<Self, PipelineError> {
        Ok(Self {
            clinics: unique_by_key(inputs.clinics, "clinic", |clinic| clinic.id)?,
            salesforce_ids: joined_distinct(inputs.salesforce_ids),
            vendors: joined_distinct(inputs.vendors),
            barcode_volume: barcode_volume(inputs.window_records),
            fulfilled_orders: unique_by_key(inputs.fulfilled_orders, "fulfilled order", |order| {
                order.order_request_uuid
            })?,
        })
    }

    fn enrich(&self, record: PatchedCandidate) -> EnrichedRecord {
        let PatchedCandidate { candidate, patch } = record;
        let test_offering_names = patch.test_names();
        let order = candidate.order;

        let clinic = order.clinic_id.and_then(|id| self.clinics.get(&id));
        let clinic_lookup = |table: &HashMap<i64, String>| {
            order.clinic_id.and_then(|id| table.get(&id)).cloned()
        };
        let fulfilled = self.fulfilled_orders.get(&order.uuid);

        EnrichedRecord {
            clinic_external_id: clinic.and_then(|c| c.external_id.clone()),
            clinic_name: clinic.and_then(|c| c.name.clone()),
            clinic_emr_enabled_on: clinic.and_then(|c| c.emr_enabled_on),
            salesforces: clinic_lookup(&self.salesforce_ids),
            vendors: clinic_lookup(&self.vendors),
            clinic_barcode_volume: order
                .clinic_id
                .and_then(|id| self.barcode_volume.get(&id).copied()),
            patch_channel_count: patch.channel_count,
            patch_submitter: patch.submitter,
            test_offering_names,
            order_sample_count: fulfilled.map(|f| f.sample_count),
            converted: fulfilled.is_some(),
            order,
        }
    }
}

fn unique_by_key<T, K, F>(rows: &[T], relation: &'static str, key_fn: F) -> Result<HashMap<K, T>, PipelineError>
where
    T: Clone,
    K: Eq + std::hash::Hash + ToString,
    F: Fn(&T) -> K,
{
    let mut counts: HashMap<K, usize> = HashMap::new();
    for row in rows {
        *counts.entry(key_fn(row)).or_default() += 1;
    }
    if let Some((key, rows)) = counts.into_iter().find(|(_, count)| *count > 1) {
        return Err(PipelineError::AmbiguousAggregation {
            relation,
            key: key.to_string(),
            rows,
        });
    }

    Ok(rows.iter().map(|row| (key_fn(row), row.clone())).collect())
}

fn joined_distinct(links: &[ClinicLink]) -> HashMap<i64, String> {
    let mut grouped: HashMap<i64, BTreeSet<&str>> = HashMap::new();
    for link in links {
        grouped.entry(link.clinic_id).or_default().insert(&link.value);
    }
    grouped
        .into_iter()
        .map(|(clinic_id, values)| (clinic_id, values.into_iter().collect::<Vec<_>>().join(",")))
        .collect()
}

/// Distinct barcodes per clinic over the window orders that carry a patient
/// identity. A missing barcode counts as one value of its own.
fn barcode_volume(records: &[OrderRecord]) -> HashMap<i64, i64> {
    let mut grouped: HashMap<i64, HashSet<Option<&str>>> = HashMap::new();
    let named = records
        .iter()
        .filter(|r| IdentityKey::from_names(&r.patient_first_name, &r.patient_last_name).is_some());
    for record in named {
        if let Some(clinic_id) = record.clinic_id {
            grouped
                .entry(clinic_id)
                .or_default()
                .insert(record.barcode.as_deref());
        }
    }
    grouped
        .into_iter()
        .map(|(clinic_id, barcodes)| (clinic_id, i64::try_from(barcodes.len()).unwrap_or(i64::MAX)))
        .collect()
}

/// Joins the lookup tables onto the final duplicates and puts them in report order.
#[must_use]
pub fn enrich(records: Vec<PatchedCandidate>, tables: &EnrichmentTables) -> Vec<EnrichedRecord> {
    let mut enriched: Vec<EnrichedRecord> = records.into_iter().map(|r| tables.enrich(r)).collect();
    sort_for_report(&mut enriched);
    enriched
}

/// Product id, last name, first name (case-insensitive), newest first; id
/// breaks remaining ties.
pub fn sort_for_report(records: &mut [EnrichedRecord]) {
    records.sort_by_cached_key(|record| {
        let order = &record.order;
        (
            order.product_id,
            order.patient_last_name.to_lowercase(),
            order.patient_first_name.to_lowercase(),
            Reverse(order.created_at),
            order.id,
        )
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::annotate::AnnotatedRecord;
    use crate::pipeline::identity::IdentityKey;
    use crate::pipeline::patch::PatchSummary;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, day, 9, 0, 0).unwrap()
    }

    fn patched(order: OrderRecord) -> PatchedCandidate {
        let identity =
            IdentityKey::from_names(&order.patient_first_name, &order.patient_last_name).unwrap();
        PatchedCandidate {
            candidate: AnnotatedRecord {
                identity,
                diff_days: 0,
                last_created_at: order.created_at,
                order,
            },
            patch: PatchSummary::default(),
        }
    }

    fn clinic(id: i64) -> ClinicRow {
        ClinicRow {
            id,
            external_id: Some(format!("EXT-{id}")),
            name: Some(format!("Clinic {id}")),
            emr_enabled_on: None,
        }
    }

    fn empty_inputs<'a>(window_records: &'a [OrderRecord]) -> EnrichmentInputs<'a> {
        EnrichmentInputs {
            window_records,
            clinics: &[],
            salesforce_ids: &[],
            vendors: &[],
            fulfilled_orders: &[],
        }
    }

    #[test]
    fn joins_clinic_attributes_and_distinct_lists() {
        let order = OrderRecord::new(1, "Kim", "Park", 3, at(2)).with_clinic(7);
        let window = vec![order.clone()];
        let clinics = vec![clinic(7)];
        let salesforce = vec![
            ClinicLink::new(7, "sf-b"),
            ClinicLink::new(7, "sf-a"),
            ClinicLink::new(7, "sf-b"),
        ];
        let vendors = vec![ClinicLink::new(7, "Epic"), ClinicLink::new(8, "Cerner")];
        let tables = EnrichmentTables::build(EnrichmentInputs {
            clinics: &clinics,
            salesforce_ids: &salesforce,
            vendors: &vendors,
            ..empty_inputs(&window)
        })
        .expect("tables build");

        let enriched = enrich(vec![patched(order)], &tables);

        assert_eq!(enriched[0].clinic_external_id.as_deref(), Some("EXT-7"));
        assert_eq!(enriched[0].clinic_name.as_deref(), Some("Clinic 7"));
        assert_eq!(enriched[0].salesforces.as_deref(), Some("sf-a,sf-b"));
        assert_eq!(enriched[0].vendors.as_deref(), Some("Epic"));
        assert_eq!(enriched[0].clinic_barcode_volume, Some(1));
    }

    #[test]
    fn missing_lookups_leave_fields_empty() {
        let order = OrderRecord::new(1, "Kim", "Park", 3, at(2));
        let window = vec![order.clone()];
        let tables = EnrichmentTables::build(empty_inputs(&window)).expect("tables build");

        let enriched = enrich(vec![patched(order)], &tables);

        let record = &enriched[0];
        assert!(record.clinic_external_id.is_none());
        assert!(record.salesforces.is_none());
        assert!(record.vendors.is_none());
        assert!(record.clinic_barcode_volume.is_none());
        assert!(record.order_sample_count.is_none());
        assert!(!record.converted);
        assert_eq!(record.patch_channel_count, 0);
    }

    #[test]
    fn barcode_volume_counts_distinct_barcodes_across_window() {
        let window = vec![
            OrderRecord::new(1, "Kim", "Park", 3, at(2)).with_clinic(7).with_barcode("B1"),
            OrderRecord::new(2, "Kim", "Park", 3, at(3)).with_clinic(7).with_barcode("B1"),
            OrderRecord::new(3, "Lee", "Ng", 4, at(3)).with_clinic(7).with_barcode("B2"),
            OrderRecord::new(4, "Lee", "Ng", 4, at(4)).with_clinic(7),
            OrderRecord::new(5, "Lee", "Ng", 4, at(4)).with_clinic(8).with_barcode("B3"),
        ];

        let volume = barcode_volume(&window);

        assert_eq!(volume.get(&7), Some(&3));
        assert_eq!(volume.get(&8), Some(&1));
    }

    #[test]
    fn barcode_volume_ignores_orders_without_patient_names() {
        let window = vec![
            OrderRecord::new(1, "Kim", "Park", 3, at(2)).with_clinic(7).with_barcode("B1"),
            OrderRecord::new(2, "", "Park", 3, at(3)).with_clinic(7).with_barcode("UNNAMED-1"),
            OrderRecord::new(3, "Kim", "", 3, at(3)).with_clinic(7).with_barcode("UNNAMED-2"),
            OrderRecord::new(4, "", "", 3, at(4)).with_clinic(9).with_barcode("UNNAMED-3"),
        ];

        let volume = barcode_volume(&window);

        assert_eq!(volume.get(&7), Some(&1));
        assert!(!volume.contains_key(&9));
    }

    #[test]
    fn fulfilled_order_marks_conversion_and_sample_count() {
        let reference = Uuid::new_v4();
        let order = OrderRecord::new(1, "Kim", "Park", 3, at(2)).with_uuid(reference);
        let window = vec![order.clone()];
        let fulfilled = vec![FulfilledOrder {
            id: 55,
            order_request_uuid: reference,
            sample_count: 2,
        }];
        let tables = EnrichmentTables::build(EnrichmentInputs {
            fulfilled_orders: &fulfilled,
            ..empty_inputs(&window)
        })
        .expect("tables build");

        let enriched = enrich(vec![patched(order)], &tables);

        assert!(enriched[0].converted);
        assert_eq!(enriched[0].order_sample_count, Some(2));
    }

    #[test]
    fn duplicate_clinic_rows_are_ambiguous() {
        let clinics = vec![clinic(7), clinic(7)];
        let error = EnrichmentTables::build(EnrichmentInputs {
            clinics: &clinics,
            ..empty_inputs(&[])
        })
        .expect_err("clinic lookup must be functional");

        assert!(matches!(
            error,
            PipelineError::AmbiguousAggregation { relation: "clinic", rows: 2, .. }
        ));
    }

    #[test]
    fn two_fulfilled_orders_for_one_request_are_ambiguous() {
        let reference = Uuid::new_v4();
        let fulfilled = vec![
            FulfilledOrder { id: 1, order_request_uuid: reference, sample_count: 0 },
            FulfilledOrder { id: 2, order_request_uuid: reference, sample_count: 1 },
        ];
        let result = EnrichmentTables::build(EnrichmentInputs {
            fulfilled_orders: &fulfilled,
            ..empty_inputs(&[])
        });

        assert!(matches!(
            result,
            Err(PipelineError::AmbiguousAggregation { relation: "fulfilled order", .. })
        ));
    }

    #[test]
    fn report_order_is_product_last_first_then_newest() {
        let orders = vec![
            OrderRecord::new(1, "Amy", "Zed", 2, at(1)),
            OrderRecord::new(2, "Bob", "Ames", 2, at(1)),
            OrderRecord::new(3, "amy", "AMES", 2, at(1)),
            OrderRecord::new(4, "Amy", "Ames", 2, at(5)),
            OrderRecord::new(5, "Zoe", "Zed", 1, at(1)),
        ];
        let tables = EnrichmentTables::default();

        let ids: Vec<i64> = enrich(orders.into_iter().map(patched).collect(), &tables)
            .iter()
            .map(|r| r.order.id)
            .collect();

        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }
}
