use chrono::NaiveDate;

use super::cluster::cluster_and_filter;
use super::identity::IdentityKey;
use super::patch::PatchedCandidate;

/// Product grouping used by the second duplicate pass.
///
/// Family products are distinguished by their sorted sub-test composition
/// as well as their name; every other product is grouped by name alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductPartition {
    product_name: String,
    composition: String,
}

impl ProductPartition {
    #[must_use]
    pub fn for_candidate(record: &PatchedCandidate, family_slug: &str) -> Self {
        let order = &record.candidate.order;
        let composition = if order.is_family_member(family_slug) {
            record.patch.test_names().unwrap_or_default()
        } else {
            String::new()
        };
        Self {
            product_name: order.product_name.clone(),
            composition,
        }
    }
}

/// Re-clusters candidates on (identity, [`ProductPartition`]) and keeps the
/// clusters that still have more than one member with the latest member
/// created on `report_date`. This is the final duplicate set.
#[must_use]
pub fn repartition(
    candidates: Vec<PatchedCandidate>,
    family_slug: &str,
    report_date: NaiveDate,
) -> Vec<PatchedCandidate> {
    cluster_and_filter(
        candidates,
        |record| -> (IdentityKey, ProductPartition) {
            (
                record.candidate.identity.clone(),
                ProductPartition::for_candidate(record, family_slug),
            )
        },
        report_date,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::annotate::AnnotatedRecord;
    use crate::pipeline::patch::PatchSummary;
    use crate::store::models::OrderRecord;
    use chrono::{DateTime, TimeZone, Utc};

    const FAMILY: &str = "genesight";

    fn report_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 15).unwrap()
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, day, 10, 0, 0).unwrap()
    }

    fn record(id: i64, day: u32, slug: Option<&str>, tests: &[&str]) -> PatchedCandidate {
        let order = OrderRecord::new(id, "Sam", "Hill", 9, at(day)).with_product("GeneSight", slug);
        PatchedCandidate {
            candidate: AnnotatedRecord {
                order,
                identity: IdentityKey::from_names("sam", "hill").unwrap(),
                diff_days: 0,
                last_created_at: at(15),
            },
            patch: PatchSummary {
                sub_tests: tests.iter().map(ToString::to_string).collect(),
                ..PatchSummary::default()
            },
        }
    }

    fn ids(records: &[PatchedCandidate]) -> Vec<i64> {
        records.iter().map(|r| r.candidate.order.id).collect()
    }

    #[test]
    fn family_orders_with_different_tests_are_split() {
        let records = vec![
            record(1, 12, Some(FAMILY), &["Mthfr"]),
            record(2, 15, Some(FAMILY), &["Pharmacogenomic"]),
        ];

        assert!(repartition(records, FAMILY, report_date()).is_empty());
    }

    #[test]
    fn family_orders_with_same_tests_stay_flagged() {
        let records = vec![
            record(1, 12, Some(FAMILY), &["Mthfr", "Pgx"]),
            record(2, 15, Some(FAMILY), &["Mthfr", "Pgx"]),
        ];

        assert_eq!(ids(&repartition(records, FAMILY, report_date())), vec![1, 2]);
    }

    #[test]
    fn non_family_orders_ignore_test_composition() {
        let records = vec![
            record(1, 12, Some("carrier"), &["A"]),
            record(2, 15, Some("carrier"), &["B"]),
        ];

        assert_eq!(ids(&repartition(records, FAMILY, report_date())), vec![1, 2]);
    }

    #[test]
    fn max_timestamp_is_recomputed_over_the_new_cluster() {
        // The member created on the report date moves to its own partition,
        // leaving a pair whose latest order is two days old.
        let records = vec![
            record(1, 12, Some(FAMILY), &["A"]),
            record(2, 13, Some(FAMILY), &["A"]),
            record(3, 15, Some(FAMILY), &["B"]),
        ];

        assert!(repartition(records, FAMILY, report_date()).is_empty());
    }

    #[test]
    fn family_orders_without_tests_pair_with_each_other() {
        let records = vec![
            record(1, 12, Some(FAMILY), &[]),
            record(2, 15, Some(FAMILY), &[]),
            record(3, 14, Some(FAMILY), &["A"]),
        ];

        assert_eq!(ids(&repartition(records, FAMILY, report_date())), vec![1, 2]);
    }
}
