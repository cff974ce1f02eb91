use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::cluster::ClusterMember;
use super::identity::IdentityKey;
use crate::store::models::OrderRecord;
use crate::util::time::whole_days_between;

/// An order request annotated with its position inside its identity+product partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedRecord {
    pub order: OrderRecord,
    pub identity: IdentityKey,
    /// Whole days since the previous order of the same partition, 0 for the first.
    pub diff_days: i64,
    /// Latest creation timestamp across the whole partition.
    pub last_created_at: DateTime<Utc>,
}

impl AnnotatedRecord {
    #[must_use]
    pub fn primary_key(&self) -> (IdentityKey, i64) {
        (self.identity.clone(), self.order.product_id)
    }
}

impl ClusterMember for AnnotatedRecord {
    fn latest_seen(&self) -> DateTime<Utc> {
        self.last_created_at
    }
}

/// Partitions records by (normalized identity, product id), orders each
/// partition by creation time and annotates every member with the gap to its
/// predecessor and the partition maximum.
///
/// Records without a usable identity are left out. Output is grouped by
/// partition, each partition in ascending creation order.
#[must_use]
pub fn annotate(records: &[OrderRecord]) -> Vec<AnnotatedRecord> {
    let mut partitions: BTreeMap<(IdentityKey, i64), Vec<&OrderRecord>> = BTreeMap::new();
    for record in records {
        let Some(identity) =
            IdentityKey::from_names(&record.patient_first_name, &record.patient_last_name)
        else {
            continue;
        };
        partitions
            .entry((identity, record.product_id))
            .or_default()
            .push(record);
    }

    let mut annotated = Vec::with_capacity(records.len());
    for ((identity, _), mut members) in partitions {
        members.sort_by_key(|record| (record.created_at, record.id));
        let Some(last_created_at) = members.last().map(|record| record.created_at) else {
            continue;
        };

        let mut previous: Option<DateTime<Utc>> = None;
        for record in members {
            let diff_days = previous.map_or(0, |prev| whole_days_between(prev, record.created_at));
            previous = Some(record.created_at);
            annotated.push(AnnotatedRecord {
                order: record.clone(),
                identity: identity.clone(),
                diff_days,
                last_created_at,
            });
        }
    }

    annotated
}
