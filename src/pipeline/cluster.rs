//! Shared cluster-and-filter step behind both duplicate passes.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, NaiveDate, Utc};

/// A record that can be grouped into a duplicate cluster.
pub trait ClusterMember {
    /// Timestamp this member contributes to its cluster's maximum.
    fn latest_seen(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy)]
struct ClusterStats {
    size: usize,
    last_created_at: DateTime<Utc>,
}

/// Groups `records` by `key_fn` and keeps the members of clusters that have
/// more than one member and whose latest timestamp falls on `report_date`.
///
/// Input order is preserved among the retained records.
pub fn cluster_and_filter<T, K, F>(records: Vec<T>, key_fn: F, report_date: NaiveDate) -> Vec<T>
where
    T: ClusterMember,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut clusters: HashMap<K, ClusterStats> = HashMap::new();
    for record in &records {
        let seen = record.latest_seen();
        clusters
            .entry(key_fn(record))
            .and_modify(|stats| {
                stats.size += 1;
                stats.last_created_at = stats.last_created_at.max(seen);
            })
            .or_insert(ClusterStats {
                size: 1,
                last_created_at: seen,
            });
    }

    records
        .into_iter()
        .filter(|record| {
            clusters.get(&key_fn(record)).is_some_and(|stats| {
                stats.size > 1 && stats.last_created_at.date_naive() == report_date
            })
        })
        .collect()
}
