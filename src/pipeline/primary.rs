use chrono::NaiveDate;

use super::annotate::AnnotatedRecord;
use super::cluster::cluster_and_filter;

/// Candidate duplicates: members of identity+product clusters with more than
/// one order inside the window whose latest order was created on `report_date`.
///
/// Orders whose gap to their predecessor exceeds `window_days` are dropped
/// before cluster sizes are counted.
#[must_use]
pub fn primary_candidates(
    annotated: Vec<AnnotatedRecord>,
    window_days: u32,
    report_date: NaiveDate,
) -> Vec<AnnotatedRecord> {
    let in_range: Vec<AnnotatedRecord> = annotated
        .into_iter()
        .filter(|record| record.diff_days <= i64::from(window_days))
        .collect();

    cluster_and_filter(in_range, AnnotatedRecord::primary_key, report_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::annotate::annotate;
    use crate::store::models::OrderRecord;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn report_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 30).unwrap()
    }

    fn days_before(days: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 30, 15, 0, 0).unwrap() - Duration::days(days)
    }

    fn ids(records: &[AnnotatedRecord]) -> Vec<i64> {
        let mut ids: Vec<i64> = records.iter().map(|r| r.order.id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn pair_within_window_ending_today_is_candidate() {
        let orders = vec![
            OrderRecord::new(1, "Jane", "Doe", 5, days_before(2)),
            OrderRecord::new(2, "jane", "DOE", 5, days_before(0)),
        ];

        let candidates = primary_candidates(annotate(&orders), 30, report_date());

        assert_eq!(ids(&candidates), vec![1, 2]);
    }

    #[test]
    fn gap_beyond_window_breaks_the_pair() {
        let orders = vec![
            OrderRecord::new(1, "Jane", "Doe", 5, days_before(40)),
            OrderRecord::new(2, "Jane", "Doe", 5, days_before(0)),
        ];

        assert!(primary_candidates(annotate(&orders), 30, report_date()).is_empty());
    }

    #[test]
    fn gap_exactly_at_window_is_kept() {
        let orders = vec![
            OrderRecord::new(1, "Jane", "Doe", 5, days_before(30)),
            OrderRecord::new(2, "Jane", "Doe", 5, days_before(0)),
        ];

        assert_eq!(ids(&primary_candidates(annotate(&orders), 30, report_date())), vec![1, 2]);
    }

    #[test]
    fn cluster_confirmed_yesterday_is_not_reported_today() {
        let orders = vec![
            OrderRecord::new(1, "Jane", "Doe", 5, days_before(3)),
            OrderRecord::new(2, "Jane", "Doe", 5, days_before(1)),
        ];
        let yesterday = report_date().pred_opt().unwrap();

        assert!(primary_candidates(annotate(&orders), 30, report_date()).is_empty());
        assert_eq!(ids(&primary_candidates(annotate(&orders), 30, yesterday)), vec![1, 2]);
    }

    #[test]
    fn different_products_do_not_pair() {
        let orders = vec![
            OrderRecord::new(1, "Jane", "Doe", 5, days_before(2)),
            OrderRecord::new(2, "Jane", "Doe", 6, days_before(0)),
        ];

        assert!(primary_candidates(annotate(&orders), 30, report_date()).is_empty());
    }

    #[test]
    fn empty_last_name_never_pairs() {
        let orders = vec![
            OrderRecord::new(1, "Jane", "", 5, days_before(2)),
            OrderRecord::new(2, "Jane", "Doe", 5, days_before(0)),
        ];

        assert!(primary_candidates(annotate(&orders), 30, report_date()).is_empty());
    }
}
