use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

pub const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeError {
    #[error("invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),
}

/// Trailing window of `window_days` days that ends with the report date.
///
/// Both bounds are exclusive: the window opens at midnight (UTC) `window_days`
/// before the report date and closes at the midnight that follows it, so every
/// record created on the report date itself is inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    report_date: NaiveDate,
    window_days: u32,
}

impl ReportWindow {
    #[must_use]
    pub fn new(report_date: NaiveDate, window_days: u32) -> Self {
        Self {
            report_date,
            window_days,
        }
    }

    #[must_use]
    pub fn report_date(&self) -> NaiveDate {
        self.report_date
    }

    #[must_use]
    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        day_start(self.report_date - Duration::days(i64::from(self.window_days)))
    }

    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        day_start(self.report_date + Duration::days(1))
    }

    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp > self.start() && timestamp < self.end()
    }
}

/// Midnight UTC at the beginning of `date`.
#[must_use]
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Whole days elapsed between two timestamps, rounded down.
#[must_use]
pub fn whole_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_seconds().div_euclid(SECONDS_PER_DAY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// # Errors
    /// Returns [`TimeError::InvalidMonth`] when the pair does not name a calendar month.
    pub fn new(year: i32, month: u32) -> Result<Self, TimeError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|_| Self { year, month })
            .ok_or_else(|| TimeError::InvalidMonth(format!("{year:04}-{month:02}")))
    }

    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.month
    }

    fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    fn last_day(self) -> Option<NaiveDate> {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1).and_then(|next| next.pred_opt())
    }

    /// Report dates for the month, latest first.
    ///
    /// Only days strictly before `today` are returned, so the current month
    /// stops at yesterday and future months are empty.
    #[must_use]
    pub fn report_dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        let (Some(first), Some(last)) = (self.first_day(), self.last_day()) else {
            return Vec::new();
        };
        first
            .iter_days()
            .take_while(|day| *day <= last)
            .filter(|day| *day < today)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = TimeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || TimeError::InvalidMonth(raw.to_string());
        let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_bounds_cover_the_whole_report_day() {
        let window = ReportWindow::new(date(2024, 3, 31), 30);

        assert_eq!(window.start(), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(window.end(), Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
        assert!(window.contains(Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        assert!(window.contains(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 1).unwrap()));
    }

    #[rstest]
    #[case(0, 0)]
    #[case(86_399, 0)]
    #[case(86_400, 1)]
    #[case(2 * 86_400 + 5, 2)]
    fn whole_days_between_rounds_down(#[case] seconds: i64, #[case] expected: i64) {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let later = earlier + Duration::seconds(seconds);
        assert_eq!(whole_days_between(earlier, later), expected);
    }

    #[rstest]
    #[case("2024-02", 2024, 2)]
    #[case(" 2023-12 ", 2023, 12)]
    fn year_month_parses(#[case] raw: &str, #[case] year: i32, #[case] month: u32) {
        let parsed: YearMonth = raw.parse().expect("valid month");
        assert_eq!((parsed.year(), parsed.month()), (year, month));
    }

    #[rstest]
    #[case("2024-13")]
    #[case("2024")]
    #[case("twenty-one")]
    fn year_month_rejects_garbage(#[case] raw: &str) {
        assert!(raw.parse::<YearMonth>().is_err());
    }

    #[test]
    fn report_dates_for_past_month_are_descending_and_complete() {
        let month = YearMonth::new(2024, 2).unwrap();
        let dates = month.report_dates(date(2024, 6, 1));

        assert_eq!(dates.len(), 29);
        assert_eq!(dates.first(), Some(&date(2024, 2, 29)));
        assert_eq!(dates.last(), Some(&date(2024, 2, 1)));
    }

    #[test]
    fn report_dates_for_current_month_stop_at_yesterday() {
        let month = YearMonth::new(2024, 12).unwrap();
        let dates = month.report_dates(date(2024, 12, 4));

        assert_eq!(dates, vec![date(2024, 12, 3), date(2024, 12, 2), date(2024, 12, 1)]);
        assert!(month.report_dates(date(2024, 12, 1)).is_empty());
    }
}
