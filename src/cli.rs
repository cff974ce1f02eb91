use chrono::NaiveDate;
use clap::Parser;

use crate::util::time::YearMonth;

/// Builds the daily duplicate order request report.
///
/// Without arguments every elapsed day of the current month is reported.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Single report date (YYYY-MM-DD)
    #[arg(long, env = "DUP_REPORT_DATE", conflicts_with = "month")]
    pub date: Option<NaiveDate>,

    /// Every day of a month, latest first (YYYY-MM)
    #[arg(long, env = "DUP_REPORT_MONTH")]
    pub month: Option<YearMonth>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTarget {
    Day(NaiveDate),
    Month(YearMonth),
}

impl Cli {
    #[must_use]
    pub fn target(&self, today: NaiveDate) -> RunTarget {
        match (self.date, self.month) {
            (Some(date), _) => RunTarget::Day(date),
            (None, Some(month)) => RunTarget::Month(month),
            (None, None) => RunTarget::Month(YearMonth::containing(today)),
        }
    }
}

impl RunTarget {
    /// Report dates to build, latest first.
    #[must_use]
    pub fn report_dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        match self {
            Self::Day(date) => vec![*date],
            Self::Month(month) => month.report_dates(today),
        }
    }
}
