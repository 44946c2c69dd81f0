use chrono::NaiveDate;
use serde::Serialize;

use crate::history::find_by_date;
use crate::models::{DayLog, DayStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarStatus {
    Future,
    Today,
    Perfect,
    Good,
    Bad,
    Pending,
    Missed,
}

impl CalendarStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CalendarStatus::Future => "future",
            CalendarStatus::Today => "today",
            CalendarStatus::Perfect => "perfect",
            CalendarStatus::Good => "good",
            CalendarStatus::Bad => "bad",
            CalendarStatus::Pending => "pending",
            CalendarStatus::Missed => "missed",
        }
    }
}

impl From<DayStatus> for CalendarStatus {
    fn from(status: DayStatus) -> Self {
        match status {
            DayStatus::Perfect => CalendarStatus::Perfect,
            DayStatus::Good => CalendarStatus::Good,
            DayStatus::Bad => CalendarStatus::Bad,
            DayStatus::Pending => CalendarStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    /// 1-based position within the protocol.
    pub day_number: u32,
    pub status: CalendarStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

#[must_use]
pub fn day_status(date: NaiveDate, today: NaiveDate, history: &[DayLog]) -> CalendarStatus {
    if date > today {
        return CalendarStatus::Future;
    }
    if date == today {
        return CalendarStatus::Today;
    }
    find_by_date(history, date).map_or(CalendarStatus::Missed, |log| log.status.into())
}

/// One entry per date in `[start, target]`. Empty when `start > target`.
#[must_use]
pub fn build_calendar(
    start: NaiveDate,
    target: NaiveDate,
    today: NaiveDate,
    history: &[DayLog],
) -> Vec<CalendarDay> {
    start
        .iter_days()
        .take_while(|d| *d <= target)
        .zip(1u32..)
        .map(|(date, day_number)| CalendarDay {
            date,
            day_number,
            status: day_status(date, today, history),
            score: find_by_date(history, date).map(|log| log.score),
        })
        .collect()
}
