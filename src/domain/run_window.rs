//! Business-day run windows and catchup enumeration.
//!
//! A run evaluates one business date. The daily schedule fires on weekdays only,
//! and a run started on some day evaluates the interval that has already closed,
//! i.e. the previous business day.

use crate::domain::error::PipelineError;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::fmt;

/// Trading days covered by one weekly report.
pub const REPORT_DAYS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunWindow {
    date: NaiveDate,
}

impl RunWindow {
    pub fn new(date: NaiveDate) -> Result<Self, PipelineError> {
        if !is_business_day(date) {
            return Err(PipelineError::NotBusinessDay { date });
        }
        Ok(Self { date })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Friday windows close their week and trigger the weekly report.
    pub fn closes_week(&self) -> bool {
        self.date.weekday() == Weekday::Fri
    }
}

impl fmt::Display for RunWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))
    }
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Monday of the calendar week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Half-open `[start, end)` date range of the report week containing `date`.
pub fn report_range(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = week_start(date);
    (start, start + Duration::days(REPORT_DAYS))
}

/// Last business day strictly before `as_of`, or `None` at the start of the
/// calendar.
pub fn latest_closed_window(as_of: NaiveDate) -> Option<RunWindow> {
    let mut date = as_of.checked_sub_signed(Duration::days(1))?;
    while !is_business_day(date) {
        date = date.checked_sub_signed(Duration::days(1))?;
    }
    Some(RunWindow { date })
}

/// Every business day in `[start, end]`, ascending.
pub fn catchup(start: NaiveDate, end: NaiveDate) -> Vec<RunWindow> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_business_day(*d))
        .map(|date| RunWindow { date })
        .collect()
}

/// Up to `count` most recent closed windows as of `as_of`, ascending. Fewer
/// are returned when the calendar runs out.
pub fn lookback(as_of: NaiveDate, count: usize) -> Vec<RunWindow> {
    let mut windows = Vec::new();
    let mut cursor = as_of;
    while windows.len() < count {
        let Some(window) = latest_closed_window(cursor) else {
            break;
        };
        cursor = window.date;
        windows.push(window);
    }
    windows.reverse();
    windows
}
