//! The calendar dimension.
//!
//! A static, pre-materialized per-day reference table. Built once at
//! bootstrap over a fixed date range; no write path afterwards. Fact rows
//! carry a `date_key` in `YYYYMMDD` form that joins against this table.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Returns the `YYYYMMDD` integer key for a date.
#[must_use]
pub fn date_key(date: NaiveDate) -> i32 {
    date.year() * 10_000 + i32::try_from(date.month()).unwrap_or(0) * 100
        + i32::try_from(date.day()).unwrap_or(0)
}

/// One day in the calendar dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    /// `YYYYMMDD` integer key.
    pub date_key: i32,
    /// The calendar date.
    pub date: NaiveDate,
    /// Calendar year.
    pub year: i32,
    /// Quarter of the year (1-4).
    pub quarter: u8,
    /// Month of the year (1-12).
    pub month: u8,
    /// English month name.
    pub month_name: String,
    /// Day of the month (1-31).
    pub day_of_month: u8,
    /// ISO day of the week (1 = Monday).
    pub day_of_week: u8,
    /// English day name.
    pub day_name: String,
    /// True for Saturday and Sunday.
    pub is_weekend: bool,
}

impl CalendarDay {
    fn for_date(date: NaiveDate) -> Self {
        let weekday = date.weekday();
        Self {
            date_key: date_key(date),
            date,
            year: date.year(),
            quarter: ((date.month0() / 3) + 1) as u8,
            month: date.month() as u8,
            month_name: date.format("%B").to_string(),
            day_of_month: date.day() as u8,
            day_of_week: weekday.number_from_monday() as u8,
            day_name: date.format("%A").to_string(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }
}

/// The materialized calendar dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDimension {
    /// First covered day.
    pub start: NaiveDate,
    /// Last covered day (inclusive).
    pub end: NaiveDate,
    /// One row per day.
    days: Vec<CalendarDay>,
}

impl CalendarDimension {
    /// Materializes the calendar over `[start, end]` inclusive.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`.
    #[must_use]
    pub fn build(start: NaiveDate, end: NaiveDate) -> Self {
        assert!(start <= end, "calendar start after end");
        let days = start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(CalendarDay::for_date)
            .collect();
        Self { start, end, days }
    }

    /// Returns the number of days covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Returns true if the calendar covers no days.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Returns true if `date` is inside the covered range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Returns the row for a date, if covered.
    #[must_use]
    pub fn day(&self, date: NaiveDate) -> Option<&CalendarDay> {
        if !self.contains(date) {
            return None;
        }
        let offset = date.signed_duration_since(self.start).num_days();
        usize::try_from(offset).ok().and_then(|i| self.days.get(i))
    }
}
