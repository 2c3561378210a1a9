//! Rolling window arithmetic.
//!
//! All window logic is anchored to an explicit `as_of` date passed into
//! the run - never an ambient clock - so runs are reproducible. Both
//! windows are half-open: the trailing window is `[as_of - W, as_of)` and
//! the prior window is `[as_of - 2W, as_of - W)`.

use chrono::{Days, NaiveDate};

/// A trailing window anchored at an as-of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingWindow {
    as_of: NaiveDate,
    length_days: i64,
}

impl RollingWindow {
    /// Creates a window of `length_days` ending (exclusive) at `as_of`.
    ///
    /// # Panics
    ///
    /// Panics if `length_days` is not positive; the configuration layer
    /// validates this before a window is built.
    #[must_use]
    pub fn new(as_of: NaiveDate, length_days: i64) -> Self {
        assert!(length_days > 0, "window length must be positive");
        Self { as_of, length_days }
    }

    /// The as-of anchor date.
    #[must_use]
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// The window length in days.
    #[must_use]
    pub fn length_days(&self) -> i64 {
        self.length_days
    }

    /// The window length in 30-day months.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn months(&self) -> f64 {
        self.length_days as f64 / 30.0
    }

    fn days_back(&self, days: i64) -> NaiveDate {
        self.as_of
            .checked_sub_days(Days::new(days.unsigned_abs()))
            .unwrap_or(NaiveDate::MIN)
    }

    /// First day of the trailing window (inclusive).
    #[must_use]
    pub fn trailing_start(&self) -> NaiveDate {
        self.days_back(self.length_days)
    }

    /// First day of the prior window (inclusive).
    #[must_use]
    pub fn prior_start(&self) -> NaiveDate {
        self.days_back(self.length_days * 2)
    }

    /// Returns true if `date` is in `[as_of - W, as_of)`.
    #[must_use]
    pub fn in_trailing(&self, date: NaiveDate) -> bool {
        date >= self.trailing_start() && date < self.as_of
    }

    /// Returns true if `date` is in `[as_of - 2W, as_of - W)`.
    #[must_use]
    pub fn in_prior(&self, date: NaiveDate) -> bool {
        date >= self.prior_start() && date < self.trailing_start()
    }
}

/// Whole months elapsed from `start` to `end`, floored.
///
/// Returns 0 when `end` precedes `start`.
#[must_use]
pub fn months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    use chrono::Datelike;
    if end < start {
        return 0;
    }
    let mut months =
        i64::from(end.year() - start.year()) * 12 + i64::from(end.month()) - i64::from(start.month());
    if end.day() < start.day() {
        months -= 1;
    }
    months.max(0)
}
