//! Foreign-key resolution for staged facts.
//!
//! A staged fact carries natural keys; resolution turns them into the
//! surrogate keys a [`crate::fact::FactRow`] stores. Resolution never
//! partially links: a fact either resolves every foreign key or is
//! excluded with a [`RejectReason`].

use serde::{Deserialize, Serialize};

use strata_dims::{date_key, CalendarDimension, CategoryDimension, CustomerDimension};

use crate::fact::{FactRow, StagedFact};

/// Which customer version a fact links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    /// Link to the version currently flagged `is_current`.
    ///
    /// Dashboards asking for "latest attributes" join through this.
    CurrentState,
    /// Link to the version whose validity interval contains the fact's
    /// event date.
    ///
    /// Historically accurate analysis ("what tier was this customer in
    /// when this event happened") joins through this.
    PointInTime,
}

/// Why a staged fact was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No customer version resolves for the fact in the requested mode.
    UnknownCustomer,
    /// The category code is not in the category dimension.
    UnknownCategory,
    /// The event date falls outside the materialized calendar.
    OutsideCalendar,
    /// The amount is zero or negative.
    NonPositiveAmount,
}

impl RejectReason {
    /// Returns the reason as a metric/label string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownCustomer => "unknown_customer",
            Self::UnknownCategory => "unknown_category",
            Self::OutsideCalendar => "outside_calendar",
            Self::NonPositiveAmount => "non_positive_amount",
        }
    }

    /// Returns true for referential-integrity rejects (versus validation).
    #[must_use]
    pub fn is_referential(self) -> bool {
        matches!(self, Self::UnknownCustomer | Self::UnknownCategory)
    }
}

/// Resolves staged facts against the dimension snapshot.
pub struct FactResolver<'a> {
    customers: &'a CustomerDimension,
    categories: &'a CategoryDimension,
    calendar: &'a CalendarDimension,
}

impl<'a> FactResolver<'a> {
    /// Creates a resolver over the given dimension state.
    #[must_use]
    pub fn new(
        customers: &'a CustomerDimension,
        categories: &'a CategoryDimension,
        calendar: &'a CalendarDimension,
    ) -> Self {
        Self {
            customers,
            categories,
            calendar,
        }
    }

    /// Resolves one staged fact into a stored row.
    ///
    /// # Errors
    ///
    /// Returns the first [`RejectReason`] that disqualifies the fact.
    pub fn resolve(&self, staged: &StagedFact, mode: LinkMode) -> Result<FactRow, RejectReason> {
        if staged.amount <= 0.0 {
            return Err(RejectReason::NonPositiveAmount);
        }
        if !self.calendar.contains(staged.event_date) {
            return Err(RejectReason::OutsideCalendar);
        }

        let version = match mode {
            LinkMode::CurrentState => self.customers.current_of(&staged.customer_id),
            LinkMode::PointInTime => self
                .customers
                .version_at(&staged.customer_id, staged.event_date),
        }
        .ok_or(RejectReason::UnknownCustomer)?;

        let category = self
            .categories
            .by_code(&staged.category_code)
            .ok_or(RejectReason::UnknownCategory)?;

        Ok(FactRow {
            transaction_id: staged.transaction_id.clone(),
            customer_key: version.customer_key,
            customer_id: staged.customer_id.clone(),
            date_key: date_key(staged.event_date),
            category_key: category.category_key,
            amount: staged.amount,
            merchant_name: staged.merchant_name.clone(),
            channel: staged.channel,
            status: staged.status,
            event_date: staged.event_date,
            ingested_at: staged.ingested_at,
        })
    }
}
