//! Per-customer window aggregates.
//!
//! One [`CustomerActivity`] per customer with at least one fact: trailing
//! and prior spend sums, the trend between them, monthly average,
//! category-group mix over the trailing window, and tenure. Only approved
//! transactions contribute to spend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use strata_dims::{CategoryDimension, CategoryGroup, CustomerDimension};
use strata_ingest::{FactRow, TransactionStatus};

use crate::window::{months_between, RollingWindow};

/// Window aggregates for one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerActivity {
    /// Natural key of the customer.
    pub customer_id: String,
    /// Approved spend in the trailing window.
    pub trailing_spend: f64,
    /// Approved spend in the prior window.
    pub prior_spend: f64,
    /// `(trailing - prior) / prior * 100`; `None` when the prior window
    /// has no baseline, which routes the customer past trend rules.
    pub trend_pct: Option<f64>,
    /// Trailing spend normalized to a 30-day month.
    pub monthly_avg_spend: f64,
    /// Share of trailing spend in the travel group, in percent.
    pub travel_pct: f64,
    /// Share of trailing spend in the necessities group, in percent.
    pub necessities_pct: f64,
    /// Whole months since the customer's earliest version opened.
    pub tenure_months: i64,
}

#[derive(Default)]
struct Accumulator {
    trailing: f64,
    prior: f64,
    trailing_travel: f64,
    trailing_necessities: f64,
    earliest_fact: Option<chrono::NaiveDate>,
}

/// Computes activities for every customer with at least one fact.
///
/// Customers with zero facts are absent from the result; the caller never
/// fabricates a "no activity" aggregate. Facts outside both windows still
/// register the customer (with zero window spend), because having history
/// at all is what qualifies a customer for labeling.
#[must_use]
pub fn compute_activities(
    facts: &[FactRow],
    customers: &CustomerDimension,
    categories: &CategoryDimension,
    window: &RollingWindow,
) -> Vec<CustomerActivity> {
    let mut by_customer: BTreeMap<&str, Accumulator> = BTreeMap::new();

    for fact in facts {
        let acc = by_customer.entry(fact.customer_id.as_str()).or_default();
        acc.earliest_fact = Some(match acc.earliest_fact {
            Some(d) if d <= fact.event_date => d,
            _ => fact.event_date,
        });

        if fact.status != TransactionStatus::Approved {
            continue;
        }

        if window.in_trailing(fact.event_date) {
            acc.trailing += fact.amount;
            match categories.group_of(fact.category_key) {
                Some(CategoryGroup::Travel) => acc.trailing_travel += fact.amount,
                Some(CategoryGroup::Necessities) => acc.trailing_necessities += fact.amount,
                _ => {}
            }
        } else if window.in_prior(fact.event_date) {
            acc.prior += fact.amount;
        }
    }

    by_customer
        .into_iter()
        .map(|(customer_id, acc)| {
            let trend_pct = if acc.prior == 0.0 {
                None
            } else {
                Some((acc.trailing - acc.prior) / acc.prior * 100.0)
            };
            let (travel_pct, necessities_pct) = if acc.trailing == 0.0 {
                (0.0, 0.0)
            } else {
                (
                    acc.trailing_travel / acc.trailing * 100.0,
                    acc.trailing_necessities / acc.trailing * 100.0,
                )
            };

            // Tenure runs from account open (the earliest version); the
            // earliest fact only backstops a customer missing from the
            // dimension, which FK validation should have prevented.
            let opened = customers
                .history(customer_id)
                .first()
                .map(|v| v.valid_from)
                .or(acc.earliest_fact)
                .unwrap_or(window.as_of());

            CustomerActivity {
                customer_id: customer_id.to_string(),
                trailing_spend: acc.trailing,
                prior_spend: acc.prior,
                trend_pct,
                monthly_avg_spend: acc.trailing / window.months(),
                travel_pct,
                necessities_pct,
                tenure_months: months_between(opened, window.as_of()),
            }
        })
        .collect()
}
