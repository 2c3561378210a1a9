//! Cross-crate integration test harness.
//!
//! Hosts the end-to-end pipeline tests that span the dimension, ingestion,
//! and segmentation crates, plus the shared fixture builders they use.
//! The fixtures build records with sensible defaults so a test only spells
//! out the fields it is actually about.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

use std::sync::Arc;

use chrono::NaiveDate;

use strata_core::MemoryBackend;
use strata_dims::{
    CalendarDimension, CardType, CategoryDimension, CustomerRecord, DimensionStore,
    EmploymentStatus,
};
use strata_ingest::{Channel, StagedFact, TransactionStatus};

/// Shorthand date constructor.
///
/// # Panics
///
/// Panics on an invalid calendar date; fixtures only use literal dates.
#[must_use]
pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture date")
}

/// A cleaned customer record with fixture defaults.
#[must_use]
pub fn customer(customer_id: &str, sequence: u64, opened: NaiveDate) -> CustomerRecord {
    CustomerRecord {
        customer_id: customer_id.to_string(),
        sequence,
        effective_date: opened,
        account_open_date: opened,
        card_type: CardType::Standard,
        credit_limit: 15_000,
        first_name: "Ruth".into(),
        last_name: "Okafor".into(),
        email: "ruth.okafor@example.com".into(),
        age: 38,
        state: "MN".into(),
        employment_status: EmploymentStatus::Employed,
    }
}

/// A staged fact with fixture defaults (approved, online, ingested
/// 2024-07-01T06:00Z).
#[must_use]
pub fn staged_fact(
    transaction_id: &str,
    customer_id: &str,
    event_date: NaiveDate,
    amount: f64,
    category_code: &str,
) -> StagedFact {
    StagedFact {
        transaction_id: transaction_id.to_string(),
        customer_id: customer_id.to_string(),
        event_date,
        amount,
        merchant_name: "Meridian Outfitters".into(),
        category_code: category_code.to_string(),
        channel: Channel::Online,
        status: TransactionStatus::Approved,
        ingested_at: "2024-07-01T06:00:00Z"
            .parse()
            .expect("valid fixture timestamp"),
    }
}

/// A fresh in-memory warehouse with the static dimensions materialized
/// over 2020-2029.
///
/// # Panics
///
/// Panics if bootstrap against the empty backend fails.
pub async fn initialized_warehouse() -> Arc<MemoryBackend> {
    let storage: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
    DimensionStore::new(storage.clone())
        .initialize(
            &CalendarDimension::build(day(2020, 1, 1), day(2029, 12, 31)),
            &CategoryDimension::standard(),
        )
        .await
        .expect("bootstrap static dimensions");
    storage
}
