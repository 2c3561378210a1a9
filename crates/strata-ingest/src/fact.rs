//! Staged and stored transaction facts.
//!
//! A [`StagedFact`] is one cleaned upstream row, still carrying natural
//! keys. A [`FactRow`] is the stored form: surrogate foreign keys plus the
//! low-cardinality descriptive attributes kept directly on the fact
//! (merchant name, channel, status). Fact rows are immutable once
//! appended; corrections arrive as new facts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use strata_core::SurrogateKey;

/// Transaction channel. Stored on the fact, not normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    /// Card-not-present.
    Online,
    /// Card-present.
    InStore,
}

/// Terminal transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Completed and settled.
    Approved,
    /// Declined at authorization.
    Declined,
    /// Reversed after settlement.
    Reversed,
}

/// One cleaned fact record from the upstream staging layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedFact {
    /// Natural event ID, unique per business event.
    pub transaction_id: String,
    /// Natural key of the customer the event belongs to.
    pub customer_id: String,
    /// Date the event occurred.
    pub event_date: NaiveDate,
    /// Transaction amount in dollars.
    pub amount: f64,
    /// Merchant display name.
    pub merchant_name: String,
    /// Raw merchant category code.
    pub category_code: String,
    /// Transaction channel.
    pub channel: Channel,
    /// Terminal status.
    pub status: TransactionStatus,
    /// When the staging layer ingested the record.
    pub ingested_at: DateTime<Utc>,
}

/// One stored fact row with resolved foreign keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactRow {
    /// Natural event ID.
    pub transaction_id: String,
    /// Surrogate key of the linked customer version.
    pub customer_key: SurrogateKey,
    /// Natural key of the customer, kept for per-entity scans.
    pub customer_id: String,
    /// `YYYYMMDD` key into the calendar dimension.
    pub date_key: i32,
    /// Key into the category dimension.
    pub category_key: i32,
    /// Transaction amount in dollars.
    pub amount: f64,
    /// Degenerate: merchant display name.
    pub merchant_name: String,
    /// Degenerate: transaction channel.
    pub channel: Channel,
    /// Degenerate: terminal status.
    pub status: TransactionStatus,
    /// Date the event occurred; also the partition the row lives in.
    pub event_date: NaiveDate,
    /// Ingestion timestamp the row was selected by.
    pub ingested_at: DateTime<Utc>,
}
