//! Staged customer records and tracked-attribute change detection.
//!
//! A [`CustomerRecord`] is one cleaned upstream row: one per natural key
//! per batch, carrying an explicit `sequence` ordering key and an
//! `effective_date`. The versioning manager compares only the *tracked*
//! subset ([`TrackedAttributes`]) when deciding whether a record opens a
//! new version; everything else is overwritten in place.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use strata_core::canonical::canonical_digest;

use crate::error::{DimensionError, Result};

/// Card product tier. Tracked: a change opens a new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardType {
    /// Standard card product.
    Standard,
    /// Premium card product.
    Premium,
}

/// Employment status. Pass-through: overwritten without versioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentStatus {
    /// Employed.
    Employed,
    /// Self-employed.
    SelfEmployed,
    /// Retired.
    Retired,
    /// Unemployed.
    Unemployed,
}

/// The tracked attribute subset.
///
/// Change detection compares a canonical digest of exactly these fields,
/// never the full row, so pass-through churn can't trigger spurious
/// versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedAttributes {
    /// Card product tier.
    pub card_type: CardType,
    /// Credit limit in whole dollars.
    pub credit_limit: i64,
}

impl TrackedAttributes {
    /// Returns the canonical SHA-256 digest of the tracked subset.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the attributes cannot be encoded.
    pub fn digest(&self) -> Result<String> {
        canonical_digest(self).map_err(|e| DimensionError::Serialization {
            message: e.to_string(),
        })
    }
}

/// One cleaned customer record from the upstream staging layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    /// Natural key (`CUST` + 8 digits).
    pub customer_id: String,
    /// Explicit batch ordering key (source row sequence).
    pub sequence: u64,
    /// Date the record's attribute state takes effect.
    pub effective_date: NaiveDate,
    /// Date the account was opened; the natural start of version history.
    pub account_open_date: NaiveDate,
    /// Tracked: card product tier.
    pub card_type: CardType,
    /// Tracked: credit limit in whole dollars.
    pub credit_limit: i64,
    /// Pass-through: first name.
    pub first_name: String,
    /// Pass-through: last name.
    pub last_name: String,
    /// Pass-through: email address.
    pub email: String,
    /// Pass-through: age in years.
    pub age: u8,
    /// Pass-through: two-letter state code.
    pub state: String,
    /// Pass-through: employment status.
    pub employment_status: EmploymentStatus,
}

impl CustomerRecord {
    /// Returns the tracked attribute subset of this record.
    #[must_use]
    pub fn tracked(&self) -> TrackedAttributes {
        TrackedAttributes {
            card_type: self.card_type,
            credit_limit: self.credit_limit,
        }
    }

    /// Validates the natural key format: `CUST` followed by 8 digits.
    ///
    /// An empty or malformed key is a validation reject; the record never
    /// reaches version resolution.
    #[must_use]
    pub fn has_valid_key(&self) -> bool {
        is_valid_customer_id(&self.customer_id)
    }
}

/// Returns true if `id` is a well-formed customer natural key.
#[must_use]
pub fn is_valid_customer_id(id: &str) -> bool {
    let Some(digits) = id.strip_prefix("CUST") else {
        return false;
    };
    digits.len() == 8 && digits.bytes().all(|b| b.is_ascii_digit())
}
