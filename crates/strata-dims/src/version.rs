//! The customer version table.
//!
//! One [`CustomerVersion`] row per version of a customer; the whole table
//! is a [`CustomerDimension`] snapshot document. The `is_current` flag is
//! an index over `valid_to == None`, rebuilt after every mutation and
//! verified by [`CustomerDimension::check_invariants`] - never
//! hand-maintained in more than one place.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use strata_core::SurrogateKey;

use crate::error::{DimensionError, Result};
use crate::record::{CardType, CustomerRecord, EmploymentStatus, TrackedAttributes};

/// One version of one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerVersion {
    /// Surrogate key, unique per version.
    pub customer_key: SurrogateKey,
    /// Natural key, shared by all versions of the customer.
    pub customer_id: String,
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
    /// Date the account was opened.
    pub account_open_date: NaiveDate,
    /// First day this version was in effect.
    pub valid_from: NaiveDate,
    /// Last day this version was in effect; `None` for the open version.
    pub valid_to: Option<NaiveDate>,
    /// Index over `valid_to == None`; exactly one per customer.
    pub is_current: bool,
}

impl CustomerVersion {
    /// Builds the initial version for a first-sighted customer.
    #[must_use]
    pub fn bootstrap(record: &CustomerRecord) -> Self {
        Self {
            customer_key: SurrogateKey::generate(),
            customer_id: record.customer_id.clone(),
            card_type: record.card_type,
            credit_limit: record.credit_limit,
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            email: record.email.clone(),
            age: record.age,
            state: record.state.clone(),
            employment_status: record.employment_status,
            account_open_date: record.account_open_date,
            valid_from: record.account_open_date,
            valid_to: None,
            is_current: true,
        }
    }

    /// Returns the tracked attribute subset of this version.
    #[must_use]
    pub fn tracked(&self) -> TrackedAttributes {
        TrackedAttributes {
            card_type: self.card_type,
            credit_limit: self.credit_limit,
        }
    }

    /// Overwrites the pass-through attributes from a record, leaving
    /// version boundaries and tracked attributes untouched.
    pub fn overwrite_passthrough(&mut self, record: &CustomerRecord) {
        self.first_name.clone_from(&record.first_name);
        self.last_name.clone_from(&record.last_name);
        self.email.clone_from(&record.email);
        self.age = record.age;
        self.state.clone_from(&record.state);
        self.employment_status = record.employment_status;
    }

    /// Returns true if `date` falls inside this version's validity interval.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.valid_from && self.valid_to.is_none_or(|end| date <= end)
    }
}

/// The full customer version table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDimension {
    /// All versions, historical and current.
    versions: Vec<CustomerVersion>,
}

impl CustomerDimension {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Returns the number of version rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Returns all version rows.
    #[must_use]
    pub fn versions(&self) -> &[CustomerVersion] {
        &self.versions
    }

    /// Returns the number of distinct customers.
    #[must_use]
    pub fn customer_count(&self) -> usize {
        self.versions
            .iter()
            .map(|v| v.customer_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Returns the current version for a customer, if any.
    #[must_use]
    pub fn current_of(&self, customer_id: &str) -> Option<&CustomerVersion> {
        self.versions
            .iter()
            .find(|v| v.customer_id == customer_id && v.valid_to.is_none())
    }

    /// Returns the version whose validity interval contains `date`.
    #[must_use]
    pub fn version_at(&self, customer_id: &str, date: NaiveDate) -> Option<&CustomerVersion> {
        self.versions
            .iter()
            .find(|v| v.customer_id == customer_id && v.contains(date))
    }

    /// Returns a customer's versions ordered by `valid_from`.
    #[must_use]
    pub fn history(&self, customer_id: &str) -> Vec<&CustomerVersion> {
        let mut rows: Vec<&CustomerVersion> = self
            .versions
            .iter()
            .filter(|v| v.customer_id == customer_id)
            .collect();
        rows.sort_by_key(|v| v.valid_from);
        rows
    }

    /// Inserts a version row.
    pub fn push(&mut self, version: CustomerVersion) {
        self.versions.push(version);
        self.rebuild_current_index();
    }

    /// Mutable access to the current version for a customer.
    pub fn current_of_mut(&mut self, customer_id: &str) -> Option<&mut CustomerVersion> {
        self.versions
            .iter_mut()
            .find(|v| v.customer_id == customer_id && v.valid_to.is_none())
    }

    /// Closes the current version of a customer at `last_day`.
    ///
    /// Returns true if a version was closed.
    pub fn close_current(&mut self, customer_id: &str, last_day: NaiveDate) -> bool {
        let closed = match self.current_of_mut(customer_id) {
            Some(version) => {
                version.valid_to = Some(last_day);
                true
            }
            None => false,
        };
        if closed {
            self.rebuild_current_index();
        }
        closed
    }

    /// Removes every version of a customer. Used only by full refresh to
    /// collapse duplicate input rows onto the latest by sequence.
    pub fn remove_customer(&mut self, customer_id: &str) {
        self.versions.retain(|v| v.customer_id != customer_id);
    }

    /// Rebuilds the `is_current` index from `valid_to`.
    pub fn rebuild_current_index(&mut self) {
        for version in &mut self.versions {
            version.is_current = version.valid_to.is_none();
        }
    }

    /// Verifies the SCD2 invariants over the whole table:
    ///
    /// - surrogate keys are globally unique
    /// - per customer, exactly one open version (`valid_to == None`), and
    ///   its `is_current` flag is set
    /// - closed intervals are well-formed (`valid_from <= valid_to`)
    /// - ordered by `valid_from`, intervals partition time: each
    ///   successor starts the day after its predecessor ends - no gaps,
    ///   no overlaps
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError::CorruptChain`] naming the first customer
    /// whose chain violates an invariant.
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen_keys = HashSet::new();
        for version in &self.versions {
            if !seen_keys.insert(version.customer_key) {
                return Err(DimensionError::CorruptChain {
                    customer_id: version.customer_id.clone(),
                    message: format!("duplicate surrogate key {}", version.customer_key),
                });
            }
        }

        let mut by_customer: BTreeMap<&str, Vec<&CustomerVersion>> = BTreeMap::new();
        for version in &self.versions {
            by_customer
                .entry(version.customer_id.as_str())
                .or_default()
                .push(version);
        }

        for (customer_id, mut chain) in by_customer {
            chain.sort_by_key(|v| v.valid_from);

            let open_count = chain.iter().filter(|v| v.valid_to.is_none()).count();
            if open_count != 1 {
                return Err(DimensionError::CorruptChain {
                    customer_id: customer_id.to_string(),
                    message: format!("{open_count} open versions, expected exactly 1"),
                });
            }

            for version in &chain {
                if version.is_current != version.valid_to.is_none() {
                    return Err(DimensionError::CorruptChain {
                        customer_id: customer_id.to_string(),
                        message: "is_current flag out of sync with valid_to".to_string(),
                    });
                }
                if let Some(end) = version.valid_to {
                    if end < version.valid_from {
                        return Err(DimensionError::CorruptChain {
                            customer_id: customer_id.to_string(),
                            message: format!(
                                "inverted interval [{}, {end}]",
                                version.valid_from
                            ),
                        });
                    }
                }
            }

            for pair in chain.windows(2) {
                let (prev, next) = (pair[0], pair[1]);
                let Some(prev_end) = prev.valid_to else {
                    return Err(DimensionError::CorruptChain {
                        customer_id: customer_id.to_string(),
                        message: "open version is not the last in the chain".to_string(),
                    });
                };
                let expected = prev_end.succ_opt();
                if expected != Some(next.valid_from) {
                    return Err(DimensionError::CorruptChain {
                        customer_id: customer_id.to_string(),
                        message: format!(
                            "interval break between {prev_end} and {}",
                            next.valid_from
                        ),
                    });
                }
            }
        }

        Ok(())
    }
}
