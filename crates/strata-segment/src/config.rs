//! Segmentation thresholds.
//!
//! Every rule threshold is configuration so the business can retune
//! without touching the engine. [`SegmentationConfig::default`] carries
//! the production values.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentationError};

/// Thresholds for the high-value, travel-concentrated rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HighValueThresholds {
    /// Minimum average monthly spend.
    pub min_monthly_spend: f64,
    /// Minimum share of trailing spend in the travel group, in percent.
    pub min_travel_pct: f64,
}

impl Default for HighValueThresholds {
    fn default() -> Self {
        Self {
            min_monthly_spend: 5_000.0,
            min_travel_pct: 25.0,
        }
    }
}

/// Thresholds for the severe-decline rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecliningThresholds {
    /// Maximum (most positive) trend percentage that still counts as a
    /// severe decline.
    pub max_trend_pct: f64,
    /// Minimum prior-window spend for the baseline to be meaningful.
    pub min_prior_spend: f64,
}

impl Default for DecliningThresholds {
    fn default() -> Self {
        Self {
            max_trend_pct: -30.0,
            min_prior_spend: 2_000.0,
        }
    }
}

/// Thresholds for the short-tenure, strong-growth rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewGrowingThresholds {
    /// Maximum tenure in whole months.
    pub max_tenure_months: i64,
    /// Minimum trend percentage.
    pub min_trend_pct: f64,
}

impl Default for NewGrowingThresholds {
    fn default() -> Self {
        Self {
            max_tenure_months: 6,
            min_trend_pct: 50.0,
        }
    }
}

/// Thresholds for the low-magnitude, necessity-concentrated rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BudgetThresholds {
    /// Maximum (exclusive) average monthly spend.
    pub max_monthly_spend: f64,
    /// Minimum share of trailing spend in the necessities group, in
    /// percent.
    pub min_necessities_pct: f64,
}

impl Default for BudgetThresholds {
    fn default() -> Self {
        Self {
            max_monthly_spend: 1_500.0,
            min_necessities_pct: 60.0,
        }
    }
}

/// The full segmentation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentationConfig {
    /// Rolling window length in days.
    pub window_days: i64,
    /// High-value rule thresholds.
    pub high_value: HighValueThresholds,
    /// Declining rule thresholds.
    pub declining: DecliningThresholds,
    /// New-and-growing rule thresholds.
    pub new_growing: NewGrowingThresholds,
    /// Budget-conscious rule thresholds.
    pub budget: BudgetThresholds,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            high_value: HighValueThresholds::default(),
            declining: DecliningThresholds::default(),
            new_growing: NewGrowingThresholds::default(),
            budget: BudgetThresholds::default(),
        }
    }
}

impl SegmentationConfig {
    /// Parses a configuration from JSON, falling back to defaults for
    /// omitted fields.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or an invalid window length.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let config: Self =
            serde_json::from_slice(data).map_err(|e| SegmentationError::Serialization {
                message: format!("parse segmentation config: {e}"),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the window length is not positive.
    pub fn validate(&self) -> Result<()> {
        if self.window_days <= 0 {
            return Err(SegmentationError::InvalidConfig {
                message: format!("window_days must be positive, got {}", self.window_days),
            });
        }
        Ok(())
    }
}
