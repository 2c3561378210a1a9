//! The segmentation decision list.
//!
//! Labels are assigned by a priority-ordered list of `(label, predicate)`
//! pairs evaluated first-match-wins. The order is part of the contract: a
//! high-spending traveler whose spend is also declining is
//! "High-Value Travelers", not "Declining", because that rule sits
//! higher. Thresholds come from [`SegmentationConfig`]; the list itself
//! never hard-codes a number.

use serde::{Deserialize, Serialize};

use crate::activity::CustomerActivity;
use crate::config::SegmentationConfig;

/// The behavioral segment labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentLabel {
    /// High magnitude, travel-concentrated.
    HighValueTravelers,
    /// Severe negative trend from a meaningful baseline.
    Declining,
    /// Short tenure, strong positive trend.
    NewAndGrowing,
    /// Low magnitude, necessities-concentrated.
    BudgetConscious,
    /// Everyone else.
    StableMidSpenders,
}

impl SegmentLabel {
    /// Returns the business-facing display name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::HighValueTravelers => "High-Value Travelers",
            Self::Declining => "Declining",
            Self::NewAndGrowing => "New & Growing",
            Self::BudgetConscious => "Budget-Conscious",
            Self::StableMidSpenders => "Stable Mid-Spenders",
        }
    }
}

/// One rule in the decision list.
pub struct SegmentRule {
    /// Label assigned when the predicate matches.
    pub label: SegmentLabel,
    predicate: Box<dyn Fn(&CustomerActivity) -> bool + Send + Sync>,
}

impl SegmentRule {
    /// Evaluates this rule against an activity.
    #[must_use]
    pub fn matches(&self, activity: &CustomerActivity) -> bool {
        (self.predicate)(activity)
    }
}

impl std::fmt::Debug for SegmentRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentRule")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Builds the priority-ordered decision list from configuration.
///
/// The final rule always matches, so [`assign`] is total.
#[must_use]
pub fn decision_list(config: &SegmentationConfig) -> Vec<SegmentRule> {
    let high_value = config.high_value.clone();
    let declining = config.declining.clone();
    let new_growing = config.new_growing.clone();
    let budget = config.budget.clone();

    vec![
        SegmentRule {
            label: SegmentLabel::HighValueTravelers,
            predicate: Box::new(move |a| {
                a.monthly_avg_spend >= high_value.min_monthly_spend
                    && a.travel_pct >= high_value.min_travel_pct
            }),
        },
        SegmentRule {
            label: SegmentLabel::Declining,
            // Trend rules only see customers with a defined trend; a
            // missing baseline falls through.
            predicate: Box::new(move |a| {
                a.trend_pct
                    .is_some_and(|trend| trend <= declining.max_trend_pct)
                    && a.prior_spend >= declining.min_prior_spend
            }),
        },
        SegmentRule {
            label: SegmentLabel::NewAndGrowing,
            predicate: Box::new(move |a| {
                a.tenure_months <= new_growing.max_tenure_months
                    && a.trend_pct
                        .is_some_and(|trend| trend >= new_growing.min_trend_pct)
            }),
        },
        SegmentRule {
            label: SegmentLabel::BudgetConscious,
            predicate: Box::new(move |a| {
                a.monthly_avg_spend < budget.max_monthly_spend
                    && a.necessities_pct >= budget.min_necessities_pct
            }),
        },
        SegmentRule {
            label: SegmentLabel::StableMidSpenders,
            predicate: Box::new(|_| true),
        },
    ]
}

/// Assigns the first matching label.
///
/// # Panics
///
/// Panics if the rule list has no catch-all; [`decision_list`] always
/// appends one.
#[must_use]
pub fn assign(rules: &[SegmentRule], activity: &CustomerActivity) -> SegmentLabel {
    rules
        .iter()
        .find(|rule| rule.matches(activity))
        .map(|rule| rule.label)
        .expect("decision list must end with a catch-all rule")
}
