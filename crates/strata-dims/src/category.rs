//! The merchant-category dimension.
//!
//! A static, small lookup table grouping raw category codes into business
//! groupings. Bootstrap-only: materialized once, no write path afterwards.
//! The segmentation engine's category-mix percentages are computed over
//! [`CategoryGroup`], not raw codes.

use serde::{Deserialize, Serialize};

/// Business grouping of merchant categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryGroup {
    /// Airlines, hotels, car rental.
    Travel,
    /// Groceries, fuel, utilities, pharmacy.
    Necessities,
    /// Dining, entertainment, streaming.
    Leisure,
    /// Everything else.
    Other,
}

impl CategoryGroup {
    /// Returns the group as a label string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Travel => "travel",
            Self::Necessities => "necessities",
            Self::Leisure => "leisure",
            Self::Other => "other",
        }
    }
}

/// One merchant category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantCategory {
    /// Stable integer key referenced by fact rows.
    pub category_key: i32,
    /// Raw category code as delivered by upstream staging.
    pub category_code: String,
    /// Display name.
    pub category_name: String,
    /// Business grouping.
    pub category_group: CategoryGroup,
}

/// The materialized category dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDimension {
    categories: Vec<MerchantCategory>,
}

impl CategoryDimension {
    /// The standard bootstrap category set.
    #[must_use]
    pub fn standard() -> Self {
        let rows = [
            (1, "airlines", "Airlines", CategoryGroup::Travel),
            (2, "hotels", "Hotels", CategoryGroup::Travel),
            (3, "car_rental", "Car Rental", CategoryGroup::Travel),
            (4, "groceries", "Groceries", CategoryGroup::Necessities),
            (5, "gas", "Gas & Fuel", CategoryGroup::Necessities),
            (6, "utilities", "Utilities", CategoryGroup::Necessities),
            (7, "pharmacy", "Pharmacy", CategoryGroup::Necessities),
            (8, "restaurants", "Restaurants", CategoryGroup::Leisure),
            (9, "entertainment", "Entertainment", CategoryGroup::Leisure),
            (10, "streaming", "Streaming Services", CategoryGroup::Leisure),
            (11, "retail", "Retail", CategoryGroup::Other),
            (12, "online_marketplace", "Online Marketplace", CategoryGroup::Other),
            (13, "healthcare", "Healthcare", CategoryGroup::Other),
        ];

        Self {
            categories: rows
                .into_iter()
                .map(
                    |(category_key, code, name, category_group)| MerchantCategory {
                        category_key,
                        category_code: code.to_string(),
                        category_name: name.to_string(),
                        category_group,
                    },
                )
                .collect(),
        }
    }

    /// Returns all categories.
    #[must_use]
    pub fn categories(&self) -> &[MerchantCategory] {
        &self.categories
    }

    /// Returns the number of categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Returns true if the dimension is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Looks up a category by its raw code.
    #[must_use]
    pub fn by_code(&self, code: &str) -> Option<&MerchantCategory> {
        self.categories.iter().find(|c| c.category_code == code)
    }

    /// Looks up a category by its integer key.
    #[must_use]
    pub fn by_key(&self, category_key: i32) -> Option<&MerchantCategory> {
        self.categories.iter().find(|c| c.category_key == category_key)
    }

    /// Returns the business group for a category key, if known.
    #[must_use]
    pub fn group_of(&self, category_key: i32) -> Option<CategoryGroup> {
        self.by_key(category_key).map(|c| c.category_group)
    }
}

impl Default for CategoryDimension {
    fn default() -> Self {
        Self::standard()
    }
}
