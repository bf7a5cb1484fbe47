use serde::{Deserialize, Serialize};

/// One row of a catalog search page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Marketplace-unique item name (`market_hash_name`).
    pub name: String,
    pub price_text: String,
    pub sell_listings: u32,
    /// Partition the entry was discovered under, if any.
    pub category_hint: Option<String>,
}

/// Aggregate price information for a single item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub lowest_price: Option<String>,
    pub median_price: Option<String>,
    pub volume: Option<String>,
}

impl MarketStats {
    /// Both reference prices are needed for scoring.
    pub fn has_required_fields(&self) -> bool {
        self.lowest_price.is_some() && self.median_price.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Rare,
    Common,
}

impl ItemCategory {
    /// Higher ranks first.
    pub fn priority(self) -> u8 {
        match self {
            Self::Rare => 1,
            Self::Common => 0,
        }
    }
}

impl std::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rare => write!(f, "RARE"),
            Self::Common => write!(f, "COMMON"),
        }
    }
}

/// A catalog entry that passed every admission gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitableItem {
    pub name: String,
    pub current_price: f64,
    pub median_price: f64,
    pub lowest_price: f64,
    pub profit_percent: f64,
    pub volatility: f64,
    pub volume: u64,
    pub sell_listings: u32,
    pub stability_score: f64,
    pub category: ItemCategory,
}

impl ProfitableItem {
    /// Secondary ranking key within a category.
    pub fn rank_score(&self) -> f64 {
        self.profit_percent * self.stability_score
    }
}
