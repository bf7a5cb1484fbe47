//! Profitability scoring for catalog entries.
//!
//! Every step is a hard admission gate: an entry either passes all of them and
//! becomes a `ProfitableItem`, or is rejected with a reason and no partial output.

use crate::config::{ScoringConfig, StabilityTier};
use crate::market::category::CategoryClassifier;
use crate::market::models::{CatalogEntry, ItemCategory, MarketStats, ProfitableItem};
use crate::market::price::{parse_count, parse_price, parse_price_opt};

/// Thresholds applied by [`score`].
#[derive(Debug, Clone)]
pub struct ScoringPolicy {
    pub min_profit_percent: f64,
    pub min_volatility_percent: f64,
    pub rare: StabilityTier,
    pub common: StabilityTier,
}

impl ScoringPolicy {
    pub fn from_config(config: &ScoringConfig, min_profit_percent: f64) -> Self {
        Self {
            min_profit_percent,
            min_volatility_percent: config.min_volatility_percent,
            rare: config.rare.clone(),
            common: config.common.clone(),
        }
    }

    pub fn tier(&self, category: ItemCategory) -> &StabilityTier {
        match category {
            ItemCategory::Rare => &self.rare,
            ItemCategory::Common => &self.common,
        }
    }
}

/// Why an entry was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoCurrentPrice,
    NoMarketStats,
    InvalidReferencePrice,
    TooFewListings,
    ProfitBelowMinimum,
    VolatilityBelowMinimum,
    StabilityBelowFloor,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::NoCurrentPrice => "no_current_price",
            Self::NoMarketStats => "no_market_stats",
            Self::InvalidReferencePrice => "invalid_reference_price",
            Self::TooFewListings => "too_few_listings",
            Self::ProfitBelowMinimum => "profit_below_minimum",
            Self::VolatilityBelowMinimum => "volatility_below_minimum",
            Self::StabilityBelowFloor => "stability_below_floor",
        };
        f.write_str(reason)
    }
}

/// Score a catalog entry against its market stats.
pub fn score(
    entry: &CatalogEntry,
    stats: Option<&MarketStats>,
    policy: &ScoringPolicy,
    classifier: &CategoryClassifier,
) -> Result<ProfitableItem, Rejection> {
    let current_price = parse_price(&entry.price_text);
    if current_price <= 0.0 {
        return Err(Rejection::NoCurrentPrice);
    }

    let stats = stats.ok_or(Rejection::NoMarketStats)?;
    let lowest_price = parse_price_opt(stats.lowest_price.as_deref());
    let median_price = parse_price_opt(stats.median_price.as_deref());
    if lowest_price <= 0.0 || median_price <= 0.0 {
        return Err(Rejection::InvalidReferencePrice);
    }

    let category = classifier.classify(&entry.name);
    let tier = policy.tier(category);
    if entry.sell_listings < tier.min_listings {
        return Err(Rejection::TooFewListings);
    }

    let profit_percent = profit_percent(current_price, median_price)
        .ok_or(Rejection::NoCurrentPrice)?;
    let volatility = volatility(median_price, lowest_price)
        .ok_or(Rejection::InvalidReferencePrice)?;

    let volume = stats.volume.as_deref().map(parse_count).unwrap_or(0);
    let stability_score = stability_score(volume, entry.sell_listings, tier);

    if profit_percent < policy.min_profit_percent {
        return Err(Rejection::ProfitBelowMinimum);
    }
    if volatility < policy.min_volatility_percent {
        return Err(Rejection::VolatilityBelowMinimum);
    }
    if stability_score < tier.min_stability {
        return Err(Rejection::StabilityBelowFloor);
    }

    Ok(ProfitableItem {
        name: entry.name.clone(),
        current_price,
        median_price,
        lowest_price,
        profit_percent,
        volatility,
        volume,
        sell_listings: entry.sell_listings,
        stability_score,
        category,
    })
}

/// `(median - current) / current * 100`, undefined for a non-positive current price.
pub fn profit_percent(current_price: f64, median_price: f64) -> Option<f64> {
    (current_price > 0.0).then(|| (median_price - current_price) / current_price * 100.0)
}

/// `(median - lowest) / lowest * 100`, undefined for a non-positive lowest price.
pub fn volatility(median_price: f64, lowest_price: f64) -> Option<f64> {
    (lowest_price > 0.0).then(|| (median_price - lowest_price) / lowest_price * 100.0)
}

/// Liquidity heuristic in `[0, 100]`.
///
/// Volume and listing count are each saturated at the tier's cap, then blended
/// by the tier's weights.
pub fn stability_score(volume: u64, sell_listings: u32, tier: &StabilityTier) -> f64 {
    let total_weight = tier.volume_weight + tier.listings_weight;
    if total_weight <= 0.0 {
        return 0.0;
    }

    let volume_part = saturate(volume as f64, tier.volume_cap);
    let listings_part = saturate(sell_listings as f64, tier.listings_cap);

    100.0 * (tier.volume_weight * volume_part + tier.listings_weight * listings_part) / total_weight
}

fn saturate(value: f64, cap: f64) -> f64 {
    if cap <= 0.0 {
        1.0
    } else {
        (value / cap).min(1.0)
    }
}
