//! Market statistics lookup with a short-lived per-name cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use crate::market::models::MarketStats;
use crate::market::MarketSource;

pub struct StatsLookup {
    source: Arc<dyn MarketSource>,
    ttl: Duration,
    cache: Mutex<HashMap<String, (Instant, MarketStats)>>,
}

impl StatsLookup {
    pub fn new(source: Arc<dyn MarketSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch stats for `item_name`, reusing a cached answer younger than the TTL.
    ///
    /// Absent when the upstream failed or lacks a lowest/median price.
    /// Failures are not cached.
    pub async fn get_market_stats(&self, item_name: &str) -> Option<MarketStats> {
        if let Some(stats) = self.cached(item_name).await {
            debug!(item_name, "Using cached market stats");
            return Some(stats);
        }

        let stats = self
            .source
            .market_stats(item_name)
            .await
            .filter(MarketStats::has_required_fields)?;

        let mut cache = self.cache.lock().await;
        let ttl = self.ttl;
        cache.retain(|_, (fetched_at, _)| fetched_at.elapsed() < ttl);
        cache.insert(item_name.to_string(), (Instant::now(), stats.clone()));

        Some(stats)
    }

    async fn cached(&self, item_name: &str) -> Option<MarketStats> {
        let mut cache = self.cache.lock().await;
        match cache.get(item_name) {
            Some((fetched_at, stats)) if fetched_at.elapsed() < self.ttl => Some(stats.clone()),
            Some(_) => {
                cache.remove(item_name);
                None
            }
            None => None,
        }
    }
}
