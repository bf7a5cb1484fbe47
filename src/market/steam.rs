//! Steam Community Market client.
//!
//! Wraps the public `priceoverview` and `search/render` endpoints with
//! rate limiting, bounded retries and lenient conversion into domain types.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::{AppConfig, RateLimitConfig, RetryConfig, SteamConfig};
use crate::error::FetchError;
use crate::market::models::{CatalogEntry, MarketStats};
use crate::market::price::parse_count;
use crate::market::retry::RetryPolicy;
use crate::market::{MarketSource, PageRequest};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const PRICE_OVERVIEW_PATH: &str = "/market/priceoverview/";
const SEARCH_PATH: &str = "/market/search/render/";

pub struct SteamClient {
    http: reqwest::Client,
    base_url: String,
    app_id: u32,
    currency: u32,
    retry: RetryPolicy,
    limiter: Arc<Limiter>,
}

impl SteamClient {
    pub fn new(
        steam: &SteamConfig,
        retry: &RetryConfig,
        rate_limit: &RateLimitConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(steam.request_timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: steam.base_url.trim_end_matches('/').to_string(),
            app_id: steam.app_id,
            currency: steam.currency,
            retry: RetryPolicy::from(retry),
            limiter: create_rate_limiter(rate_limit),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(&config.steam, &config.retry, &config.rate_limit)
    }

    /// Public listing page for an item, suitable for linking from a UI.
    pub fn item_page_url(&self, item_name: &str) -> String {
        format!(
            "{}/market/listings/{}/{}",
            self.base_url,
            self.app_id,
            urlencoding::encode(item_name)
        )
    }

    /// GET `endpoint` with `params`, retrying per the configured policy.
    ///
    /// Returns `None` once every attempt has failed.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Option<T> {
        let url = format!("{}{}", self.base_url, endpoint);

        self.retry
            .run(endpoint, || {
                let url = url.as_str();
                async move {
                    self.rate_limit().await;
                    self.get_json::<T>(url, params).await
                }
            })
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> std::result::Result<T, FetchError> {
        let resp = self.http.get(url).query(params).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body: serde_json::Value = resp.json().await?;
        if body.get("success").and_then(serde_json::Value::as_bool) == Some(false) {
            return Err(FetchError::Unsuccessful);
        }

        Ok(serde_json::from_value(body)?)
    }

    async fn rate_limit(&self) {
        self.limiter.until_ready().await;
    }

    fn stats_params(&self, item_name: &str) -> Vec<(String, String)> {
        vec![
            ("appid".to_string(), self.app_id.to_string()),
            ("currency".to_string(), self.currency.to_string()),
            ("market_hash_name".to_string(), item_name.to_string()),
        ]
    }

    fn search_params(&self, request: &PageRequest<'_>) -> Vec<(String, String)> {
        let mut params = vec![
            ("appid".to_string(), self.app_id.to_string()),
            ("norender".to_string(), "1".to_string()),
            ("query".to_string(), request.query.unwrap_or_default().to_string()),
            ("start".to_string(), request.start.to_string()),
            ("count".to_string(), request.count.to_string()),
            ("search_descriptions".to_string(), "0".to_string()),
            ("sort_column".to_string(), "popular".to_string()),
            ("sort_dir".to_string(), "desc".to_string()),
        ];
        params.extend(
            request
                .partition
                .filters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        params
    }
}

#[async_trait]
impl MarketSource for SteamClient {
    #[instrument(skip(self))]
    async fn market_stats(&self, item_name: &str) -> Option<MarketStats> {
        let params = self.stats_params(item_name);
        let response: PriceOverviewResponse = self.fetch(PRICE_OVERVIEW_PATH, &params).await?;

        Some(MarketStats {
            lowest_price: response.lowest_price,
            median_price: response.median_price,
            volume: response.volume,
        })
    }

    #[instrument(skip(self, request), fields(partition = %request.partition.name, start = request.start))]
    async fn catalog_page(&self, request: PageRequest<'_>) -> Option<Vec<CatalogEntry>> {
        let params = self.search_params(&request);
        let response: SearchResponse = self.fetch(SEARCH_PATH, &params).await?;

        let hint = request.partition.name.clone();
        let entries = response
            .results
            .into_iter()
            .filter_map(|row| {
                let converted = serde_json::from_value::<SearchResult>(row)
                    .ok()
                    .and_then(|r| convert_search_result(r, &hint));
                if converted.is_none() {
                    debug!("Skipping malformed search result row");
                }
                converted
            })
            .collect();

        Some(entries)
    }

    fn listing_url(&self, item_name: &str) -> Option<String> {
        Some(self.item_page_url(item_name))
    }

    fn name(&self) -> &str {
        "steam_community_market"
    }
}

// === Helper Functions ===

fn create_rate_limiter(config: &RateLimitConfig) -> Arc<Limiter> {
    let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst_size).unwrap_or(rps);

    let quota = Quota::per_second(rps).allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

/// `priceoverview` payload. Every field may be missing for thinly traded items.
#[derive(Debug, Deserialize)]
struct PriceOverviewResponse {
    lowest_price: Option<String>,
    median_price: Option<String>,
    volume: Option<String>,
}

/// `search/render?norender=1` payload. Rows are decoded one by one so a single
/// malformed row does not discard the whole page.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    name: Option<String>,
    hash_name: Option<String>,
    sell_price_text: Option<String>,
    /// Older and third-party mirrors expose `price` instead of `sell_price_text`.
    price: Option<serde_json::Value>,
    sell_listings: Option<serde_json::Value>,
}

fn convert_search_result(row: SearchResult, partition: &str) -> Option<CatalogEntry> {
    let name = row.hash_name.or(row.name).filter(|n| !n.trim().is_empty())?;

    let price_text = row
        .sell_price_text
        .or_else(|| row.price.as_ref().and_then(json_to_text))
        .unwrap_or_default();

    let sell_listings = row
        .sell_listings
        .as_ref()
        .and_then(json_to_text)
        .map(|s| parse_count(&s).min(u32::MAX as u64) as u32)
        .unwrap_or(0);

    Some(CatalogEntry {
        name,
        price_text,
        sell_listings,
        category_hint: Some(partition.to_string()),
    })
}

fn json_to_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
