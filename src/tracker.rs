//! The operations a presentation layer calls into.
//!
//! `Tracker` owns the market source, the stats cache, the scanner and the
//! watch list. The watch list sits behind an async mutex so each
//! read-modify-persist cycle is serialized; network calls never hold that lock.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::config::{AppConfig, Partition, ScanningConfig};
use crate::db::store::{Store, StoredScan};
use crate::db::watchlist::{WatchStore, WatchedItem};
use crate::error::TrackerError;
use crate::market::models::{CatalogEntry, ProfitableItem};
use crate::market::price::parse_price_opt;
use crate::market::scanner::{ProfitScanner, ScanReport, ScanRequest};
use crate::market::stats::StatsLookup;
use crate::market::steam::SteamClient;
use crate::market::{MarketSource, PageRequest};

/// Optional bounds on a watched item's latest price.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceRange {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl PriceRange {
    pub fn contains(&self, price: f64) -> bool {
        self.min_price.map_or(true, |min| price >= min)
            && self.max_price.map_or(true, |max| price <= max)
    }
}

/// A watched item with the figures a watch-list view displays.
#[derive(Debug, Clone, Serialize)]
pub struct WatchedOverview {
    #[serde(flatten)]
    pub item: WatchedItem,
    pub latest_price: f64,
    pub change_percent: Option<f64>,
    pub listing_url: Option<String>,
}

pub struct Tracker {
    source: Arc<dyn MarketSource>,
    scanner: ProfitScanner,
    watchlist: Mutex<WatchStore>,
    history: Option<Store>,
    scanning: ScanningConfig,
}

impl Tracker {
    pub fn new(
        source: Arc<dyn MarketSource>,
        watchlist: WatchStore,
        history: Option<Store>,
        config: &AppConfig,
    ) -> Self {
        let stats = Arc::new(StatsLookup::new(
            source.clone(),
            config.scanning.stats_cache_ttl(),
        ));
        let scanner = ProfitScanner::new(
            source.clone(),
            stats,
            config.scanning.clone(),
            config.scoring.clone(),
        );

        Self {
            source,
            scanner,
            watchlist: Mutex::new(watchlist),
            history,
            scanning: config.scanning.clone(),
        }
    }

    /// Build a tracker against the live Steam market with on-disk storage.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let source: Arc<dyn MarketSource> = Arc::new(SteamClient::from_config(config)?);
        let watchlist = WatchStore::load(&config.storage.watchlist_path);
        let history = Store::new(&config.storage.database_path).await?;
        Ok(Self::new(source, watchlist, Some(history), config))
    }

    /// One page of catalog results matching `query`. Empty when the upstream fails.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Vec<CatalogEntry> {
        let partition = Partition::all();
        let request = PageRequest {
            partition: &partition,
            query: Some(query),
            start: 0,
            count: self.scanning.search_page_size,
        };

        let results = self.source.catalog_page(request).await.unwrap_or_default();
        info!(results = results.len(), "Catalog search complete");
        results
    }

    /// Start watching `name`. Returns `false` if it was already watched.
    pub async fn watch(&self, name: &str, initial_price: f64) -> Result<bool, TrackerError> {
        let added = self.watchlist.lock().await.add(name, initial_price)?;
        if added {
            info!(name, initial_price, "Item watched");
        }
        Ok(added)
    }

    /// Stop watching `name`. Unknown names are a no-op.
    pub async fn unwatch(&self, name: &str) -> Result<bool, TrackerError> {
        let removed = self.watchlist.lock().await.remove(name)?;
        if removed {
            info!(name, "Item unwatched");
        }
        Ok(removed)
    }

    /// Fetch the current lowest price of a watched item and append it to its history.
    ///
    /// Returns the recorded price, or `None` if the item is not watched or no
    /// valid price could be obtained.
    #[instrument(skip(self))]
    pub async fn refresh_price(&self, name: &str) -> Result<Option<f64>, TrackerError> {
        if !self.watchlist.lock().await.contains(name) {
            return Ok(None);
        }

        let Some(stats) = self.source.market_stats(name).await else {
            warn!(name, "No market data for watched item");
            return Ok(None);
        };

        let price = parse_price_opt(stats.lowest_price.as_deref());
        if price <= 0.0 {
            warn!(name, "Watched item has no valid lowest price");
            return Ok(None);
        }

        let appended = self.watchlist.lock().await.append_price(name, price)?;
        Ok(appended.then_some(price))
    }

    /// Refresh every watched item. Returns how many received a new price.
    pub async fn refresh_all(&self) -> Result<usize, TrackerError> {
        let mut refreshed = 0;
        for name in self.list_watched().await {
            if self.refresh_price(&name).await?.is_some() {
                refreshed += 1;
            }
        }
        info!(refreshed, "Watched prices refreshed");
        Ok(refreshed)
    }

    /// Watched names, oldest first.
    pub async fn list_watched(&self) -> Vec<String> {
        self.watchlist.lock().await.names()
    }

    pub async fn watched_item(&self, name: &str) -> Option<WatchedItem> {
        self.watchlist.lock().await.get(name)
    }

    /// Watched items whose latest recorded price falls inside `range`.
    pub async fn watched_overview(&self, range: PriceRange) -> Vec<WatchedOverview> {
        let items = self.watchlist.lock().await.items();
        items
            .into_iter()
            .filter(|item| range.contains(item.latest_price()))
            .map(|item| {
                let latest_price = item.latest_price();
                self.overview(item, latest_price)
            })
            .collect()
    }

    /// Like [`Tracker::watched_overview`], but priced at the current lowest listing.
    ///
    /// Items whose live price cannot be fetched are left out. Nothing is appended
    /// to the price history.
    #[instrument(skip(self))]
    pub async fn watched_overview_live(&self, range: PriceRange) -> Vec<WatchedOverview> {
        let items = self.watchlist.lock().await.items();

        let mut overview = Vec::with_capacity(items.len());
        for item in items {
            let price = match self.source.market_stats(&item.name).await {
                Some(stats) => parse_price_opt(stats.lowest_price.as_deref()),
                None => 0.0,
            };
            if price <= 0.0 {
                warn!(name = %item.name, "No live price for watched item, skipping");
                continue;
            }
            if range.contains(price) {
                overview.push(self.overview(item, price));
            }
        }
        overview
    }

    fn overview(&self, item: WatchedItem, latest_price: f64) -> WatchedOverview {
        let change_percent = (item.initial_price > 0.0)
            .then(|| (latest_price - item.initial_price) / item.initial_price * 100.0);
        WatchedOverview {
            latest_price,
            change_percent,
            listing_url: self.source.listing_url(&item.name),
            item,
        }
    }

    /// Scan the catalog and return profitable items, best first.
    pub async fn scan_profitable(
        &self,
        min_profit_percent: f64,
        max_items: usize,
    ) -> Vec<ProfitableItem> {
        self.scan(ScanRequest {
            min_profit_percent,
            max_items,
        })
        .await
        .items
    }

    /// Run a scan and record it in the scan history, if one is configured.
    ///
    /// A history write failure is reported in `history_error`; the results are kept.
    pub async fn scan(&self, request: ScanRequest) -> ScanReport {
        let mut report = self.scanner.scan(request).await;

        if let Some(history) = &self.history {
            match history.insert_scan(&report).await {
                Ok(scan_id) => info!(scan_id = %scan_id, "Scan recorded"),
                Err(e) => {
                    let message = format!("{e:#}");
                    warn!(error = %message, "Failed to record scan history");
                    report.history_error = Some(message);
                }
            }
        }

        report
    }

    /// Most recent recorded scan, if any.
    pub async fn latest_scan(&self) -> Result<Option<StoredScan>, TrackerError> {
        match &self.history {
            Some(history) => history
                .get_latest_scan_with_items()
                .await
                .map_err(TrackerError::History),
            None => Ok(None),
        }
    }
}
