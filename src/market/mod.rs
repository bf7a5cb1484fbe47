pub mod category;
pub mod models;
pub mod paginator;
pub mod price;
pub mod retry;
pub mod scanner;
pub mod stats;
pub mod steam;

use async_trait::async_trait;

use crate::config::Partition;
use crate::market::models::{CatalogEntry, MarketStats};

/// One bounded page request against the catalog.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub partition: &'a Partition,
    pub query: Option<&'a str>,
    pub start: usize,
    pub count: usize,
}

/// Remote marketplace operations consumed by the core.
///
/// Implementations absorb transport failures: `None` means the upstream
/// could not produce a usable answer after retries.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Current aggregate price statistics for one item, as reported. Fields may be missing.
    async fn market_stats(&self, item_name: &str) -> Option<MarketStats>;

    /// One page of catalog search results.
    async fn catalog_page(&self, request: PageRequest<'_>) -> Option<Vec<CatalogEntry>>;

    /// Public web page for an item, when the source has one.
    fn listing_url(&self, _item_name: &str) -> Option<String> {
        None
    }

    /// Human-readable name of this source.
    fn name(&self) -> &str;
}
