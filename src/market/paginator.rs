//! Lazy, budgeted pagination over one catalog partition.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::Partition;
use crate::market::models::CatalogEntry;
use crate::market::{MarketSource, PageRequest};

/// Cursor over one partition of the catalog.
///
/// Starts at offset 0, advances by exactly `page_size` per request, and stops for good
/// after the first short, empty or failed page or once `budget` entries have been yielded.
/// Entries of a short page are still yielded.
/// Dropping the pager between calls abandons the scan; it holds no other resources.
pub struct CatalogPager {
    source: Arc<dyn MarketSource>,
    partition: Partition,
    page_size: usize,
    budget: usize,
    page_pause: Duration,
    offset: usize,
    yielded: usize,
    pages_fetched: usize,
    buffer: VecDeque<CatalogEntry>,
    exhausted: bool,
}

impl CatalogPager {
    pub fn new(
        source: Arc<dyn MarketSource>,
        partition: Partition,
        page_size: usize,
        budget: usize,
        page_pause: Duration,
    ) -> Self {
        Self {
            source,
            partition,
            page_size: page_size.max(1),
            budget,
            page_pause,
            offset: 0,
            yielded: 0,
            pages_fetched: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Next catalog entry, fetching another page when the current one is drained.
    pub async fn next_entry(&mut self) -> Option<CatalogEntry> {
        if self.yielded >= self.budget {
            return None;
        }

        if self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            self.fetch_page().await;
        }

        let entry = self.buffer.pop_front()?;
        self.yielded += 1;
        Some(entry)
    }

    /// Number of page requests issued so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    async fn fetch_page(&mut self) {
        if self.pages_fetched > 0 && !self.page_pause.is_zero() {
            tokio::time::sleep(self.page_pause).await;
        }

        let remaining = self.budget - self.yielded;
        let request = PageRequest {
            partition: &self.partition,
            query: None,
            start: self.offset,
            count: self.page_size,
        };

        let page = self.source.catalog_page(request).await;
        self.pages_fetched += 1;
        self.offset += self.page_size;

        match page {
            Some(entries) if !entries.is_empty() => {
                let returned = entries.len();
                debug!(
                    partition = %self.partition.name,
                    start = request.start,
                    returned,
                    "Catalog page fetched"
                );
                if returned < self.page_size {
                    info!(partition = %self.partition.name, start = request.start, returned, "Short catalog page, partition finished");
                    self.exhausted = true;
                }
                self.buffer.extend(entries.into_iter().take(remaining));
            }
            Some(_) => {
                info!(partition = %self.partition.name, start = request.start, "Empty catalog page, partition finished");
                self.exhausted = true;
            }
            None => {
                info!(partition = %self.partition.name, start = request.start, "Catalog page unavailable, partition finished");
                self.exhausted = true;
            }
        }
    }
}
