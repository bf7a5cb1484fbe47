//! Profitable-item discovery.
//!
//! Walks each configured catalog partition page by page, looks up market
//! stats for every entry, scores it, and ranks whatever survives. Everything
//! runs sequentially on the caller's task; upstream failures only ever cost
//! the affected item or page.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::config::{Partition, ScanningConfig, ScoringConfig};
use crate::market::category::CategoryClassifier;
use crate::market::models::ProfitableItem;
use crate::market::paginator::CatalogPager;
use crate::market::price::parse_price;
use crate::market::stats::StatsLookup;
use crate::market::MarketSource;
use crate::valuation::profit::{score, ScoringPolicy};
use crate::valuation::ranking::rank;

/// Parameters of one scan invocation.
#[derive(Debug, Clone, Copy)]
pub struct ScanRequest {
    pub min_profit_percent: f64,
    /// Catalog entries examined across all partitions.
    pub max_items: usize,
}

/// Ranked output plus bookkeeping about how it was produced.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub request: ScanRequest,
    pub entries_examined: usize,
    pub stats_unavailable: usize,
    pub pages_fetched: usize,
    pub items: Vec<ProfitableItem>,
    /// Set when the scan could not be written to the scan history.
    pub history_error: Option<String>,
}

pub struct ProfitScanner {
    source: Arc<dyn MarketSource>,
    stats: Arc<StatsLookup>,
    classifier: CategoryClassifier,
    scanning: ScanningConfig,
    scoring: ScoringConfig,
}

impl ProfitScanner {
    pub fn new(
        source: Arc<dyn MarketSource>,
        stats: Arc<StatsLookup>,
        scanning: ScanningConfig,
        scoring: ScoringConfig,
    ) -> Self {
        let classifier = CategoryClassifier::from_config(&scoring);
        Self {
            source,
            stats,
            classifier,
            scanning,
            scoring,
        }
    }

    /// Partitions in scan order. Falls back to the whole catalog if none are configured.
    pub fn partitions(&self) -> Vec<Partition> {
        if self.scanning.partitions.is_empty() {
            vec![Partition::all()]
        } else {
            self.scanning.partitions.clone()
        }
    }

    /// Run a full scan and return the ranked result.
    #[instrument(skip(self), fields(source = self.source.name()))]
    pub async fn scan(&self, request: ScanRequest) -> ScanReport {
        let started_at = Utc::now();
        let policy = ScoringPolicy::from_config(&self.scoring, request.min_profit_percent);

        let mut admitted = Vec::new();
        let mut entries_examined = 0usize;
        let mut stats_unavailable = 0usize;
        let mut pages_fetched = 0usize;

        for partition in self.partitions() {
            let remaining = request.max_items.saturating_sub(entries_examined);
            if remaining == 0 {
                info!(partition = %partition.name, "Item budget spent, skipping partition");
                break;
            }

            let mut pager = CatalogPager::new(
                self.source.clone(),
                partition,
                self.scanning.page_size,
                remaining,
                self.scanning.page_pause(),
            );

            let mut partition_admitted = 0usize;
            while let Some(entry) = pager.next_entry().await {
                entries_examined += 1;

                // Unpriced rows cannot pass scoring; skip the upstream lookup.
                if parse_price(&entry.price_text) <= 0.0 {
                    debug!(name = %entry.name, "Item rejected before stats lookup: no_current_price");
                    continue;
                }

                let stats = self.stats.get_market_stats(&entry.name).await;
                if stats.is_none() {
                    stats_unavailable += 1;
                }

                match score(&entry, stats.as_ref(), &policy, &self.classifier) {
                    Ok(item) => {
                        debug!(
                            name = %item.name,
                            profit_percent = item.profit_percent,
                            stability = item.stability_score,
                            category = %item.category,
                            "Item admitted"
                        );
                        partition_admitted += 1;
                        admitted.push(item);
                    }
                    Err(reason) => {
                        debug!(name = %entry.name, %reason, "Item rejected");
                    }
                }
            }

            pages_fetched += pager.pages_fetched();
            info!(
                partition = %pager.partition().name,
                pages = pager.pages_fetched(),
                admitted = partition_admitted,
                "Partition scanned"
            );
        }

        let items = rank(admitted, self.scanning.dedupe_by_name);

        info!(
            entries_examined,
            stats_unavailable,
            ranked = items.len(),
            "Profitability scan complete"
        );

        ScanReport {
            started_at,
            finished_at: Utc::now(),
            request,
            entries_examined,
            stats_unavailable,
            pages_fetched,
            items,
            history_error: None,
        }
    }
}
