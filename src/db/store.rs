use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

use crate::market::models::{ItemCategory, ProfitableItem};
use crate::market::scanner::ScanReport;

/// SQLite log of completed profitability scans.
pub struct Store {
    pool: SqlitePool,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScanRecord {
    pub id: Option<i64>,
    pub scan_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub min_profit_percent: f64,
    pub max_items: i64,
    pub entries_examined: i64,
    pub stats_unavailable: i64,
    pub pages_fetched: i64,
    pub items_found: i64,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScanItemRecord {
    pub id: Option<i64>,
    pub scan_id: String,
    pub rank: i64,
    pub name: String,
    pub category: String,
    pub current_price: f64,
    pub median_price: f64,
    pub lowest_price: f64,
    pub profit_percent: f64,
    pub volatility: f64,
    pub volume: i64,
    pub sell_listings: i64,
    pub stability_score: f64,
}

impl ScanItemRecord {
    pub fn into_item(self) -> ProfitableItem {
        let category = if self.category == "rare" {
            ItemCategory::Rare
        } else {
            ItemCategory::Common
        };
        ProfitableItem {
            name: self.name,
            current_price: self.current_price,
            median_price: self.median_price,
            lowest_price: self.lowest_price,
            profit_percent: self.profit_percent,
            volatility: self.volatility,
            volume: self.volume.max(0) as u64,
            sell_listings: self.sell_listings.clamp(0, u32::MAX as i64) as u32,
            stability_score: self.stability_score,
            category,
        }
    }
}

/// A stored scan together with its ranked items.
#[derive(Debug, Clone, Serialize)]
pub struct StoredScan {
    pub scan: ScanRecord,
    pub items: Vec<ProfitableItem>,
}

fn category_label(category: ItemCategory) -> &'static str {
    match category {
        ItemCategory::Rare => "rare",
        ItemCategory::Common => "common",
    }
}

impl Store {
    pub async fn new(database_path: &str) -> Result<Self> {
        let in_memory = database_path == ":memory:";
        if !in_memory {
            if let Some(parent) = std::path::Path::new(database_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory {}", parent.display())
                    })?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))
            .context("Invalid database path")?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Every connection to `:memory:` is its own database.
        let max_connections = if in_memory { 1 } else { 5 };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let migration_sql = include_str!("../../migrations/001_init.sql");
        // Execute each statement separately (sqlx doesn't support multiple statements in one call)
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to execute migration: {trimmed}"))?;
            }
        }
        Ok(())
    }

    /// Persist a finished scan and its ranked items. Returns the generated scan id.
    pub async fn insert_scan(&self, report: &ScanReport) -> Result<String> {
        let scan_id = uuid::Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            "INSERT INTO scans (scan_id, started_at, finished_at, min_profit_percent, max_items, entries_examined, stats_unavailable, pages_fetched, items_found)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&scan_id)
        .bind(report.started_at.to_rfc3339())
        .bind(report.finished_at.to_rfc3339())
        .bind(report.request.min_profit_percent)
        .bind(report.request.max_items as i64)
        .bind(report.entries_examined as i64)
        .bind(report.stats_unavailable as i64)
        .bind(report.pages_fetched as i64)
        .bind(report.items.len() as i64)
        .execute(&mut *tx)
        .await
        .context("Failed to insert scan")?;

        for (rank, item) in report.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO scan_items (scan_id, rank, name, category, current_price, median_price, lowest_price, profit_percent, volatility, volume, sell_listings, stability_score)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&scan_id)
            .bind(rank as i64)
            .bind(&item.name)
            .bind(category_label(item.category))
            .bind(item.current_price)
            .bind(item.median_price)
            .bind(item.lowest_price)
            .bind(item.profit_percent)
            .bind(item.volatility)
            .bind(item.volume.min(i64::MAX as u64) as i64)
            .bind(item.sell_listings as i64)
            .bind(item.stability_score)
            .execute(&mut *tx)
            .await
            .context("Failed to insert scan item")?;
        }

        tx.commit().await.context("Failed to commit scan")?;
        Ok(scan_id)
    }

    pub async fn get_latest_scan(&self) -> Result<Option<ScanRecord>> {
        let scan = sqlx::query_as::<_, ScanRecord>("SELECT * FROM scans ORDER BY id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch latest scan")?;
        Ok(scan)
    }

    /// Ranked items of one scan, best first.
    pub async fn get_scan_items(&self, scan_id: &str) -> Result<Vec<ScanItemRecord>> {
        let items = sqlx::query_as::<_, ScanItemRecord>(
            "SELECT * FROM scan_items WHERE scan_id = ? ORDER BY rank",
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch scan items")?;
        Ok(items)
    }

    /// Latest scan with its items converted back to domain types.
    pub async fn get_latest_scan_with_items(&self) -> Result<Option<StoredScan>> {
        let Some(scan) = self.get_latest_scan().await? else {
            return Ok(None);
        };
        let items = self
            .get_scan_items(&scan.scan_id)
            .await?
            .into_iter()
            .map(ScanItemRecord::into_item)
            .collect();
        Ok(Some(StoredScan { scan, items }))
    }

    pub async fn get_scan_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scans")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count scans")?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::scanner::ScanRequest;
    use chrono::Utc;

    fn item(name: &str, category: ItemCategory) -> ProfitableItem {
        ProfitableItem {
            name: name.to_string(),
            current_price: 10.0,
            median_price: 12.5,
            lowest_price: 11.0,
            profit_percent: 25.0,
            volatility: 13.6,
            volume: 1500,
            sell_listings: 200,
            stability_score: 100.0,
            category,
        }
    }

    fn report(items: Vec<ProfitableItem>) -> ScanReport {
        ScanReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            request: ScanRequest {
                min_profit_percent: 10.0,
                max_items: 100,
            },
            entries_examined: 42,
            stats_unavailable: 3,
            pages_fetched: 2,
            items,
            history_error: None,
        }
    }

    #[tokio::test]
    async fn test_store_create_and_migrate() {
        let store = Store::new(":memory:").await.expect("should create store");
        assert_eq!(store.get_scan_count().await.unwrap(), 0);
        assert!(store.get_latest_scan().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_insert_and_query() {
        let store = Store::new(":memory:").await.expect("should create store");
        let scan_id = store
            .insert_scan(&report(vec![
                item("★ Bayonet | Fade", ItemCategory::Rare),
                item("AK-47 | Redline", ItemCategory::Common),
            ]))
            .await
            .expect("should insert scan");

        let latest = store
            .get_latest_scan_with_items()
            .await
            .unwrap()
            .expect("latest scan");
        assert_eq!(latest.scan.scan_id, scan_id);
        assert_eq!(latest.scan.entries_examined, 42);
        assert_eq!(latest.scan.items_found, 2);
        assert_eq!(latest.items[0].name, "★ Bayonet | Fade");
        assert_eq!(latest.items[0].category, ItemCategory::Rare);
        assert_eq!(latest.items[1], item("AK-47 | Redline", ItemCategory::Common));
    }

    #[tokio::test]
    async fn test_latest_scan_is_most_recent() {
        let store = Store::new(":memory:").await.unwrap();
        store.insert_scan(&report(Vec::new())).await.unwrap();
        let second = store.insert_scan(&report(Vec::new())).await.unwrap();

        assert_eq!(store.get_scan_count().await.unwrap(), 2);
        assert_eq!(store.get_latest_scan().await.unwrap().unwrap().scan_id, second);
    }
}
