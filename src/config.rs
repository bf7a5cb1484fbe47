use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub steam: SteamConfig,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
    pub scanning: ScanningConfig,
    pub scoring: ScoringConfig,
    pub storage: StorageConfig,
    pub monitoring: MonitoringConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SteamConfig {
    pub base_url: String,
    pub app_id: u32,
    pub currency: u32,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanningConfig {
    pub page_size: usize,
    /// Catalog entries examined per scan, shared by all partitions.
    pub max_items: usize,
    pub min_profit_percent: f64,
    pub page_pause_ms: u64,
    pub search_page_size: usize,
    pub stats_cache_ttl_seconds: u64,
    pub dedupe_by_name: bool,
    pub partitions: Vec<Partition>,
}

impl ScanningConfig {
    pub fn page_pause(&self) -> Duration {
        Duration::from_millis(self.page_pause_ms)
    }

    pub fn stats_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_cache_ttl_seconds)
    }
}

/// A named slice of the catalog, expressed as extra search query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Partition {
    pub name: String,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl Partition {
    /// The unfiltered partition covering the whole catalog.
    pub fn all() -> Self {
        Self {
            name: "all".to_string(),
            filters: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub min_volatility_percent: f64,
    pub rare_markers: Vec<String>,
    pub rare: StabilityTier,
    pub common: StabilityTier,
}

/// Admission floor and stability weighting for one item category.
#[derive(Debug, Clone, Deserialize)]
pub struct StabilityTier {
    pub min_listings: u32,
    pub min_stability: f64,
    pub volume_weight: f64,
    pub listings_weight: f64,
    pub volume_cap: f64,
    pub listings_cap: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub watchlist_path: PathBuf,
    pub database_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub bind: String,
    pub port: u16,
}

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

impl AppConfig {
    /// Load configuration from `config/default.toml`, or the file named by `SKIN_TRACKER_CONFIG`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("SKIN_TRACKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        Self::from_file(&config_path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}
