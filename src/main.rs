use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use skin_tracker::config::AppConfig;
use skin_tracker::market::scanner::ScanRequest;
use skin_tracker::monitoring::dashboard::{bind_dashboard, spawn_dashboard, DashboardState};
use skin_tracker::monitoring::logger;
use skin_tracker::tracker::{PriceRange, Tracker};

#[derive(Debug, Parser)]
#[command(name = "skin-tracker", about = "Steam market price tracker and profitable item scanner")]
struct Cli {
    /// Path to a TOML config file (defaults to config/default.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search the catalog by name.
    Search { query: String },
    /// Start watching an item at the given price.
    Watch {
        name: String,
        #[arg(value_parser = parse_price_arg)]
        price: f64,
    },
    /// Stop watching an item.
    Unwatch { name: String },
    /// Append the current price of one watched item, or of all of them.
    Refresh { name: Option<String> },
    /// Show watched items, optionally filtered by latest price.
    List {
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        /// Price items at their current lowest listing instead of the last recorded price.
        #[arg(long)]
        live: bool,
    },
    /// Scan the catalog for items priced well below their median.
    Scan {
        #[arg(long)]
        min_profit: Option<f64>,
        /// Catalog entries examined across all partitions.
        #[arg(long)]
        max_items: Option<usize>,
    },
    /// Show the most recent recorded scan.
    Latest,
    /// Serve the JSON API until interrupted.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            dotenvy::dotenv().ok();
            AppConfig::from_file(path)?
        }
        None => AppConfig::load()?,
    };

    logger::init_logging(&config.monitoring)?;

    tracing::info!(command = ?cli.command, "skin-tracker starting");

    let tracker = Arc::new(Tracker::from_config(&config).await?);
    let default_scan = ScanRequest {
        min_profit_percent: config.scanning.min_profit_percent,
        max_items: config.scanning.max_items,
    };

    match cli.command {
        Command::Search { query } => print_json(&tracker.search(&query).await),
        Command::Watch { name, price } => {
            let added = tracker.watch(&name, price).await?;
            print_json(&serde_json::json!({ "name": name, "added": added }))
        }
        Command::Unwatch { name } => {
            let removed = tracker.unwatch(&name).await?;
            print_json(&serde_json::json!({ "name": name, "removed": removed }))
        }
        Command::Refresh { name: Some(name) } => {
            let price = tracker.refresh_price(&name).await?;
            print_json(&serde_json::json!({ "name": name, "price": price }))
        }
        Command::Refresh { name: None } => {
            let refreshed = tracker.refresh_all().await?;
            print_json(&serde_json::json!({ "refreshed": refreshed }))
        }
        Command::List {
            min_price,
            max_price,
            live,
        } => {
            let range = PriceRange {
                min_price,
                max_price,
            };
            if live {
                print_json(&tracker.watched_overview_live(range).await)
            } else {
                print_json(&tracker.watched_overview(range).await)
            }
        }
        Command::Scan {
            min_profit,
            max_items,
        } => {
            let report = tracker
                .scan(ScanRequest {
                    min_profit_percent: min_profit.unwrap_or(default_scan.min_profit_percent),
                    max_items: max_items.unwrap_or(default_scan.max_items),
                })
                .await;
            print_json(&report.items)
        }
        Command::Latest => print_json(&tracker.latest_scan().await?),
        Command::Serve => serve(tracker, default_scan, &config).await,
    }
}

async fn serve(tracker: Arc<Tracker>, default_scan: ScanRequest, config: &AppConfig) -> Result<()> {
    let listener = bind_dashboard(&config.api.bind, config.api.port).await?;
    let handle = spawn_dashboard(DashboardState::new(tracker, default_scan), listener);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down");
    handle.abort();
    Ok(())
}

fn parse_price_arg(text: &str) -> std::result::Result<f64, String> {
    match text.parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
        Ok(_) => Err("price must be a finite, non-negative number".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render output")?
    );
    Ok(())
}
