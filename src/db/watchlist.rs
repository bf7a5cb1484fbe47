//! Persistent watch list.
//!
//! A JSON document mapping item name to its record. Every mutation rewrites the
//! whole document through a temporary file and an atomic rename, so readers
//! never see a half-written file. Loading never fails: a missing or corrupt
//! file yields an empty list, and unreadable records are skipped.
//!
//! Layout (version 2):
//! `{"version": 2, "items": {name: {"added_date", "initial_price", "price_history": [[ts, price], ...]}}}`
//!
//! Version 1 files are the bare `items` mapping, possibly with naive local
//! timestamps; they are read as UTC and rewritten as version 2 on the next mutation.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StoreError;

const CURRENT_VERSION: u32 = 2;

/// One observed price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(DateTime<Utc>, f64)", into = "(DateTime<Utc>, f64)")]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl From<(DateTime<Utc>, f64)> for PricePoint {
    fn from((timestamp, price): (DateTime<Utc>, f64)) -> Self {
        Self { timestamp, price }
    }
}

impl From<PricePoint> for (DateTime<Utc>, f64) {
    fn from(point: PricePoint) -> Self {
        (point.timestamp, point.price)
    }
}

/// Stored value for one watched name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchRecord {
    pub added_date: DateTime<Utc>,
    pub initial_price: f64,
    pub price_history: Vec<PricePoint>,
}

/// A watched item together with its name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchedItem {
    pub name: String,
    pub added_date: DateTime<Utc>,
    pub initial_price: f64,
    pub price_history: Vec<PricePoint>,
}

impl WatchedItem {
    fn from_record(name: &str, record: &WatchRecord) -> Self {
        Self {
            name: name.to_string(),
            added_date: record.added_date,
            initial_price: record.initial_price,
            price_history: record.price_history.clone(),
        }
    }

    /// Most recently appended price, falling back to the initial price.
    pub fn latest_price(&self) -> f64 {
        self.price_history
            .last()
            .map(|p| p.price)
            .unwrap_or(self.initial_price)
    }

    /// Change of the latest price relative to the initial price, in percent.
    pub fn change_percent(&self) -> Option<f64> {
        (self.initial_price > 0.0)
            .then(|| (self.latest_price() - self.initial_price) / self.initial_price * 100.0)
    }
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    items: &'a BTreeMap<String, WatchRecord>,
}

pub struct WatchStore {
    path: PathBuf,
    items: BTreeMap<String, WatchRecord>,
}

impl WatchStore {
    /// Open the store at `path`, starting empty if the file is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let items = match std::fs::read_to_string(&path) {
            Ok(contents) => parse_document(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Watch list is corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Watch list unreadable, starting empty");
                BTreeMap::new()
            }
        };

        info!(path = %path.display(), items = items.len(), "Watch list loaded");
        Self { path, items }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<WatchedItem> {
        self.items
            .get(name)
            .map(|record| WatchedItem::from_record(name, record))
    }

    /// Watched names, oldest watch first.
    pub fn names(&self) -> Vec<String> {
        self.items().into_iter().map(|item| item.name).collect()
    }

    /// All watched items, oldest watch first.
    pub fn items(&self) -> Vec<WatchedItem> {
        let mut items: Vec<WatchedItem> = self
            .items
            .iter()
            .map(|(name, record)| WatchedItem::from_record(name, record))
            .collect();
        items.sort_by(|a, b| a.added_date.cmp(&b.added_date).then_with(|| a.name.cmp(&b.name)));
        items
    }

    /// Start watching `name`. Returns `false` without writing if it is already watched.
    pub fn add(&mut self, name: &str, initial_price: f64) -> Result<bool, StoreError> {
        self.add_at(name, initial_price, Utc::now())
    }

    pub fn add_at(
        &mut self,
        name: &str,
        initial_price: f64,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        check_price(initial_price)?;
        if self.items.contains_key(name) {
            return Ok(false);
        }

        self.items.insert(
            name.to_string(),
            WatchRecord {
                added_date: at,
                initial_price,
                price_history: vec![PricePoint {
                    timestamp: at,
                    price: initial_price,
                }],
            },
        );

        if let Err(e) = self.persist() {
            self.items.remove(name);
            return Err(e);
        }
        Ok(true)
    }

    /// Stop watching `name`. Unknown names are a no-op with no write.
    pub fn remove(&mut self, name: &str) -> Result<bool, StoreError> {
        let Some(record) = self.items.remove(name) else {
            return Ok(false);
        };

        if let Err(e) = self.persist() {
            self.items.insert(name.to_string(), record);
            return Err(e);
        }
        Ok(true)
    }

    /// Append a price observation. Unknown names are a no-op with no write.
    pub fn append_price(&mut self, name: &str, price: f64) -> Result<bool, StoreError> {
        self.append_price_at(name, price, Utc::now())
    }

    pub fn append_price_at(
        &mut self,
        name: &str,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        check_price(price)?;
        let Some(record) = self.items.get_mut(name) else {
            return Ok(false);
        };
        record.price_history.push(PricePoint {
            timestamp: at,
            price,
        });

        if let Err(e) = self.persist() {
            if let Some(record) = self.items.get_mut(name) {
                record.price_history.pop();
            }
            return Err(e);
        }
        Ok(true)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let document = DocumentRef {
            version: CURRENT_VERSION,
            items: &self.items,
        };
        let json = serde_json::to_vec_pretty(&document)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        Ok(())
    }
}

/// JSON has no representation for NaN or infinity; such a record would not survive a reload.
fn check_price(price: f64) -> Result<(), StoreError> {
    if price.is_finite() && price >= 0.0 {
        Ok(())
    } else {
        Err(StoreError::InvalidPrice(price))
    }
}

/// Parse either document version into records, skipping records that cannot be read.
fn parse_document(contents: &str) -> Result<BTreeMap<String, WatchRecord>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(contents)?;

    let serde_json::Value::Object(mut root) = value else {
        return Err(serde::de::Error::custom("watch list root is not an object"));
    };

    let versioned = root.get("version").is_some_and(serde_json::Value::is_u64)
        && root.get("items").is_some_and(serde_json::Value::is_object);

    let raw_items = if versioned {
        match root.remove("items") {
            Some(serde_json::Value::Object(items)) => items,
            _ => serde_json::Map::new(),
        }
    } else {
        root
    };

    let mut items = BTreeMap::new();
    for (name, raw) in raw_items {
        match parse_record(&raw) {
            Some(record) => {
                items.insert(name, record);
            }
            None => warn!(name = %name, "Skipping unreadable watch list record"),
        }
    }
    Ok(items)
}

fn parse_record(raw: &serde_json::Value) -> Option<WatchRecord> {
    let added_date = parse_timestamp(raw.get("added_date")?.as_str()?)?;
    let initial_price = raw.get("initial_price")?.as_f64()?;

    let price_history = raw
        .get("price_history")
        .and_then(serde_json::Value::as_array)
        .map(|entries| entries.iter().filter_map(parse_history_entry).collect())
        .unwrap_or_default();

    Some(WatchRecord {
        added_date,
        initial_price,
        price_history,
    })
}

fn parse_history_entry(raw: &serde_json::Value) -> Option<PricePoint> {
    let pair = raw.as_array()?;
    let [timestamp, price] = pair.as_slice() else {
        return None;
    };
    Some(PricePoint {
        timestamp: parse_timestamp(timestamp.as_str()?)?,
        price: price.as_f64()?,
    })
}

/// RFC 3339, or a naive ISO-8601 timestamp interpreted as UTC.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
