pub mod config;
pub mod db;
pub mod error;
pub mod market;
pub mod monitoring;
pub mod tracker;
pub mod valuation;
