pub mod store;
pub mod watchlist;
