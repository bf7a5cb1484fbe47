pub mod profit;
pub mod ranking;
