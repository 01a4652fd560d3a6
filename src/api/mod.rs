//! Market data access: chart API client and price-file loader.

mod data_client;
mod types;

pub use data_client::{load_bars, MarketDataClient, DEFAULT_TICKER};
