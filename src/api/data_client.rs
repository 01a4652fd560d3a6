//! Market data client for fetching daily OHLC bars, plus a loader for bars
//! stored on disk.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use reqwest::Client;
use tracing::{debug, info};

use crate::models::DailyBar;

use super::types::ChartResponse;

const CHART_API_BASE: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "Mozilla/5.0 (compatible; survival-bt/0.1)";

/// Default asset for backtests (S&P 500 index).
pub const DEFAULT_TICKER: &str = "^GSPC";

/// Client for the Yahoo Finance chart API (read-only).
pub struct MarketDataClient {
    client: Client,
    base_url: String,
}

impl MarketDataClient {
    /// Create a new data client with default settings.
    pub fn new() -> Result<Self> {
        Self::with_base_url(CHART_API_BASE.to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Fetch daily bars for `ticker` from `start` (inclusive) to `end`
    /// (exclusive), oldest first.
    pub async fn fetch_daily_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        let url = self.chart_url(ticker, start, end);

        debug!(url = %url, "Fetching daily bars");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch price history")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Price history request failed: {} - {}", status, body);
        }

        let chart: ChartResponse = response
            .json()
            .await
            .context("Failed to parse price history response")?;

        let bars = chart.into_bars()?;

        info!(ticker = %ticker, count = bars.len(), "Fetched daily bars");

        Ok(bars)
    }

    fn chart_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let period1 = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let period2 = end.and_time(NaiveTime::MIN).and_utc().timestamp();

        format!(
            "{}/v8/finance/chart/{}?interval=1d&period1={}&period2={}&events=history",
            self.base_url,
            encode_ticker(ticker),
            period1,
            period2
        )
    }
}

/// Percent-encode the characters index tickers commonly contain.
fn encode_ticker(ticker: &str) -> String {
    ticker
        .chars()
        .map(|c| match c {
            '^' => "%5E".to_string(),
            '=' => "%3D".to_string(),
            ' ' => "%20".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

/// Load bars from a JSON file holding an array of
/// `{"date", "open", "high", "low", "close"}` records.
pub fn load_bars(path: &Path) -> Result<Vec<DailyBar>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read price file {}", path.display()))?;

    let bars: Vec<DailyBar> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse price file {}", path.display()))?;

    info!(path = %path.display(), count = bars.len(), "Loaded daily bars");

    Ok(bars)
}
