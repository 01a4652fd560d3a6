//! Response types for the Yahoo Finance chart API.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::models::DailyBar;

/// Top-level response from /v8/finance/chart/{ticker}.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartError {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub meta: ChartMeta,
    /// Bar timestamps in seconds since the epoch
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartMeta {
    /// Exchange offset from UTC in seconds
    #[serde(default)]
    pub gmtoffset: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
}

/// Parallel OHLC arrays; any entry may be null on non-trading days.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}

impl ChartResponse {
    /// Convert into date-ordered bars, dropping rows with any missing price
    /// and keeping the first row of a duplicated date.
    pub fn into_bars(self) -> Result<Vec<DailyBar>> {
        if let Some(err) = self.chart.error {
            anyhow::bail!("Chart API error: {} - {}", err.code, err.description);
        }

        let result = self
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .context("No data found for the given ticker and date range")?;

        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

        let mut by_date: BTreeMap<NaiveDate, DailyBar> = BTreeMap::new();

        for (i, &ts) in result.timestamp.iter().enumerate() {
            let field = |values: &Vec<Option<f64>>| values.get(i).copied().flatten();

            let (Some(open), Some(high), Some(low), Some(close)) = (
                field(&quote.open),
                field(&quote.high),
                field(&quote.low),
                field(&quote.close),
            ) else {
                continue;
            };

            // Bars are stamped at the exchange open; date them in exchange time
            let local = ts + result.meta.gmtoffset;
            let Some(date) = DateTime::from_timestamp(local, 0).map(|dt| dt.date_naive()) else {
                continue;
            };

            by_date
                .entry(date)
                .or_insert_with(|| DailyBar::new(date, open, high, low, close));
        }

        Ok(by_date.into_values().collect())
    }
}
