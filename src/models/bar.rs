//! Daily OHLC price bar and price-series checks.

use anyhow::{ensure, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of prices for the simulated asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Trading day
    pub date: NaiveDate,

    /// Opening price; only the first bar's open is used, as the entry price
    pub open: f64,

    /// Intraday high
    pub high: f64,

    /// Intraday low, the worst price the position is marked at
    pub low: f64,

    /// Closing price
    pub close: f64,
}

impl DailyBar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
        }
    }

    /// Whether every price is finite and strictly positive.
    pub fn has_positive_prices(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
    }
}

/// Check that a series is usable by the simulation: non-empty, strictly
/// increasing dates, positive prices.
pub fn validate_series(bars: &[DailyBar]) -> Result<()> {
    ensure!(
        !bars.is_empty(),
        "No data found for the given ticker and date range"
    );

    for bar in bars {
        ensure!(
            bar.has_positive_prices(),
            "Bar on {} has a non-positive or missing price",
            bar.date
        );
    }

    if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
        anyhow::bail!(
            "Price series is not strictly date-ordered: {} follows {}",
            pair[1].date,
            pair[0].date
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> DailyBar {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        DailyBar::new(date, close, close + 5.0, close - 5.0, close)
    }

    #[test]
    fn test_valid_series() {
        let bars = vec![bar(2, 100.0), bar(3, 101.0), bar(5, 99.0)];
        assert!(validate_series(&bars).is_ok());
    }

    #[test]
    fn test_rejects_empty_series() {
        assert!(validate_series(&[]).is_err());
    }

    #[test]
    fn test_rejects_unordered_or_duplicate_dates() {
        assert!(validate_series(&[bar(3, 100.0), bar(2, 101.0)]).is_err());
        assert!(validate_series(&[bar(3, 100.0), bar(3, 101.0)]).is_err());
    }

    #[test]
    fn test_rejects_non_positive_prices() {
        let mut bad = bar(2, 100.0);
        bad.low = 0.0;
        assert!(validate_series(&[bad]).is_err());

        let mut nan = bar(2, 100.0);
        nan.close = f64::NAN;
        assert!(validate_series(&[nan]).is_err());
    }

    #[test]
    fn test_bar_json_format() {
        let json = r#"{"date":"2024-01-02","open":100.0,"high":105.0,"low":95.0,"close":101.5}"#;
        let parsed: DailyBar = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(parsed.close, 101.5);
    }
}
