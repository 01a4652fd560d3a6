//! Risk and performance metrics for a finished backtest run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Risk statistics of one equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EquityMetrics {
    /// Maximum drawdown from the running peak (0.0 to 1.0)
    pub max_drawdown: f64,

    /// Annualized standard deviation of daily returns
    pub annualized_volatility: f64,

    /// Annualized Sharpe ratio (zero risk-free rate)
    pub sharpe_ratio: f64,
}

/// Statistics derived from both strategies' output series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Days processed by the leveraged driver
    pub trading_days: usize,

    /// Rebalances that added units
    pub buy_rebalances: usize,

    /// Rebalances that removed units
    pub sell_rebalances: usize,

    /// Notional exposure over capital at entry
    pub entry_leverage: f64,

    /// Smallest gap between equity and the displayed closeout level
    pub min_headroom: f64,

    /// Day the smallest gap occurred
    pub min_headroom_date: Option<NaiveDate>,

    pub leveraged: EquityMetrics,

    pub benchmark: EquityMetrics,
}
