//! Output rows and summaries produced by the simulation drivers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Unit changes smaller than this are reported as `Hold`.
pub const UNIT_CHANGE_THRESHOLD: f64 = 0.01;

/// Direction of a rebalance on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalanceAction {
    Buy,
    Sell,
    Hold,
}

impl RebalanceAction {
    /// Classify a change in units, zeroing out noise below the threshold.
    pub fn classify(unit_change: f64) -> (Self, f64) {
        if unit_change > UNIT_CHANGE_THRESHOLD {
            (Self::Buy, unit_change)
        } else if unit_change < -UNIT_CHANGE_THRESHOLD {
            (Self::Sell, unit_change)
        } else {
            (Self::Hold, 0.0)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
            Self::Hold => "Hold",
        }
    }
}

/// Leveraged account snapshot at the end of one processed day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRow {
    pub date: NaiveDate,

    /// Account equity after the day
    pub equity: f64,

    /// Financing charges to date (zero or negative)
    pub cumulative_cost: f64,

    /// Closeout level at the day's close for the units held; informational
    pub trigger_level: f64,

    /// Units held after the day
    pub units: f64,

    /// Units bought (positive) or sold (negative) by a rebalance
    pub unit_change: f64,

    pub action: RebalanceAction,
}

/// Terminal snapshot of a leveraged run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub liquidated: bool,
    pub liquidation_date: Option<NaiveDate>,
    pub final_equity: f64,

    /// (final_equity / capital - 1) * 100
    pub total_return_pct: f64,

    /// Financing paid over the run, as a positive amount
    pub total_costs_paid: f64,

    pub initial_units: f64,
}

/// Buy-and-hold equity on one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRow {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Terminal snapshot of the buy-and-hold benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub units_held: f64,
}
