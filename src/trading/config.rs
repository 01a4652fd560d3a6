//! Broker assumptions and simulation parameters.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, ensure, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Smallest survivable market drop a run may be configured with, in percent.
pub const MIN_MAX_DROP_PERCENT: f64 = 10.0;

/// Largest survivable market drop a run may be configured with, in percent.
pub const MAX_MAX_DROP_PERCENT: f64 = 70.0;

/// Fixed broker and market assumptions shared by the sizer, the account and
/// both drivers of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrokerAssumptions {
    /// Annual net cost of carrying the leveraged position (0.0 to 1.0)
    pub annual_cost_of_carry: f64,

    /// Broker margin requirement as a fraction of notional (0.05 = 1:20)
    pub margin_requirement: f64,

    /// Fraction of required margin at which the broker closes out
    pub margin_closeout: f64,

    /// Calendar days the annual carry is spread over
    pub days_per_year: f64,
}

impl Default for BrokerAssumptions {
    fn default() -> Self {
        Self {
            annual_cost_of_carry: 0.0533, // 5.33% annual net cost
            margin_requirement: 0.05,     // 5% margin (1:20 leverage)
            margin_closeout: 0.50,        // 50% margin closeout rule
            days_per_year: 365.0,
        }
    }
}

impl BrokerAssumptions {
    /// Financing charge per calendar day, as a fraction of position value.
    pub fn daily_cost_rate(&self) -> f64 {
        self.annual_cost_of_carry / self.days_per_year
    }

    /// Cushion the broker keeps before closing out, as a fraction of price.
    pub fn broker_buffer(&self) -> f64 {
        self.margin_requirement * self.margin_closeout
    }

    /// Equity level at which a position of `units` is closed out at `price`.
    pub fn closeout_level(&self, price: f64, units: f64) -> f64 {
        let required_margin = price * units * self.margin_requirement;
        required_margin * self.margin_closeout
    }
}

/// How often the leveraged position is resized to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RebalanceFrequency {
    #[default]
    Never,
    Daily,
    Monthly,
    Quarterly,
}

impl RebalanceFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "Never",
            Self::Daily => "Daily",
            Self::Monthly => "Monthly",
            Self::Quarterly => "Quarterly",
        }
    }
}

impl FromStr for RebalanceFrequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "daily" => Ok(Self::Daily),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            other => bail!(
                "Unknown rebalance frequency '{}' (expected Never, Daily, Monthly or Quarterly)",
                other
            ),
        }
    }
}

impl fmt::Display for RebalanceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing inputs for one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Starting cash, shared by both strategies
    pub capital: f64,

    /// Market crash the leveraged position is sized to survive, in percent
    pub max_drop_percent: f64,

    /// Rebalancing cadence
    pub rebalance_frequency: RebalanceFrequency,

    /// First day of the backtest window
    pub start_date: NaiveDate,

    /// End of the backtest window (exclusive)
    pub end_date: NaiveDate,
}

impl SimulationParams {
    /// Build parameters from raw inputs, rejecting anything the core would
    /// silently accept.
    pub fn parse(
        capital: f64,
        max_drop_percent: f64,
        rebalance_frequency: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self> {
        let params = Self {
            capital,
            max_drop_percent,
            rebalance_frequency: rebalance_frequency.parse()?,
            start_date,
            end_date,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.capital.is_finite() && self.capital > 0.0,
            "Capital must be positive, got {}",
            self.capital
        );
        ensure!(
            (MIN_MAX_DROP_PERCENT..=MAX_MAX_DROP_PERCENT).contains(&self.max_drop_percent),
            "Max drop must be between {}% and {}%, got {}%",
            MIN_MAX_DROP_PERCENT,
            MAX_MAX_DROP_PERCENT,
            self.max_drop_percent
        );
        ensure!(
            self.end_date > self.start_date,
            "End date {} must be after start date {}",
            self.end_date,
            self.start_date
        );
        Ok(())
    }
}
