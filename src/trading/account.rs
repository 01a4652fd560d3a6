//! Day-by-day state machine for the leveraged account: liquidation check,
//! equity and carry accrual, periodic rebalancing.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BrokerAssumptions, PositionSizer, RebalanceFrequency};

/// What the cadence tracker concluded for one observed day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceSignal {
    /// First observation; the tracker was seeded and nothing triggers
    Seeded,
    /// Same month/quarter as the previous observation
    SamePeriod,
    /// A new month/quarter started since the previous observation
    NewPeriod,
}

/// Last month or quarter seen by a periodic rebalance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PeriodMarker {
    #[default]
    Unset,
    Seen(u32),
}

impl PeriodMarker {
    /// Record `period` and report how it relates to the previous one.
    pub fn observe(&mut self, period: u32) -> CadenceSignal {
        let signal = match *self {
            Self::Unset => CadenceSignal::Seeded,
            Self::Seen(previous) if previous == period => CadenceSignal::SamePeriod,
            Self::Seen(_) => CadenceSignal::NewPeriod,
        };
        *self = Self::Seen(period);
        signal
    }
}

/// Calendar quarter (1 to 4) of a date.
pub fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// Result of advancing the account by one trading day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Account was already liquidated; nothing changed
    Frozen,
    /// The day's low breached the closeout level
    Liquidated { trigger_level: f64 },
    /// Normal day: P&L and carry booked, possibly resized
    Settled { daily_cost: f64, rebalanced: bool },
}

/// Mutable state of a leveraged account, owned by one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    /// Marked-to-market account value
    pub equity: f64,

    /// Leveraged position size in underlying units
    pub units: f64,

    /// Running sum of financing charges (never positive)
    pub cumulative_cost: f64,

    /// Set once the broker closes the position; the state is frozen after
    pub liquidated: bool,

    /// Day the liquidation happened
    pub liquidation_date: Option<NaiveDate>,

    /// Previous trading day's close, the P&L reference point
    pub previous_close: f64,

    /// Month or quarter of the last periodic rebalance check
    pub period_marker: PeriodMarker,
}

impl AccountState {
    /// Fresh account holding `initial_units` funded with `capital`.
    pub fn new(capital: f64, initial_units: f64) -> Self {
        Self {
            equity: capital,
            units: initial_units,
            cumulative_cost: 0.0,
            liquidated: false,
            liquidation_date: None,
            previous_close: 0.0,
            period_marker: PeriodMarker::Unset,
        }
    }
}

/// Leveraged account: the state plus the assumptions that drive it.
#[derive(Debug, Clone)]
pub struct LeveragedAccount {
    state: AccountState,
    sizer: PositionSizer,
}

impl LeveragedAccount {
    /// Open an account that entered its position at `entry_price`.
    pub fn open(
        capital: f64,
        initial_units: f64,
        entry_price: f64,
        assumptions: BrokerAssumptions,
    ) -> Self {
        let mut state = AccountState::new(capital, initial_units);
        state.previous_close = entry_price;
        Self::from_state(state, assumptions)
    }

    /// Resume from a previously captured state.
    pub fn from_state(state: AccountState, assumptions: BrokerAssumptions) -> Self {
        Self {
            state,
            sizer: PositionSizer::new(assumptions),
        }
    }

    pub fn state(&self) -> &AccountState {
        &self.state
    }

    pub fn into_state(self) -> AccountState {
        self.state
    }

    pub fn equity(&self) -> f64 {
        self.state.equity
    }

    pub fn units(&self) -> f64 {
        self.state.units
    }

    pub fn is_liquidated(&self) -> bool {
        self.state.liquidated
    }

    /// Advance the account by one trading day.
    ///
    /// Order matters: the liquidation check runs on the day's low before any
    /// equity update, and a liquidation ends the day with no carry and no
    /// rebalance. `previous_close` only moves on settled days.
    pub fn advance(
        &mut self,
        date: NaiveDate,
        low: f64,
        close: f64,
        daily_cost_rate: f64,
        frequency: RebalanceFrequency,
        max_drop_percent: f64,
    ) -> TickOutcome {
        if self.state.liquidated {
            return TickOutcome::Frozen;
        }

        if let Some(trigger_level) = self.check_liquidation(date, low) {
            return TickOutcome::Liquidated { trigger_level };
        }

        let daily_cost = self.update_equity(close, daily_cost_rate);

        let rebalanced = self.should_rebalance(date, frequency);
        if rebalanced {
            self.rebalance(date, close, max_drop_percent);
        }

        self.state.previous_close = close;

        TickOutcome::Settled {
            daily_cost,
            rebalanced,
        }
    }

    /// Mark the position at the day's low and close it out if equity falls
    /// to the broker's trigger level.
    fn check_liquidation(&mut self, date: NaiveDate, low: f64) -> Option<f64> {
        let s = &mut self.state;
        let pnl_at_low = (low - s.previous_close) * s.units;
        let equity_at_low = s.equity + pnl_at_low;
        let trigger_level = self.sizer.assumptions().closeout_level(low, s.units);

        if equity_at_low > trigger_level {
            return None;
        }

        s.liquidated = true;
        s.liquidation_date = Some(date);
        s.equity = trigger_level;

        debug!(
            date = %date,
            low,
            equity_at_low,
            trigger_level,
            "Position liquidated"
        );

        Some(trigger_level)
    }

    /// Book the day's market P&L and financing charge at the close.
    fn update_equity(&mut self, close: f64, daily_cost_rate: f64) -> f64 {
        let s = &mut self.state;
        let market_pnl = s.units * (close - s.previous_close);
        let daily_cost = close * s.units * daily_cost_rate;

        s.equity += market_pnl - daily_cost;
        s.cumulative_cost -= daily_cost;

        daily_cost
    }

    fn should_rebalance(&mut self, date: NaiveDate, frequency: RebalanceFrequency) -> bool {
        let period = match frequency {
            RebalanceFrequency::Never => return false,
            RebalanceFrequency::Daily => return true,
            RebalanceFrequency::Monthly => date.month(),
            RebalanceFrequency::Quarterly => quarter_of(date),
        };

        self.state.period_marker.observe(period) == CadenceSignal::NewPeriod
    }

    fn rebalance(&mut self, date: NaiveDate, close: f64, max_drop_percent: f64) {
        let target = self
            .sizer
            .target_units(self.state.equity, close, max_drop_percent);

        debug!(
            date = %date,
            from = self.state.units,
            to = target,
            equity = self.state.equity,
            "Rebalanced position"
        );

        self.state.units = target;
    }
}
