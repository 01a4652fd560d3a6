//! Trading logic: broker assumptions, position sizing, leveraged account.

mod account;
mod config;
mod position_sizer;

pub use account::{LeveragedAccount, TickOutcome};
pub use config::{BrokerAssumptions, RebalanceFrequency, SimulationParams};
pub use position_sizer::PositionSizer;
