//! Target unit sizing for the leveraged survival position.

use tracing::warn;

use super::BrokerAssumptions;

/// Calculator for the largest position that survives a given market drop.
#[derive(Debug, Clone, Copy)]
pub struct PositionSizer {
    assumptions: BrokerAssumptions,
}

impl PositionSizer {
    /// Create a new position sizer with the given broker assumptions.
    pub fn new(assumptions: BrokerAssumptions) -> Self {
        Self { assumptions }
    }

    pub fn assumptions(&self) -> &BrokerAssumptions {
        &self.assumptions
    }

    /// Combined cushion per unit of price: the market drop to survive plus
    /// the broker's closeout buffer.
    pub fn total_buffer(&self, max_drop_percent: f64) -> f64 {
        max_drop_percent / 100.0 + self.assumptions.broker_buffer()
    }

    /// Calculate the leveraged unit count for `equity` at `price`.
    ///
    /// units = equity / (price * (max_drop / 100 + margin_req * closeout))
    ///
    /// A drop of `max_drop_percent` from `price` then leaves the account just
    /// above the closeout level. Degenerate buffers or prices size to zero.
    /// Non-positive equity is passed through; callers reject it upstream.
    pub fn target_units(&self, equity: f64, price: f64, max_drop_percent: f64) -> f64 {
        let total_buffer = self.total_buffer(max_drop_percent);
        if total_buffer <= 0.0 {
            warn!(total_buffer, "Total buffer is not positive, sizing to zero units");
            return 0.0;
        }

        let capital_per_unit = price * total_buffer;
        if capital_per_unit <= 0.0 {
            warn!(
                price,
                capital_per_unit,
                "Capital per unit is not positive, sizing to zero units"
            );
            return 0.0;
        }

        equity / capital_per_unit
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::new(BrokerAssumptions::default())
    }
}
