//! Performance and risk metrics over simulation output.

mod calculator;

pub use calculator::MetricsCalculator;
