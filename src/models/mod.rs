//! Data models for price bars, daily simulation rows, summaries, and metrics.

mod bar;
mod metrics;
mod report;

pub use bar::{validate_series, DailyBar};
pub use metrics::{EquityMetrics, RunMetrics};
pub use report::{BenchmarkRow, BenchmarkSummary, DailyRow, RebalanceAction, SimulationSummary};
