//! Backtesting engine for the leveraged survival strategy and its
//! buy-and-hold benchmark.
//!
//! Features:
//! - Walk a daily price series through the leveraged account state machine
//! - Record equity, carry, closeout level and rebalance actions per day
//! - Compute the unleveraged benchmark over the same series
//! - Summarize both runs and derive risk metrics

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::metrics::MetricsCalculator;
use crate::models::{
    validate_series, BenchmarkRow, BenchmarkSummary, DailyBar, DailyRow, RebalanceAction,
    RunMetrics, SimulationSummary,
};
use crate::trading::{
    BrokerAssumptions, LeveragedAccount, PositionSizer, RebalanceFrequency, SimulationParams,
    TickOutcome,
};

/// Output of the leveraged driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeveragedRun {
    /// One row per processed day, ending on the liquidation day if any
    pub rows: Vec<DailyRow>,
    pub summary: SimulationSummary,
}

/// Output of the benchmark driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub rows: Vec<BenchmarkRow>,
    pub summary: BenchmarkSummary,
}

/// Everything produced by one backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub params: SimulationParams,
    pub assumptions: BrokerAssumptions,

    /// First bar's open, where both strategies enter
    pub entry_price: f64,

    pub leveraged: LeveragedRun,
    pub benchmark: BenchmarkRun,
    pub metrics: RunMetrics,
}

impl BacktestReport {
    /// First and last processed day of the leveraged run.
    pub fn period(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.leveraged.rows.first()?;
        let last = self.leveraged.rows.last()?;
        Some((first.date, last.date))
    }

    /// Write the full report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Render the first `limit` daily rows as a table, with the benchmark
    /// equity for the same day alongside.
    pub fn rows_table(&self, limit: usize) -> String {
        let mut out = format!(
            "{:<12} {:>14} {:>14} {:>12} {:>12} {:>11} {:>6} {:>14}\n",
            "DATE", "EQUITY", "TRIGGER", "COST", "UNITS", "CHANGE", "ACTION", "BENCHMARK"
        );
        out.push_str(&"-".repeat(102));
        out.push('\n');

        for (row, bench) in self
            .leveraged
            .rows
            .iter()
            .zip(self.benchmark.rows.iter())
            .take(limit)
        {
            out.push_str(&format!(
                "{:<12} {:>14.2} {:>14.2} {:>12.2} {:>12.4} {:>11.4} {:>6} {:>14.2}\n",
                row.date.format("%Y-%m-%d"),
                row.equity,
                row.trigger_level,
                row.cumulative_cost,
                row.units,
                row.unit_change,
                row.action.as_str(),
                bench.equity
            ));
        }

        out
    }
}

impl fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lev = &self.leveraged.summary;
        let bench = &self.benchmark.summary;
        let m = &self.metrics;

        writeln!(f, "\n{:=^60}", " BACKTEST RESULTS ")?;
        writeln!(f)?;
        if let Some((start, end)) = self.period() {
            writeln!(f, "Period: {} to {} ({} trading days)",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d"),
                m.trading_days)?;
        }
        writeln!(f, "Entry Price: {:.2}", self.entry_price)?;
        writeln!(f, "Capital:     ${:.2}", self.params.capital)?;
        writeln!(f, "Max Drop:    {:.1}%  |  Rebalancing: {}",
            self.params.max_drop_percent, self.params.rebalance_frequency)?;
        writeln!(f)?;
        match lev.liquidation_date {
            Some(date) if lev.liquidated => {
                writeln!(f, "LEVERAGED STRATEGY LIQUIDATED on {}", date.format("%Y-%m-%d"))?
            }
            _ => writeln!(f, "LEVERAGED STRATEGY SURVIVED - position was not liquidated")?,
        }
        writeln!(f)?;
        writeln!(f, "--- Leveraged Survival Strategy ---")?;
        writeln!(f, "Initial Units:  {:.4}", lev.initial_units)?;
        writeln!(f, "Entry Leverage: {:.2}x", m.entry_leverage)?;
        writeln!(f, "Final Equity:   ${:.2}", lev.final_equity)?;
        writeln!(f, "Total Return:   {:.2}%", lev.total_return_pct)?;
        writeln!(f, "Costs Paid:     ${:.2}", lev.total_costs_paid)?;
        writeln!(f, "Rebalances:     {} buys, {} sells", m.buy_rebalances, m.sell_rebalances)?;
        writeln!(f, "Max Drawdown:   {:.2}%", m.leveraged.max_drawdown * 100.0)?;
        writeln!(f, "Volatility:     {:.2}%", m.leveraged.annualized_volatility * 100.0)?;
        writeln!(f, "Sharpe Ratio:   {:.2}", m.leveraged.sharpe_ratio)?;
        if let Some(date) = m.min_headroom_date {
            writeln!(f, "Min Headroom:   ${:.2} on {}", m.min_headroom, date.format("%Y-%m-%d"))?;
        }
        writeln!(f)?;
        writeln!(f, "--- Simple Buy & Hold (Benchmark) ---")?;
        writeln!(f, "Units Held:     {:.4}", bench.units_held)?;
        writeln!(f, "Final Equity:   ${:.2}", bench.final_equity)?;
        writeln!(f, "Total Return:   {:.2}%", bench.total_return_pct)?;
        writeln!(f, "Costs Paid:     $0.00")?;
        writeln!(f, "Max Drawdown:   {:.2}%", m.benchmark.max_drawdown * 100.0)?;
        writeln!(f, "Volatility:     {:.2}%", m.benchmark.annualized_volatility * 100.0)?;
        writeln!(f, "Sharpe Ratio:   {:.2}", m.benchmark.sharpe_ratio)?;
        writeln!(f, "{:=^60}", "")?;
        Ok(())
    }
}

/// Backtesting engine.
#[derive(Debug, Clone)]
pub struct Backtester {
    assumptions: BrokerAssumptions,
    position_sizer: PositionSizer,
}

impl Backtester {
    /// Create a new backtester.
    pub fn new(assumptions: BrokerAssumptions) -> Self {
        Self {
            assumptions,
            position_sizer: PositionSizer::new(assumptions),
        }
    }

    /// Validate inputs, size the initial position at the first open, and run
    /// both strategies over `bars`.
    pub fn run(&self, params: &SimulationParams, bars: &[DailyBar]) -> Result<BacktestReport> {
        params.validate()?;
        validate_series(bars)?;

        let entry_price = bars[0].open;
        let initial_units = self.position_sizer.target_units(
            params.capital,
            entry_price,
            params.max_drop_percent,
        );

        info!(
            capital = params.capital,
            entry_price,
            initial_units,
            max_drop = params.max_drop_percent,
            frequency = %params.rebalance_frequency,
            days = bars.len(),
            "Starting backtest"
        );

        let leveraged = self.run_leveraged(
            params.capital,
            initial_units,
            entry_price,
            bars,
            params.rebalance_frequency,
            params.max_drop_percent,
        );
        let benchmark = self.run_benchmark(params.capital, entry_price, bars);

        let metrics = MetricsCalculator::calculate(
            params.capital,
            entry_price,
            initial_units,
            &leveraged.rows,
            &benchmark.rows,
        );

        info!(
            liquidated = leveraged.summary.liquidated,
            leveraged_equity = leveraged.summary.final_equity,
            benchmark_equity = benchmark.summary.final_equity,
            "Backtest complete"
        );

        Ok(BacktestReport {
            params: params.clone(),
            assumptions: self.assumptions,
            entry_price,
            leveraged,
            benchmark,
            metrics,
        })
    }

    /// Drive the leveraged account through `bars`, one day at a time.
    ///
    /// Stops after the liquidation day (that day's row is included) or at the
    /// end of the series.
    pub fn run_leveraged(
        &self,
        capital: f64,
        initial_units: f64,
        entry_price: f64,
        bars: &[DailyBar],
        frequency: RebalanceFrequency,
        max_drop_percent: f64,
    ) -> LeveragedRun {
        let daily_cost_rate = self.assumptions.daily_cost_rate();
        let mut account =
            LeveragedAccount::open(capital, initial_units, entry_price, self.assumptions);
        let mut rows = Vec::with_capacity(bars.len());

        for bar in bars {
            let units_before = account.units();

            let outcome = account.advance(
                bar.date,
                bar.low,
                bar.close,
                daily_cost_rate,
                frequency,
                max_drop_percent,
            );

            let state = account.state();
            let (action, unit_change) = RebalanceAction::classify(state.units - units_before);

            if action != RebalanceAction::Hold {
                debug!(
                    date = %bar.date,
                    action = action.as_str(),
                    unit_change,
                    units = state.units,
                    "Rebalance"
                );
            }

            rows.push(DailyRow {
                date: bar.date,
                equity: account.equity(),
                cumulative_cost: state.cumulative_cost,
                trigger_level: self.assumptions.closeout_level(bar.close, state.units),
                units: state.units,
                unit_change,
                action,
            });

            if account.is_liquidated() {
                if let TickOutcome::Liquidated { trigger_level } = outcome {
                    info!(
                        date = %bar.date,
                        low = bar.low,
                        trigger_level,
                        "Leveraged position liquidated"
                    );
                }
                break;
            }
        }

        let state = account.into_state();
        let summary = SimulationSummary {
            liquidated: state.liquidated,
            liquidation_date: state.liquidation_date,
            final_equity: state.equity,
            total_return_pct: (state.equity / capital - 1.0) * 100.0,
            total_costs_paid: -state.cumulative_cost,
            initial_units,
        };

        LeveragedRun { rows, summary }
    }

    /// Unleveraged buy-and-hold over the same series: `capital / entry_price`
    /// units marked at each close, no carry, no liquidation.
    pub fn run_benchmark(&self, capital: f64, entry_price: f64, bars: &[DailyBar]) -> BenchmarkRun {
        let units_held = capital / entry_price;

        let rows: Vec<BenchmarkRow> = bars
            .iter()
            .map(|bar| BenchmarkRow {
                date: bar.date,
                equity: units_held * bar.close,
            })
            .collect();

        let final_equity = rows.last().map(|r| r.equity).unwrap_or(0.0);
        let total_return_pct = if capital > 0.0 {
            (final_equity / capital - 1.0) * 100.0
        } else {
            0.0
        };

        BenchmarkRun {
            rows,
            summary: BenchmarkSummary {
                final_equity,
                total_return_pct,
                units_held,
            },
        }
    }
}

impl Default for Backtester {
    fn default() -> Self {
        Self::new(BrokerAssumptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn flat_bar(day: NaiveDate, price: f64) -> DailyBar {
        DailyBar::new(day, price, price, price, price)
    }

    fn params(frequency: &str) -> SimulationParams {
        SimulationParams::parse(10000.0, 30.0, frequency, date(2020, 1, 1), date(2021, 1, 1))
            .unwrap()
    }

    #[test]
    fn test_crash_liquidates_on_first_day() {
        let bt = Backtester::default();
        let units = PositionSizer::default().target_units(10000.0, 1000.0, 30.0);
        let bars = vec![DailyBar::new(date(2020, 3, 16), 1000.0, 1000.0, 650.0, 660.0)];

        let run = bt.run_leveraged(10000.0, units, 1000.0, &bars, RebalanceFrequency::Never, 30.0);

        let trigger = 650.0 * units * 0.05 * 0.50;
        assert!(run.summary.liquidated);
        assert_eq!(run.summary.liquidation_date, Some(date(2020, 3, 16)));
        assert_eq!(run.summary.final_equity, trigger);
        assert_eq!(run.summary.total_costs_paid, 0.0);
        assert_eq!(run.rows.len(), 1);
        assert_eq!(run.rows[0].equity, trigger);
        assert_eq!(run.rows[0].action, RebalanceAction::Hold);
    }

    #[test]
    fn test_run_stops_after_liquidation_day() {
        let bt = Backtester::default();
        let bars = vec![
            flat_bar(date(2020, 3, 12), 1000.0),
            DailyBar::new(date(2020, 3, 13), 1000.0, 1000.0, 600.0, 700.0),
            flat_bar(date(2020, 3, 16), 1100.0),
            flat_bar(date(2020, 3, 17), 1200.0),
        ];

        let run = bt.run_leveraged(10000.0, 30.0, 1000.0, &bars, RebalanceFrequency::Daily, 30.0);

        assert_eq!(run.rows.len(), 2);
        assert_eq!(run.rows.last().unwrap().date, date(2020, 3, 13));
        assert_eq!(run.summary.liquidation_date, Some(date(2020, 3, 13)));
    }

    #[test]
    fn test_flat_days_bleed_carry() {
        let bt = Backtester::default();
        let bars: Vec<DailyBar> = (2..=6).map(|d| flat_bar(date(2024, 1, d), 1010.0)).collect();

        let run = bt.run_leveraged(10000.0, 27.5, 1000.0, &bars, RebalanceFrequency::Never, 30.0);
        assert!(!run.summary.liquidated);
        assert_eq!(run.rows.len(), 5);

        let increment = 1010.0 * 27.5 * BrokerAssumptions::default().daily_cost_rate();
        let mut previous_cost = 0.0;
        for row in &run.rows {
            assert!(row.cumulative_cost < previous_cost);
            assert!((previous_cost - row.cumulative_cost - increment).abs() < 1e-9);
            previous_cost = row.cumulative_cost;
        }

        for pair in run.rows.windows(2) {
            assert!(pair[1].equity < pair[0].equity);
        }

        assert!((run.summary.total_costs_paid - 5.0 * increment).abs() < 1e-9);
        assert_eq!(run.summary.initial_units, 27.5);
    }

    #[test]
    fn test_display_trigger_uses_close() {
        let bt = Backtester::default();
        let bars = vec![DailyBar::new(date(2024, 1, 2), 1000.0, 1010.0, 980.0, 1005.0)];

        let run = bt.run_leveraged(10000.0, 20.0, 1000.0, &bars, RebalanceFrequency::Never, 30.0);

        assert_eq!(run.rows[0].trigger_level, 1005.0 * 20.0 * 0.05 * 0.50);
    }

    #[test]
    fn test_daily_rebalance_actions() {
        let bt = Backtester::default();
        let bars = vec![
            flat_bar(date(2024, 1, 2), 1050.0),
            flat_bar(date(2024, 1, 3), 1000.0),
        ];
        let units = PositionSizer::default().target_units(10000.0, 1000.0, 30.0);

        let run = bt.run_leveraged(10000.0, units, 1000.0, &bars, RebalanceFrequency::Daily, 30.0);

        // Rally: equity up more than price, so the target grows
        assert_eq!(run.rows[0].action, RebalanceAction::Buy);
        assert!(run.rows[0].unit_change > 0.0);
        // Drop: equity down more than price, so the target shrinks
        assert_eq!(run.rows[1].action, RebalanceAction::Sell);
        assert!(run.rows[1].unit_change < 0.0);
    }

    #[test]
    fn test_empty_series() {
        let bt = Backtester::default();

        let run = bt.run_leveraged(10000.0, 30.0, 1000.0, &[], RebalanceFrequency::Daily, 30.0);
        assert!(run.rows.is_empty());
        assert!(!run.summary.liquidated);
        assert_eq!(run.summary.final_equity, 10000.0);
        assert_eq!(run.summary.total_return_pct, 0.0);
        assert_eq!(run.summary.total_costs_paid, 0.0);

        let bench = bt.run_benchmark(10000.0, 1000.0, &[]);
        assert!(bench.rows.is_empty());
        assert_eq!(bench.summary.final_equity, 0.0);
        assert_eq!(bench.summary.units_held, 10.0);
    }

    #[test]
    fn test_benchmark() {
        let bt = Backtester::default();
        let bars = vec![DailyBar::new(date(2024, 1, 2), 1116.0, 1210.0, 1110.0, 1200.0)];

        let bench = bt.run_benchmark(10000.0, 1116.0, &bars);

        let units = 10000.0 / 1116.0;
        assert_eq!(bench.summary.units_held, units);
        assert_eq!(bench.summary.final_equity, units * 1200.0);
        assert!((bench.summary.final_equity - 10752.688).abs() < 1e-3);
        assert!((bench.summary.total_return_pct - 7.52688).abs() < 1e-4);
        assert_eq!(bench.rows.len(), 1);
    }

    #[test]
    fn test_benchmark_with_zero_capital() {
        let bt = Backtester::default();
        let bars = vec![flat_bar(date(2024, 1, 2), 100.0)];
        let bench = bt.run_benchmark(0.0, 100.0, &bars);
        assert_eq!(bench.summary.total_return_pct, 0.0);
    }

    #[test]
    fn test_full_run() {
        let bt = Backtester::default();
        let bars = vec![
            DailyBar::new(date(2020, 1, 30), 1000.0, 1012.0, 995.0, 1010.0),
            DailyBar::new(date(2020, 1, 31), 1010.0, 1015.0, 1000.0, 1005.0),
            DailyBar::new(date(2020, 2, 3), 1005.0, 1030.0, 1004.0, 1025.0),
            DailyBar::new(date(2020, 2, 4), 1025.0, 1030.0, 1020.0, 1028.0),
        ];

        let report = bt.run(&params("Monthly"), &bars).unwrap();

        assert_eq!(report.entry_price, 1000.0);
        assert!((report.leveraged.summary.initial_units - 30.7692307692).abs() < 1e-9);
        assert_eq!(report.leveraged.rows.len(), 4);
        assert_eq!(report.benchmark.rows.len(), 4);
        assert_eq!(report.metrics.trading_days, 4);
        assert_eq!(report.period(), Some((date(2020, 1, 30), date(2020, 2, 4))));

        // Only the first February day rebalances
        let actions: Vec<_> = report.leveraged.rows.iter().map(|r| r.action).collect();
        assert_eq!(actions[0], RebalanceAction::Hold);
        assert_eq!(actions[1], RebalanceAction::Hold);
        assert_ne!(actions[2], RebalanceAction::Hold);
        assert_eq!(actions[3], RebalanceAction::Hold);

        let text = report.to_string();
        assert!(text.contains("SURVIVED"));
        assert!(text.contains("BACKTEST RESULTS"));

        let table = report.rows_table(2);
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn test_run_rejects_bad_input() {
        let bt = Backtester::default();
        assert!(bt.run(&params("Never"), &[]).is_err());

        let mut bad = params("Never");
        bad.capital = -1.0;
        let bars = vec![flat_bar(date(2024, 1, 2), 100.0)];
        assert!(bt.run(&bad, &bars).is_err());
    }

    #[test]
    fn test_report_json_export() {
        let bt = Backtester::default();
        let bars = vec![flat_bar(date(2024, 1, 2), 100.0), flat_bar(date(2024, 1, 3), 101.0)];
        let report = bt.run(&params("Daily"), &bars).unwrap();

        let path = std::env::temp_dir()
            .join(format!("survival-bt-report-{}.json", std::process::id()));
        report.write_json(&path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["leveraged"]["rows"].as_array().unwrap().len(), 2);
        assert_eq!(written["params"]["rebalance_frequency"], "Daily");
        assert_eq!(written["leveraged"]["rows"][0]["date"], "2024-01-02");

        std::fs::remove_file(&path).ok();
    }
}
