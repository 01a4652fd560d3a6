//! Calculator for run metrics: drawdown, volatility, Sharpe, rebalance counts.

use statrs::statistics::Statistics;

use crate::models::{BenchmarkRow, DailyRow, EquityMetrics, RebalanceAction, RunMetrics};

/// Trading days per year used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Calculator for metrics over the simulation output.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate metrics for a leveraged run and its benchmark.
    pub fn calculate(
        capital: f64,
        entry_price: f64,
        initial_units: f64,
        rows: &[DailyRow],
        benchmark: &[BenchmarkRow],
    ) -> RunMetrics {
        let mut metrics = RunMetrics {
            trading_days: rows.len(),
            ..Default::default()
        };

        if capital > 0.0 {
            metrics.entry_leverage = initial_units * entry_price / capital;
        }

        for row in rows {
            match row.action {
                RebalanceAction::Buy => metrics.buy_rebalances += 1,
                RebalanceAction::Sell => metrics.sell_rebalances += 1,
                RebalanceAction::Hold => {}
            }
        }

        if let Some(tightest) = rows.iter().min_by(|a, b| {
            (a.equity - a.trigger_level).total_cmp(&(b.equity - b.trigger_level))
        }) {
            metrics.min_headroom = tightest.equity - tightest.trigger_level;
            metrics.min_headroom_date = Some(tightest.date);
        }

        let leveraged: Vec<f64> = rows.iter().map(|r| r.equity).collect();
        let buy_and_hold: Vec<f64> = benchmark.iter().map(|r| r.equity).collect();

        metrics.leveraged = Self::equity_metrics(capital, &leveraged);
        metrics.benchmark = Self::equity_metrics(capital, &buy_and_hold);

        metrics
    }

    /// Risk statistics for an equity curve that started at `capital`.
    pub fn equity_metrics(capital: f64, equity: &[f64]) -> EquityMetrics {
        let mut metrics = EquityMetrics {
            max_drawdown: Self::max_drawdown(capital, equity),
            ..Default::default()
        };

        let returns = Self::daily_returns(capital, equity);
        if returns.len() < 2 {
            return metrics;
        }

        let mean = returns.iter().mean();
        let std_dev = returns.iter().std_dev();

        if std_dev.is_finite() && std_dev > 0.0 {
            metrics.annualized_volatility = std_dev * TRADING_DAYS_PER_YEAR.sqrt();
            metrics.sharpe_ratio = (mean / std_dev) * TRADING_DAYS_PER_YEAR.sqrt();
        }

        metrics
    }

    /// Largest fall from a running peak, as a fraction of that peak.
    pub fn max_drawdown(capital: f64, equity: &[f64]) -> f64 {
        let mut peak = capital;
        let mut max_dd = 0.0f64;

        for &value in equity {
            if value > peak {
                peak = value;
            }

            if peak > 0.0 {
                let dd = (peak - value) / peak;
                if dd > max_dd {
                    max_dd = dd;
                }
            }
        }

        max_dd
    }

    /// Simple day-over-day returns, starting from `capital`.
    fn daily_returns(capital: f64, equity: &[f64]) -> Vec<f64> {
        std::iter::once(capital)
            .chain(equity.iter().copied())
            .collect::<Vec<_>>()
            .windows(2)
            .filter_map(|w| (w[0] > 0.0).then(|| (w[1] - w[0]) / w[0]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(day: u32, equity: f64, trigger_level: f64, action: RebalanceAction) -> DailyRow {
        DailyRow {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            equity,
            cumulative_cost: 0.0,
            trigger_level,
            units: 10.0,
            unit_change: 0.0,
            action,
        }
    }

    #[test]
    fn test_max_drawdown() {
        let equity = [110.0, 90.0, 120.0, 96.0, 130.0];
        let dd = MetricsCalculator::max_drawdown(100.0, &equity);
        // Peak 120 -> 96 is a 20% drawdown
        assert!((dd - 0.2).abs() < 1e-12);

        assert_eq!(MetricsCalculator::max_drawdown(100.0, &[]), 0.0);
        assert_eq!(MetricsCalculator::max_drawdown(100.0, &[101.0, 102.0]), 0.0);
    }

    #[test]
    fn test_flat_curve_has_no_volatility() {
        let m = MetricsCalculator::equity_metrics(100.0, &[100.0, 100.0, 100.0]);
        assert_eq!(m.annualized_volatility, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
    }

    #[test]
    fn test_rising_curve_has_positive_sharpe() {
        let m = MetricsCalculator::equity_metrics(100.0, &[101.0, 103.0, 104.0, 107.0]);
        assert!(m.sharpe_ratio > 0.0);
        assert!(m.annualized_volatility > 0.0);
    }

    #[test]
    fn test_run_metrics() {
        let rows = vec![
            row(2, 10000.0, 500.0, RebalanceAction::Hold),
            row(3, 9000.0, 480.0, RebalanceAction::Sell),
            row(4, 9500.0, 490.0, RebalanceAction::Buy),
            row(5, 9800.0, 495.0, RebalanceAction::Buy),
        ];
        let benchmark: Vec<BenchmarkRow> = rows
            .iter()
            .map(|r| BenchmarkRow { date: r.date, equity: 10000.0 })
            .collect();

        let m = MetricsCalculator::calculate(10000.0, 1000.0, 30.0, &rows, &benchmark);

        assert_eq!(m.trading_days, 4);
        assert_eq!(m.buy_rebalances, 2);
        assert_eq!(m.sell_rebalances, 1);
        assert!((m.entry_leverage - 3.0).abs() < 1e-12);
        assert_eq!(m.min_headroom, 9000.0 - 480.0);
        assert_eq!(m.min_headroom_date, NaiveDate::from_ymd_opt(2024, 1, 3));
        assert!((m.leveraged.max_drawdown - 0.1).abs() < 1e-12);
        assert_eq!(m.benchmark.max_drawdown, 0.0);
    }

    #[test]
    fn test_empty_run() {
        let m = MetricsCalculator::calculate(10000.0, 1000.0, 30.0, &[], &[]);
        assert_eq!(m.trading_days, 0);
        assert_eq!(m.min_headroom_date, None);
        assert_eq!(m.leveraged, EquityMetrics::default());
    }
}
