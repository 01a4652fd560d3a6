//! Leveraged Survival Strategy Backtester
//!
//! Sizes a leveraged position to survive a chosen market drop, walks it
//! through daily price history with carry costs, margin closeout and
//! optional rebalancing, and compares it with simple buy-and-hold.

mod api;
mod backtest;
mod metrics;
mod models;
mod trading;

use std::path::PathBuf;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{load_bars, MarketDataClient, DEFAULT_TICKER};
use crate::backtest::Backtester;
use crate::trading::{BrokerAssumptions, PositionSizer, SimulationParams};

/// Leveraged survival strategy backtester CLI.
#[derive(Parser)]
#[command(name = "survival-bt")]
#[command(about = "Backtest a leveraged survival strategy against buy-and-hold", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "SURVIVAL_BT_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest over daily price history
    Backtest {
        /// Ticker to fetch from the chart API
        #[arg(short, long, default_value = DEFAULT_TICKER, env = "SURVIVAL_BT_TICKER")]
        ticker: String,

        /// First day of the backtest (YYYY-MM-DD)
        #[arg(short, long, default_value = "2010-01-01", env = "SURVIVAL_BT_START")]
        start: NaiveDate,

        /// End of the backtest, exclusive (YYYY-MM-DD, defaults to today)
        #[arg(short, long, env = "SURVIVAL_BT_END")]
        end: Option<NaiveDate>,

        /// Initial capital shared by both strategies
        #[arg(short, long, default_value = "10000", env = "SURVIVAL_BT_CAPITAL")]
        capital: f64,

        /// Market drop to survive, in percent (10-70)
        #[arg(short, long, default_value = "30", env = "SURVIVAL_BT_MAX_DROP")]
        max_drop: f64,

        /// Rebalancing frequency (Never, Daily, Monthly, Quarterly)
        #[arg(short, long, default_value = "Never", env = "SURVIVAL_BT_FREQUENCY")]
        frequency: String,

        /// Read bars from a JSON file instead of fetching them
        #[arg(long, env = "SURVIVAL_BT_PRICES")]
        prices: Option<PathBuf>,

        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the first N daily rows
        #[arg(long, default_value = "0")]
        rows: usize,
    },

    /// Show the target unit count for a capital, price and max drop
    Size {
        /// Account equity
        #[arg(short, long, default_value = "10000", env = "SURVIVAL_BT_CAPITAL")]
        capital: f64,

        /// Entry price of the asset
        #[arg(short, long)]
        price: f64,

        /// Market drop to survive, in percent (10-70)
        #[arg(short, long, default_value = "30", env = "SURVIVAL_BT_MAX_DROP")]
        max_drop: f64,
    },

    /// Show the broker assumptions
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let assumptions = BrokerAssumptions::default();

    match cli.command {
        Commands::Backtest {
            ticker,
            start,
            end,
            capital,
            max_drop,
            frequency,
            prices,
            output,
            rows,
        } => {
            let end = end.unwrap_or_else(|| Local::now().date_naive());
            let params = SimulationParams::parse(capital, max_drop, &frequency, start, end)?;

            let bars = match &prices {
                Some(path) => load_bars(path)?,
                None => {
                    info!(ticker = %ticker, start = %start, end = %end, "Fetching price history");
                    MarketDataClient::new()?
                        .fetch_daily_bars(&ticker, start, end)
                        .await?
                }
            };

            let report = Backtester::new(assumptions).run(&params, &bars)?;

            println!("\n=== Leveraged Survival Strategy Backtest ===");
            match &prices {
                Some(path) => println!("Prices: {}", path.display()),
                None => println!("Ticker: {}", ticker),
            }
            println!("{}", report);

            if rows > 0 {
                println!("\n--- Daily Rows (first {}) ---", rows);
                print!("{}", report.rows_table(rows));
            }

            if let Some(path) = output {
                report.write_json(&path)?;
                println!("\nReport written to {}", path.display());
            }
        }

        Commands::Size {
            capital,
            price,
            max_drop,
        } => {
            let sizer = PositionSizer::new(assumptions);
            let units = sizer.target_units(capital, price, max_drop);

            println!("\n=== Position Sizing ===\n");
            println!("Capital:          ${:.2}", capital);
            println!("Entry Price:      {:.2}", price);
            println!("Market Drop:      {:.2}%", max_drop);
            println!("Broker Buffer:    {:.2}%", assumptions.broker_buffer() * 100.0);
            println!("Total Buffer:     {:.2}%", sizer.total_buffer(max_drop) * 100.0);
            println!("Target Units:     {:.4}", units);
            println!("Notional:         ${:.2}", units * price);
            if capital > 0.0 {
                println!("Leverage:         {:.2}x", units * price / capital);
            }
            println!(
                "Closeout Level:   ${:.2}",
                assumptions.closeout_level(price, units)
            );
        }

        Commands::Config => {
            println!("\n=== Broker Assumptions ===\n");
            println!("  Annual Cost of Carry: {:.2}%", assumptions.annual_cost_of_carry * 100.0);
            println!("  Daily Cost Rate:      {:.6}%", assumptions.daily_cost_rate() * 100.0);
            println!("  Margin Requirement:   {:.2}% (1:{:.0} leverage)",
                assumptions.margin_requirement * 100.0,
                1.0 / assumptions.margin_requirement);
            println!(
                "  Margin Closeout:      {:.0}% of required margin",
                assumptions.margin_closeout * 100.0
            );
            println!("  Broker Buffer:        {:.2}%", assumptions.broker_buffer() * 100.0);
            println!("  Days per Year:        {}", assumptions.days_per_year);
        }
    }

    Ok(())
}
