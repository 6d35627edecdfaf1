//! Command-line arguments for the trading bot launcher.
use clap::Parser;
use log::LevelFilter;
use market_common::MarketConfig;
use market_common::net::{DEFAULT_HOST, DEFAULT_PORT};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about = "Runs trading bots against the market server", long_about = None)]
pub struct Args {
    /// Market server host.
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Market server port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Number of bots to run.
    #[arg(long, default_value_t = 5)]
    pub bots: usize,

    /// Smallest quantity per trade.
    #[arg(long, default_value_t = 10)]
    pub min_qty: u64,

    /// Largest quantity per buy.
    #[arg(long, default_value_t = 100)]
    pub max_qty: u64,

    /// Base seed; bot `i` uses `seed + i`.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log verbosity (error, warn, info, debug, trace). `RUST_LOG` overrides it.
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

impl Args {
    /// Resolve the arguments into the bots' configuration.
    pub fn into_config(self) -> MarketConfig {
        MarketConfig {
            host: self.host,
            port: self.port,
            subscribers: self.bots,
            seed: self.seed,
            min_trade_quantity: self.min_qty,
            max_trade_quantity: self.max_qty,
            ..MarketConfig::default()
        }
    }
}
