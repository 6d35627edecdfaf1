//! Command-line arguments for the market server.
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;
use market_common::net::{DEFAULT_HOST, DEFAULT_PORT};
use market_common::symbols::{default_symbols, parse_symbol_list, parse_symbols};
use market_common::{MarketConfig, MarketError, Result};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about = "Streams synthetic market snapshots to subscribers", long_about = None)]
pub struct Args {
    /// Host to listen on.
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// TCP port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Comma-separated symbols to price, e.g. `AAPL,MSFT`.
    #[arg(long, conflicts_with = "symbols_file")]
    pub symbols: Option<String>,

    /// File with symbols separated by commas, spaces or new lines.
    #[arg(long)]
    pub symbols_file: Option<PathBuf>,

    /// Milliseconds between broadcast ticks.
    #[arg(long, default_value_t = 100)]
    pub tick_ms: u64,

    /// Milliseconds a single snapshot write may take before the session is dropped.
    #[arg(long, default_value_t = 250)]
    pub write_timeout_ms: u64,

    /// Fixed seed for reproducible prices.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log verbosity (error, warn, info, debug, trace). `RUST_LOG` overrides it.
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

impl Args {
    /// Resolve the arguments into the publisher's configuration.
    pub fn into_config(self) -> Result<MarketConfig> {
        let symbols = match (&self.symbols, &self.symbols_file) {
            (Some(list), _) => parse_symbol_list(list)?,
            (None, Some(path)) => {
                let file = File::open(path).map_err(|e| {
                    MarketError::Config(format!("cannot open {}: {}", path.display(), e))
                })?;
                parse_symbols(BufReader::new(file))?
            }
            (None, None) => default_symbols(),
        };

        Ok(MarketConfig {
            host: self.host,
            port: self.port,
            symbols,
            tick_interval: Duration::from_millis(self.tick_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            seed: self.seed,
            ..MarketConfig::default()
        })
    }
}
