//! Startup parameters for the publisher and the subscriber population.
//!
//! A `MarketConfig` is built once in `main` (from CLI arguments) and handed by
//! value to whoever needs it. Nothing in the workspace reads configuration
//! from global state.

use std::time::Duration;

use crate::error::MarketError;
use crate::net::{self, DEFAULT_HOST, DEFAULT_PORT, TICK_INTERVAL, WRITE_TIMEOUT};
use crate::result::Result;
use crate::symbols::default_symbols;

/// Immutable configuration for one run of the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketConfig {
    /// Host the publisher listens on and subscribers connect to.
    pub host: String,
    /// TCP port of the snapshot stream. `0` asks the OS for a free port.
    pub port: u16,
    /// Symbols priced on every tick.
    pub symbols: Vec<String>,
    /// Number of subscribers the bot launcher starts.
    pub subscribers: usize,
    /// Pause between broadcast ticks.
    pub tick_interval: Duration,
    /// Bound on a single snapshot write to one session.
    pub write_timeout: Duration,
    /// Fixed random seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Smallest quantity a bot buys or sells in one trade.
    pub min_trade_quantity: u64,
    /// Largest quantity a bot buys in one trade.
    pub max_trade_quantity: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            symbols: default_symbols(),
            subscribers: 5,
            tick_interval: TICK_INTERVAL,
            write_timeout: WRITE_TIMEOUT,
            seed: None,
            min_trade_quantity: 10,
            max_trade_quantity: 100,
        }
    }
}

impl MarketConfig {
    /// `host:port` of the snapshot stream.
    pub fn addr(&self) -> String {
        net::addr(&self.host, self.port)
    }

    /// Checks the invariants the publisher and strategy rely on.
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(MarketError::Config("symbol list is empty".to_string()));
        }
        if self.tick_interval.is_zero() {
            return Err(MarketError::Config("tick interval must be positive".to_string()));
        }
        if self.write_timeout.is_zero() {
            return Err(MarketError::Config("write timeout must be positive".to_string()));
        }
        if self.min_trade_quantity == 0 || self.min_trade_quantity > self.max_trade_quantity {
            return Err(MarketError::Config(format!(
                "invalid trade quantity range [{}, {}]",
                self.min_trade_quantity, self.max_trade_quantity
            )));
        }
        Ok(())
    }

    /// Seed for the `index`-th worker, if the run is seeded.
    pub fn seed_for(&self, index: u64) -> Option<u64> {
        self.seed.map(|seed| seed.wrapping_add(index))
    }
}
