//! Trading bot launcher.
//!
//! Starts the configured number of bots against the market server and waits
//! for all of them. Ctrl+C stops every bot; a bot also stops on its own when the
//! server goes away.
use std::sync::Arc;

use clap::Parser;
use log::info;
use market_common::{MarketError, Result, Shutdown};
use trading_bot::ConnectOnce;
use trading_bot::launcher::{join_bots, spawn_bots};

mod args;

use crate::args::Args;

fn main() -> Result<(), MarketError> {
    let args = Args::parse();
    init_logger(args.log_level);
    let config = args.into_config();

    let (handle, shutdown) = Shutdown::channel();
    let mut handle = Some(handle);
    ctrlc::set_handler(move || {
        if let Some(handle) = handle.take() {
            info!("Interrupt received. Trading bots shutting down...");
            handle.trigger();
        }
    })
    .map_err(|e| MarketError::Config(format!("cannot install Ctrl+C handler: {}", e)))?;

    let bots = spawn_bots(&config, Arc::new(ConnectOnce), &shutdown)?;
    let reports = join_bots(bots);
    info!("{} of {} bots finished cleanly", reports.len(), config.subscribers);
    Ok(())
}

fn init_logger(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
