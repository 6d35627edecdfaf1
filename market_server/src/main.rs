//! Market server binary.
//!
//! Binds the configured address, streams snapshots to every subscriber that
//! connects, and shuts down cleanly on Ctrl+C: the accept loop stops, all
//! sessions are closed and the process exits with status 0. A bind failure
//! exits with an error.
use clap::Parser;
use log::{error, info};
use market_common::{MarketError, Result, Shutdown};
use market_server::Publisher;

mod args;

use crate::args::Args;

fn main() -> Result<(), MarketError> {
    let args = Args::parse();
    init_logger(args.log_level);

    let config = args.into_config()?;
    info!("Symbols: {:?}", config.symbols);
    let publisher = Publisher::bind(config).inspect_err(|e| error!("Startup failed: {}", e))?;

    let (handle, shutdown) = Shutdown::channel();
    let mut handle = Some(handle);
    ctrlc::set_handler(move || {
        if let Some(handle) = handle.take() {
            info!("Interrupt received. Shutting down market server...");
            handle.trigger();
        }
    })
    .map_err(|e| MarketError::Config(format!("cannot install Ctrl+C handler: {}", e)))?;

    publisher.run(shutdown)
}

fn init_logger(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
