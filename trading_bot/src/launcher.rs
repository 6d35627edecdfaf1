//! Runs a population of subscribers, one thread each.
//!
//! Bots are named `Bot_1..Bot_N`. They share nothing but the shutdown signal; a
//! failing bot ends on its own without affecting the others.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info};
use market_common::{MarketConfig, MarketError, Result, Shutdown};

use crate::subscriber::{Connector, Subscriber, SubscriberReport};

/// Handle to one running bot.
pub type BotHandle = JoinHandle<Result<SubscriberReport>>;

/// Start `config.subscribers` bots connecting through `connector`.
///
/// Bot `i` is seeded with `config.seed + i` when the run is seeded.
pub fn spawn_bots(
    config: &MarketConfig,
    connector: Arc<dyn Connector>,
    shutdown: &Shutdown,
) -> Result<Vec<BotHandle>> {
    config.validate()?;
    let mut handles = Vec::with_capacity(config.subscribers);

    for index in 0..config.subscribers {
        let id = format!("Bot_{}", index + 1);
        let mut bot = Subscriber::new(id.clone(), config, config.seed_for(index as u64))?;
        let connector = Arc::clone(&connector);
        let shutdown = shutdown.clone();

        let handle = thread::Builder::new()
            .name(id)
            .spawn(move || bot.run(connector.as_ref(), &shutdown))?;
        handles.push(handle);
    }
    info!("Started {} trading bots against {}", handles.len(), config.addr());
    Ok(handles)
}

/// Wait for every bot, logging each summary. Returns the successful reports.
pub fn join_bots(handles: Vec<BotHandle>) -> Vec<SubscriberReport> {
    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        let name = handle.thread().name().unwrap_or("bot").to_string();
        match handle.join() {
            Ok(Ok(report)) => {
                info!(
                    "BOT {} finished: {} snapshots, {} trades, {} malformed",
                    report.id, report.snapshots_seen, report.trades_executed, report.malformed_messages
                );
                reports.push(report);
            }
            Ok(Err(e)) => error!("BOT {} stopped with error: {}", name, e),
            Err(_) => error!("{}", MarketError::ThreadJoin(name)),
        }
    }
    reports
}
