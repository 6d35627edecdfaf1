//! Tick loop that prices every symbol and fans the snapshot out to all sessions.
//!
//! One cycle is: tick (build a fresh `Snapshot`, replacing the previous one as a
//! whole), serialize it once, write the same line to every live session, then
//! sleep for the tick interval. A session whose write fails or times out is
//! removed from the registry on the spot; the other sessions still get the line.
//! The loop ends only when the shutdown signal fires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, error, info, warn};
use market_common::{MarketConfig, Result, Shutdown, Snapshot};

use crate::model::price_generator::PriceGenerator;
use crate::registry::{Session, SessionId, SessionRegistry};

/// Result of pushing one snapshot to the registry.
#[derive(Debug, Default, PartialEq)]
pub struct BroadcastOutcome {
    /// Sessions that accepted the full line.
    pub delivered: usize,
    /// Sessions removed because their write failed.
    pub dropped: Vec<SessionId>,
}

/// Owner of the current snapshot and of the broadcast cadence.
pub struct Broadcaster {
    symbols: Vec<String>,
    generator: PriceGenerator,
    registry: Arc<SessionRegistry>,
    interval: Duration,
    current: Arc<Snapshot>,
    started: Instant,
    ticks: u64,
    feed: Option<Sender<Snapshot>>,
}

impl Broadcaster {
    /// Build a broadcaster for the configured symbols and cadence.
    pub fn new(config: &MarketConfig, registry: Arc<SessionRegistry>) -> Self {
        Self {
            symbols: config.symbols.clone(),
            generator: PriceGenerator::new(config.seed),
            registry,
            interval: config.tick_interval,
            current: Arc::new(Snapshot::default()),
            started: Instant::now(),
            ticks: 0,
            feed: None,
        }
    }

    /// Also publish every tick's snapshot to `feed`. Full feeds skip ticks.
    pub fn with_feed(mut self, feed: Sender<Snapshot>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Snapshot produced by the latest tick (empty before the first one).
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current)
    }

    /// Number of ticks produced so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Compute the next snapshot and make it current.
    pub fn tick(&mut self) -> Arc<Snapshot> {
        let timestamp = self.started.elapsed().as_secs_f64();
        let next = self
            .generator
            .next_snapshot(&self.symbols, &self.current, timestamp);
        self.current = Arc::new(next);
        self.ticks += 1;
        self.publish_to_feed();
        self.current()
    }

    /// Write `snapshot` to every live session, removing the ones that fail.
    pub fn broadcast(&self, snapshot: &Snapshot) -> Result<BroadcastOutcome> {
        let payload = snapshot.to_line()?;
        Ok(self.deliver(self.registry.list_active()?, &payload))
    }

    fn deliver(&self, sessions: Vec<Arc<Session>>, payload: &[u8]) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        for session in sessions {
            match session.send(payload) {
                Ok(()) => outcome.delivered += 1,
                // Only the call that actually removed the session reports it.
                Err(e) => match self.registry.remove(session.id()) {
                    Ok(true) => {
                        warn!("Error broadcasting to client {}: {}", session.peer(), e);
                        outcome.dropped.push(session.id());
                    }
                    Ok(false) => debug!("Session {} already closed: {}", session.id(), e),
                    Err(remove_err) => {
                        error!("Failed to remove session {}: {}", session.id(), remove_err)
                    }
                },
            }
        }
        outcome
    }

    /// Run ticks until `shutdown` fires.
    pub fn run(mut self, shutdown: Shutdown) {
        info!(
            "Broadcaster started: {} symbols every {:?}",
            self.symbols.len(),
            self.interval
        );

        loop {
            let snapshot = self.tick();
            match self.broadcast(&snapshot) {
                Ok(outcome) => debug!(
                    "Tick {}: delivered to {}, dropped {}",
                    self.ticks,
                    outcome.delivered,
                    outcome.dropped.len()
                ),
                Err(e) => error!("Tick {} broadcast failed: {}", self.ticks, e),
            }

            if shutdown.wait_timeout(self.interval) {
                break;
            }
        }
        info!("Broadcaster stopped after {} ticks", self.ticks);
    }

    fn publish_to_feed(&mut self) {
        let Some(feed) = &self.feed else {
            return;
        };
        match feed.try_send(self.current.as_ref().clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Tick feed full, skipping tick {}", self.ticks),
            Err(TrySendError::Disconnected(_)) => self.feed = None,
        }
    }
}
