//! Snapshot consumer driving one `StrategyEngine`.
//!
//! A subscriber connects once through a [`Connector`], then reads newline
//! delimited snapshots. Malformed lines are logged and skipped; EOF or a reset
//! ends the subscriber for good (the default connector never reconnects).
//! Reads use a short timeout so the shutdown signal is noticed promptly.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::net::{Shutdown as NetShutdown, TcpStream};

use log::{debug, error, info};
use market_common::net::POLL_INTERVAL;
use market_common::{MarketConfig, MarketError, Result, Shutdown, Snapshot};

use crate::strategy::{Action, Position, StrategyEngine};

/// How a subscriber obtains its connection to the publisher.
///
/// Swap the implementation to add reconnect or backoff behaviour without
/// touching the strategy.
pub trait Connector: Send + Sync {
    /// Open a stream to `addr`.
    fn connect(&self, addr: &str) -> Result<TcpStream>;
}

/// Single attempt, no retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectOnce;

impl Connector for ConnectOnce {
    fn connect(&self, addr: &str) -> Result<TcpStream> {
        TcpStream::connect(addr).map_err(|source| MarketError::Connect {
            addr: addr.to_string(),
            source,
        })
    }
}

/// One step of reading the snapshot stream.
#[derive(Debug)]
pub enum Frame {
    /// A well-formed snapshot.
    Snapshot(Snapshot),
    /// A complete line that failed to decode.
    Malformed(MarketError),
    /// Nothing complete yet (read timeout or blank line).
    Idle,
    /// The publisher closed the stream.
    Closed,
}

/// Longest snapshot line accepted, delimiter included.
pub const MAX_SNAPSHOT_LINE: usize = 4 * 1024 * 1024;

/// Splits a byte stream into snapshot frames.
///
/// A line interrupted by a read timeout is kept and completed by later reads.
/// A line longer than [`MAX_SNAPSHOT_LINE`] is reported once as malformed and
/// the rest of it is skipped up to the next delimiter.
pub struct SnapshotReader<R> {
    reader: R,
    line: Vec<u8>,
    discarding: bool,
}

impl<R: BufRead> SnapshotReader<R> {
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            discarding: false,
        }
    }

    /// Read until one line completes, the read times out, or the stream ends.
    pub fn next_frame(&mut self) -> Result<Frame> {
        let budget = (MAX_SNAPSHOT_LINE - self.line.len()) as u64;
        match (&mut self.reader).take(budget).read_until(b'\n', &mut self.line) {
            Ok(0) => Ok(Frame::Closed),
            Ok(_) => {
                let complete = self.line.last() == Some(&b'\n');
                if !complete && self.line.len() >= MAX_SNAPSHOT_LINE {
                    self.line.clear();
                    if std::mem::replace(&mut self.discarding, true) {
                        return Ok(Frame::Idle);
                    }
                    return Ok(Frame::Malformed(MarketError::MalformedSnapshot(format!(
                        "line exceeds {} bytes",
                        MAX_SNAPSHOT_LINE
                    ))));
                }

                let line = std::mem::take(&mut self.line);
                if std::mem::replace(&mut self.discarding, false) || line.trim_ascii().is_empty() {
                    return Ok(Frame::Idle);
                }
                Ok(match Snapshot::from_line(&line) {
                    Ok(snapshot) => Frame::Snapshot(snapshot),
                    Err(e) => Frame::Malformed(e),
                })
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                Ok(Frame::Idle)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Summary returned when a subscriber stops.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberReport {
    /// Subscriber identity.
    pub id: String,
    /// Well-formed snapshots processed.
    pub snapshots_seen: u64,
    /// Buys and sells executed.
    pub trades_executed: u64,
    /// Lines discarded as malformed.
    pub malformed_messages: u64,
    /// Final positions by symbol.
    pub positions: BTreeMap<String, Position>,
}

/// One trading bot: a connection, a strategy and private positions.
pub struct Subscriber {
    id: String,
    addr: String,
    engine: StrategyEngine,
    positions: BTreeMap<String, Position>,
    snapshots_seen: u64,
    trades_executed: u64,
    malformed_messages: u64,
}

impl Subscriber {
    /// Create a subscriber for the publisher at `config.addr()`.
    pub fn new(id: impl Into<String>, config: &MarketConfig, seed: Option<u64>) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            addr: config.addr(),
            engine: StrategyEngine::new(config, seed)?,
            positions: BTreeMap::new(),
            snapshots_seen: 0,
            trades_executed: 0,
            malformed_messages: 0,
        })
    }

    /// Identity used in logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Positions by symbol, created on first sight of a symbol.
    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    /// Snapshots processed so far.
    pub fn snapshots_seen(&self) -> u64 {
        self.snapshots_seen
    }

    /// Buys and sells executed so far.
    pub fn trades_executed(&self) -> u64 {
        self.trades_executed
    }

    /// Run the strategy over every symbol of `snapshot`, in symbol order.
    pub fn on_snapshot(&mut self, snapshot: &Snapshot) -> Vec<(String, Action)> {
        self.snapshots_seen += 1;
        let mut actions = Vec::with_capacity(snapshot.len());

        for quote in snapshot.quotes() {
            let before = self.positions.get(&quote.symbol).copied().unwrap_or_default();
            let (action, after) = self.engine.decide(&quote.symbol, snapshot, before);
            self.positions.insert(quote.symbol.clone(), after);

            match action {
                Action::Buy => info!(
                    "BOT {} - STRATEGY: Buying {} of {} at ${}",
                    self.id,
                    after.quantity - before.quantity,
                    quote.symbol,
                    quote.price
                ),
                Action::Sell => info!(
                    "BOT {} - STRATEGY: Selling {} of {} at ${}",
                    self.id,
                    before.quantity - after.quantity,
                    quote.symbol,
                    quote.price
                ),
                Action::Hold => {}
            }
            if action != Action::Hold {
                self.trades_executed += 1;
            }
            actions.push((quote.symbol.clone(), action));
        }
        actions
    }

    /// Connect through `connector` and trade until EOF or shutdown.
    pub fn run<C: Connector + ?Sized>(&mut self, connector: &C, shutdown: &Shutdown) -> Result<SubscriberReport> {
        let stream = connector.connect(&self.addr).inspect_err(|e| {
            error!("BOT {} could not connect to market server: {}", self.id, e);
        })?;
        info!("BOT {} connected to market server", self.id);

        stream.set_read_timeout(Some(POLL_INTERVAL))?;
        let closer = stream.try_clone()?;
        let mut reader = SnapshotReader::new(BufReader::new(stream));
        let outcome = self.consume(&mut reader, shutdown);

        if let Err(e) = closer.shutdown(NetShutdown::Both) {
            debug!("BOT {} socket already closed: {}", self.id, e);
        }
        outcome.inspect_err(|e| error!("BOT {} - Error in market data processing: {}", self.id, e))?;
        Ok(self.report())
    }

    /// Feed frames from `reader` into the strategy until the stream ends or
    /// `shutdown` fires.
    pub fn consume<R: BufRead>(&mut self, reader: &mut SnapshotReader<R>, shutdown: &Shutdown) -> Result<()> {
        while !shutdown.is_triggered() {
            match reader.next_frame()? {
                Frame::Snapshot(snapshot) => {
                    self.on_snapshot(&snapshot);
                }
                Frame::Malformed(e) => {
                    self.malformed_messages += 1;
                    error!("BOT {} - Invalid market data received: {}", self.id, e);
                }
                Frame::Idle => {}
                Frame::Closed => {
                    info!("BOT {} - market server closed the connection", self.id);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Current counters and positions.
    pub fn report(&self) -> SubscriberReport {
        SubscriberReport {
            id: self.id.clone(),
            snapshots_seen: self.snapshots_seen,
            trades_executed: self.trades_executed,
            malformed_messages: self.malformed_messages,
            positions: self.positions.clone(),
        }
    }
}
