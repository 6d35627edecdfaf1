//! Publisher: accept loop plus broadcast loop over one shared registry.
//!
//! `Publisher::bind` claims the listen address (a bind failure is fatal to the
//! caller). `Publisher::run` then starts the broadcaster thread and accepts
//! connections until the shutdown signal fires. Shutdown stops accepting,
//! stops the broadcaster, closes every remaining session through the registry
//! and joins all session threads before returning.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};
use log::{error, info, warn};
use market_common::net::POLL_INTERVAL;
use market_common::{MarketConfig, MarketError, Result, Shutdown, Snapshot};

use crate::broadcaster::Broadcaster;
use crate::handler::SessionHandler;
use crate::registry::SessionRegistry;

/// Bound listener plus everything needed to serve it.
pub struct Publisher {
    config: MarketConfig,
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    feed: Option<Sender<Snapshot>>,
}

impl Publisher {
    /// Validate `config` and bind its listen address.
    pub fn bind(config: MarketConfig) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.addr())?;
        info!("Serving on {}", listener.local_addr()?);
        Ok(Self {
            config,
            listener,
            registry: Arc::new(SessionRegistry::new()),
            feed: None,
        })
    }

    /// Address actually bound (useful with port `0`).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared session registry.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Receive a copy of every tick's snapshot. At most `capacity` ticks are
    /// buffered; further ticks are skipped until the receiver catches up.
    pub fn tick_feed(&mut self, capacity: usize) -> Receiver<Snapshot> {
        let (tx, rx) = bounded(capacity);
        self.feed = Some(tx);
        rx
    }

    /// Serve until `shutdown` fires.
    pub fn run(self, shutdown: Shutdown) -> Result<()> {
        let Publisher {
            config,
            listener,
            registry,
            feed,
        } = self;
        listener.set_nonblocking(true)?;

        let mut broadcaster = Broadcaster::new(&config, Arc::clone(&registry));
        if let Some(feed) = feed {
            broadcaster = broadcaster.with_feed(feed);
        }
        let broadcast_shutdown = shutdown.clone();
        let broadcast = thread::Builder::new()
            .name("broadcaster".to_string())
            .spawn(move || broadcaster.run(broadcast_shutdown))?;

        let handler = SessionHandler::new(Arc::clone(&registry), config.write_timeout);
        let mut sessions: Vec<JoinHandle<()>> = Vec::new();

        while !shutdown.is_triggered() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        warn!("Rejecting {}: {}", peer, e);
                        continue;
                    }
                    match handler.spawn(stream) {
                        Ok(worker) => sessions.push(worker),
                        Err(e) => error!("Failed to start session for {}: {}", peer, e),
                    }
                    sessions.retain(|worker| !worker.is_finished());
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    shutdown.wait_timeout(POLL_INTERVAL);
                }
                Err(e) => {
                    error!("Accept failed: {}", e);
                    shutdown.wait_timeout(POLL_INTERVAL);
                }
            }
        }

        info!("Market server shutting down...");
        drop(listener);
        stop_workers(broadcast, &registry, sessions)?;
        info!("Market server stopped");
        Ok(())
    }
}

/// Join the broadcaster, close every session and join the session threads.
///
/// Sessions are closed and joined even when the broadcaster panicked; the first
/// failure is returned once teardown is complete.
fn stop_workers(broadcast: JoinHandle<()>, registry: &SessionRegistry, sessions: Vec<JoinHandle<()>>) -> Result<()> {
    let joined = broadcast.join().map_err(|_| {
        error!("Broadcaster thread panicked");
        MarketError::ThreadJoin("broadcaster".to_string())
    });
    let closed = registry.close_all();
    if let Err(e) = &closed {
        error!("Failed to close sessions: {}", e);
    }
    for worker in sessions {
        if worker.join().is_err() {
            error!("A session thread panicked during shutdown");
        }
    }
    joined?;
    closed.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Session;
    use pretty_assertions::assert_eq;
    use std::io::{BufRead, BufReader, Read};
    use std::net::TcpStream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    fn config() -> MarketConfig {
        MarketConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            seed: Some(1),
            ..MarketConfig::default()
        }
    }

    #[test]
    fn bind_rejects_invalid_config() {
        let mut config = config();
        config.symbols.clear();
        assert!(matches!(Publisher::bind(config), Err(MarketError::Config(_))));
    }

    #[test]
    fn bind_conflict_is_an_error() {
        let first = Publisher::bind(config()).unwrap();
        let mut taken = config();
        taken.port = first.local_addr().unwrap().port();
        assert!(matches!(Publisher::bind(taken), Err(MarketError::Io(_))));
    }

    #[test]
    fn broadcaster_panic_still_closes_and_joins_sessions() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let registry = SessionRegistry::new();
        let _client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        let session = Arc::new(Session::new(registry.next_id(), server, Duration::from_millis(200)).unwrap());
        registry.register(session.clone()).unwrap();

        let finished = Arc::new(AtomicBool::new(false));
        let mut inbound = session.reader().unwrap();
        let flag = Arc::clone(&finished);
        let worker = thread::spawn(move || {
            let mut buf = [0u8; 64];
            while matches!(inbound.read(&mut buf), Ok(n) if n > 0) {}
            flag.store(true, Ordering::SeqCst);
        });
        let broadcast = thread::spawn(|| panic!("broadcaster failure"));

        let result = stop_workers(broadcast, &registry, vec![worker]);

        assert!(matches!(result, Err(MarketError::ThreadJoin(ref name)) if name == "broadcaster"));
        assert_eq!(registry.len().unwrap(), 0);
        assert!(!session.is_alive());
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn shutdown_closes_sessions_and_returns() {
        let publisher = Publisher::bind(config()).unwrap();
        let addr = publisher.local_addr().unwrap();
        let registry = publisher.registry();
        let (handle, shutdown) = Shutdown::channel();
        let server = thread::spawn(move || publisher.run(shutdown));

        let client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut reader = BufReader::new(client);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(Snapshot::from_line(line.as_bytes()).unwrap().len(), 5);
        assert_eq!(registry.len().unwrap(), 1);

        let started = Instant::now();
        handle.trigger();
        server.join().unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(registry.is_empty().unwrap());

        // Drain whatever was in flight; the stream must end with EOF.
        let mut rest = String::new();
        loop {
            rest.clear();
            if reader.read_line(&mut rest).unwrap() == 0 {
                break;
            }
        }
    }
}
