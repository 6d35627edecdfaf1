//! Registry of connected subscriber sessions.
//!
//! The registry is the only structure shared between the accept side (session
//! handlers adding and removing themselves) and the broadcast loop (iterating
//! over live sessions). Sessions are kept in a `BTreeMap` behind one `Mutex`;
//! readers get a cloned list so iteration never holds the lock.
//!
//! [`SessionRegistry::remove`] is the single place a session's transport is
//! shut down. It is idempotent: removing an unknown id is a no-op.

use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info};
use market_common::{MarketError, Result};

/// Identity of a session within one registry.
pub type SessionId = u64;

/// One accepted subscriber connection.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    stream: TcpStream,
    write_timeout: Duration,
    alive: AtomicBool,
}

impl Session {
    /// Wrap an accepted stream; every [`Self::send`] on it is bounded by `write_timeout`.
    pub fn new(id: SessionId, stream: TcpStream, write_timeout: Duration) -> Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        Ok(Self {
            id,
            peer,
            stream,
            write_timeout,
            alive: AtomicBool::new(true),
        })
    }

    /// Registry-local identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Remote address, used as display identity in logs.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// `false` once the registry has closed the transport.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Independent handle for the inbound direction of the connection.
    pub fn reader(&self) -> Result<TcpStream> {
        Ok(self.stream.try_clone()?)
    }

    /// Write one complete payload, failing fast if the session was closed.
    ///
    /// The whole payload must be accepted within the session's write timeout,
    /// counted from the call, however many partial writes that takes. Otherwise
    /// the call fails with `ErrorKind::TimedOut`.
    pub fn send(&self, payload: &[u8]) -> io::Result<()> {
        if !self.is_alive() {
            return Err(io::Error::new(ErrorKind::NotConnected, "session closed"));
        }
        let deadline = Instant::now() + self.write_timeout;
        let mut pending = payload;

        while !pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(io::Error::new(
                    ErrorKind::TimedOut,
                    format!("{} bytes unsent after {:?}", pending.len(), self.write_timeout),
                ));
            }
            self.stream.set_write_timeout(Some(remaining))?;
            match (&self.stream).write(pending) {
                Ok(0) => return Err(io::Error::new(ErrorKind::WriteZero, "peer accepted no bytes")),
                Ok(written) => pending = &pending[written..],
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(io::Error::new(ErrorKind::TimedOut, e));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn close(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotConnected => {}
            Err(e) => debug!("Shutdown of session {} ({}) failed: {}", self.id, self.peer, e),
        }
    }
}

/// Thread-safe set of live sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<BTreeMap<SessionId, Arc<Session>>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a session about to be created.
    pub fn next_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Add a live session. Each id may be registered once.
    pub fn register(&self, session: Arc<Session>) -> Result<()> {
        if !session.is_alive() {
            return Err(MarketError::SessionClosed(session.id()));
        }
        let mut sessions = self.sessions.lock()?;
        if sessions.contains_key(&session.id()) {
            return Err(MarketError::DuplicateSession(session.id()));
        }
        info!("Session {} registered for {}", session.id(), session.peer());
        sessions.insert(session.id(), session);
        Ok(())
    }

    /// Drop a session and shut its transport down.
    ///
    /// Returns `true` if the session was present. Removing an absent id leaves
    /// the registry untouched.
    pub fn remove(&self, id: SessionId) -> Result<bool> {
        let removed = self.sessions.lock()?.remove(&id);
        match removed {
            Some(session) => {
                session.close();
                info!("Connection closed for {}", session.peer());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Snapshot of the live sessions, safe to iterate while the registry changes.
    pub fn list_active(&self) -> Result<Vec<Arc<Session>>> {
        Ok(self.sessions.lock()?.values().cloned().collect())
    }

    /// Remove every session, returning how many were closed.
    pub fn close_all(&self) -> Result<usize> {
        let drained = std::mem::take(&mut *self.sessions.lock()?);
        for session in drained.values() {
            session.close();
        }
        if !drained.is_empty() {
            info!("Closed {} remaining session(s)", drained.len());
        }
        Ok(drained.len())
    }

    /// Number of live sessions.
    pub fn len(&self) -> Result<usize> {
        Ok(self.sessions.lock()?.len())
    }

    /// `true` if no session is registered.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    /// Returns (server side, client side) of a loopback connection.
    fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (server, client)
    }

    fn session(registry: &SessionRegistry) -> (Arc<Session>, TcpStream) {
        let (server, client) = pair();
        let session = Session::new(registry.next_id(), server, Duration::from_millis(200)).unwrap();
        (Arc::new(session), client)
    }

    #[test]
    fn register_and_list() {
        let registry = SessionRegistry::new();
        let (a, _ca) = session(&registry);
        let (b, _cb) = session(&registry);
        registry.register(a.clone()).unwrap();
        registry.register(b.clone()).unwrap();

        let ids: Vec<_> = registry.list_active().unwrap().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = SessionRegistry::new();
        let (a, _ca) = session(&registry);
        registry.register(a.clone()).unwrap();
        assert!(matches!(registry.register(a), Err(MarketError::DuplicateSession(_))));
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn remove_twice_is_same_as_once() {
        let registry = SessionRegistry::new();
        let (a, _ca) = session(&registry);
        let (b, _cb) = session(&registry);
        registry.register(a.clone()).unwrap();
        registry.register(b.clone()).unwrap();

        assert!(registry.remove(a.id()).unwrap());
        let after_once: Vec<_> = registry.list_active().unwrap().iter().map(|s| s.id()).collect();
        assert!(!registry.remove(a.id()).unwrap());
        let after_twice: Vec<_> = registry.list_active().unwrap().iter().map(|s| s.id()).collect();

        assert_eq!(after_once, after_twice);
        assert_eq!(after_twice, vec![b.id()]);
    }

    #[test]
    fn remove_closes_transport() {
        let registry = SessionRegistry::new();
        let (a, mut client) = session(&registry);
        registry.register(a.clone()).unwrap();
        registry.remove(a.id()).unwrap();

        assert!(!a.is_alive());
        assert!(a.send(b"late\n").is_err());
        let mut buf = [0u8; 8];
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        assert_eq!(client.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn send_to_stalled_peer_times_out_within_deadline() {
        let (server, _client) = pair();
        let timeout = Duration::from_millis(100);
        let session = Session::new(0, server, timeout).unwrap();

        // Far larger than any loopback socket buffer, and the client never reads.
        let payload = vec![b'x'; 64 * 1024 * 1024];
        let started = Instant::now();
        let err = session.send(&payload).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TimedOut);
        assert!(
            started.elapsed() < timeout + Duration::from_millis(400),
            "send took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn closed_session_cannot_be_registered_again() {
        let registry = SessionRegistry::new();
        let (a, _ca) = session(&registry);
        registry.register(a.clone()).unwrap();
        registry.remove(a.id()).unwrap();
        assert!(matches!(registry.register(a), Err(MarketError::SessionClosed(_))));
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn list_is_a_copy() {
        let registry = SessionRegistry::new();
        let (a, _ca) = session(&registry);
        registry.register(a.clone()).unwrap();
        let listed = registry.list_active().unwrap();
        registry.remove(a.id()).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn close_all_empties_registry() {
        let registry = SessionRegistry::new();
        let (a, _ca) = session(&registry);
        let (b, _cb) = session(&registry);
        registry.register(a.clone()).unwrap();
        registry.register(b.clone()).unwrap();
        assert_eq!(registry.close_all().unwrap(), 2);
        assert!(!a.is_alive() && !b.is_alive());
        assert!(registry.is_empty().unwrap());
    }
}
