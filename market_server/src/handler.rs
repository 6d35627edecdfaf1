//! Per-connection lifecycle.
//!
//! `ACCEPTED -> REGISTERED -> READING -> CLOSED`. A handler wraps the accepted
//! stream into a `Session`, registers it, then blocks reading inbound lines on
//! its own thread. Inbound lines are only logged for now. However the read loop
//! ends (EOF, I/O error, oversized line, or the registry closing the transport
//! during shutdown), a drop guard removes the session from the registry, so the
//! session is deregistered and closed on every exit path.

use std::io::{BufRead, BufReader, Read};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use market_common::Result;

use crate::registry::{Session, SessionId, SessionRegistry};

/// Longest inbound line accepted before the connection is dropped.
const MAX_INBOUND_LINE: usize = 64 * 1024;

/// Spawns and owns nothing but the recipe for serving one connection.
#[derive(Clone)]
pub struct SessionHandler {
    registry: Arc<SessionRegistry>,
    write_timeout: Duration,
}

impl SessionHandler {
    /// Create a handler that registers sessions in `registry`.
    pub fn new(registry: Arc<SessionRegistry>, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    /// Wrap `stream` into a session and register it.
    pub fn accept(&self, stream: TcpStream) -> Result<Arc<Session>> {
        let session = Arc::new(Session::new(self.registry.next_id(), stream, self.write_timeout)?);
        self.registry.register(Arc::clone(&session))?;
        Ok(session)
    }

    /// Accept `stream` and serve it on a dedicated thread.
    pub fn spawn(&self, stream: TcpStream) -> Result<JoinHandle<()>> {
        let session = self.accept(stream)?;
        let id = session.id();
        let guard = Deregister {
            registry: Arc::clone(&self.registry),
            id,
        };

        let spawned = thread::Builder::new()
            .name(format!("session-{}", id))
            .spawn(move || serve(session, guard));
        // A failed spawn drops the closure and with it the guard, which removes the session.
        Ok(spawned?)
    }
}

/// Removes its session from the registry when dropped.
struct Deregister {
    registry: Arc<SessionRegistry>,
    id: SessionId,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        if let Err(e) = self.registry.remove(self.id) {
            error!("Failed to deregister session {}: {}", self.id, e);
        }
    }
}

fn serve(session: Arc<Session>, _guard: Deregister) {
    info!("New connection from {}", session.peer());
    match read_loop(&session) {
        Ok(()) => debug!("Client {} disconnected", session.peer()),
        Err(e) if !session.is_alive() => debug!("Session {} closed while reading: {}", session.id(), e),
        Err(e) => error!("Error handling client {}: {}", session.peer(), e),
    }
}

fn read_loop(session: &Session) -> Result<()> {
    let mut reader = BufReader::new(session.reader()?);
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = (&mut reader)
            .take(MAX_INBOUND_LINE as u64)
            .read_until(b'\n', &mut line)?;
        if read == 0 {
            return Ok(());
        }
        if read == MAX_INBOUND_LINE && line.last() != Some(&b'\n') {
            warn!("Dropping {}: inbound line exceeds {} bytes", session.peer(), MAX_INBOUND_LINE);
            return Ok(());
        }
        info!(
            "Received message from {}: {}",
            session.peer(),
            String::from_utf8_lossy(&line).trim()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    fn accepted(listener: &TcpListener) -> (TcpStream, TcpStream) {
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (server, client)
    }

    #[test]
    fn session_is_deregistered_on_client_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let handler = SessionHandler::new(registry.clone(), Duration::from_millis(200));

        let (server, mut client) = accepted(&listener);
        let worker = handler.spawn(server).unwrap();
        assert_eq!(registry.len().unwrap(), 1);

        client.write_all(b"hello from bot\n").unwrap();
        drop(client);

        worker.join().unwrap();
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn registry_removal_unblocks_reader() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let handler = SessionHandler::new(registry.clone(), Duration::from_millis(200));

        let (server, _client) = accepted(&listener);
        let worker = handler.spawn(server).unwrap();
        let id = registry.list_active().unwrap()[0].id();

        assert!(registry.remove(id).unwrap());
        worker.join().unwrap();
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn oversized_line_drops_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let handler = SessionHandler::new(registry.clone(), Duration::from_millis(200));

        let (server, mut client) = accepted(&listener);
        let worker = handler.spawn(server).unwrap();

        client.write_all(&vec![b'x'; MAX_INBOUND_LINE + 10]).unwrap();
        worker.join().unwrap();
        assert!(registry.is_empty().unwrap());
    }
}
