//! Error types shared between the market server and the trading bots.
//!
//! The `MarketError` enum unifies common failure cases for I/O, serialization,
//! configuration and session bookkeeping, allowing crates to propagate a
//! single error type.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type shared by server and bots.
#[derive(Error, Debug)]
pub enum MarketError {
    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// A snapshot line decoded as JSON but violates the wire format.
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Invalid startup parameters.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error while parsing a symbol list.
    #[error("Parse symbols error: {0}")]
    ParseSymbols(String),

    /// Could not reach the publisher.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        /// Address that was dialled.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// A session id was registered twice.
    #[error("Session {0} is already registered")]
    DuplicateSession(u64),

    /// A closed session was offered for registration.
    #[error("Session {0} is closed")]
    SessionClosed(u64),

    /// A worker thread panicked before it could be joined cleanly.
    #[error("Thread join failed: {0}")]
    ThreadJoin(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for MarketError {
    fn from(err: PoisonError<T>) -> Self {
        MarketError::MutexLock(err.to_string())
    }
}
