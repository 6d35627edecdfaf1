//! Shared networking defaults and timing constants used by server and bots.
use std::time::Duration;

/// Host the publisher binds to and bots dial by default.
pub const DEFAULT_HOST: &str = "localhost";
/// TCP port of the snapshot stream.
pub const DEFAULT_PORT: u16 = 8888;
/// Pause between two broadcast ticks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);
/// Upper bound for a single snapshot write to one session.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(250);
/// How often blocking loops wake up to check for shutdown.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Helper to format a host and port like "host:port".
pub fn addr(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}
