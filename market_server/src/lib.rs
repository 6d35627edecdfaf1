//! Market data publisher.
//!
//! A single publisher prices a fixed set of symbols every tick and streams the
//! full snapshot, one JSON line per tick, to every connected subscriber over TCP.
//!
//! Building blocks, leaves first:
//! - `model::price_generator` — random-walk prices and volumes.
//! - `registry` — `Session` and the shared `SessionRegistry`.
//! - `broadcaster` — tick loop: price, serialize, fan out, prune failed sessions.
//! - `handler` — per-connection thread: register, read, always deregister.
//! - `publisher` — accept loop and broadcaster wired to one registry, with
//!   graceful shutdown.
#![warn(missing_docs)]

pub mod broadcaster;
pub mod handler;
pub mod model;
pub mod publisher;
pub mod registry;

pub use publisher::Publisher;
pub use registry::{Session, SessionRegistry};
