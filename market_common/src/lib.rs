//!
//! Common types and utilities shared by the market server and the trading bots.
//!
//! This crate aggregates:
//! - `error` — unified error type `MarketError` used across the workspace.
//! - `result` — handy `Result<T, MarketError>` alias.
//! - `symbols` — symbol list parsing shared by both sides.
//! - `snapshot` — per-tick `Quote`/`Snapshot` payloads and their line encoding.
//! - `config` — startup parameters handed to the publisher and subscribers.
//! - `net` — networking defaults and timing constants.
//! - `shutdown` — cross-thread cancellation signal.
#![warn(missing_docs)]
pub mod config;
pub mod error;
pub mod net;
pub mod result;
pub mod shutdown;
pub mod snapshot;
pub mod symbols;

pub use config::MarketConfig;
pub use error::MarketError;
pub use result::Result;
pub use shutdown::{Shutdown, ShutdownHandle};
pub use snapshot::{Quote, Snapshot};
