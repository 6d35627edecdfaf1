//! Trading bots subscribing to the market snapshot stream.
//!
//! - `strategy` — `StrategyEngine`, `Action` and private `Position` bookkeeping.
//! - `subscriber` — connection strategy, line reader and the per-bot read loop.
//! - `launcher` — runs a population of bots on their own threads.
#![warn(missing_docs)]

pub mod launcher;
pub mod strategy;
pub mod subscriber;

pub use strategy::{Action, Position, StrategyEngine};
pub use subscriber::{ConnectOnce, Connector, Subscriber, SubscriberReport};
