//! Domain models for the market server.
//!
//! - `price_generator` — synthetic random-walk pricing that produces one
//!   `Snapshot` per tick.

pub mod price_generator;
