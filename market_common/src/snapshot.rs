//! Snapshot data model and line encoding.
//!
//! A `Snapshot` is the full per-symbol state of one broadcast tick. On the wire
//! it is a single JSON object keyed by symbol, terminated by `\n`:
//!
//! ```text
//! {"AAPL":{"symbol":"AAPL","price":187.42,"volume":5120,"timestamp":1.204},...}
//! ```
//!
//! Entries are kept in a `BTreeMap` so that encoding is deterministic and every
//! session receives byte-identical payloads for the same tick.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::MarketError;
use crate::result::Result;

/// Price and volume of one symbol at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Symbol identifier, repeated from the snapshot key.
    pub symbol: String,
    /// Last price, rounded to two fractional digits. Always positive.
    pub price: f64,
    /// Synthetic volume for this tick.
    pub volume: u32,
    /// Seconds since the publisher started (monotonic, no fixed epoch).
    pub timestamp: f64,
}

/// All quotes produced by a single tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    quotes: BTreeMap<String, Quote>,
}

impl Snapshot {
    /// Builds a snapshot from quotes, keyed by their own symbol.
    pub fn from_quotes<I: IntoIterator<Item = Quote>>(quotes: I) -> Self {
        Self {
            quotes: quotes.into_iter().map(|q| (q.symbol.clone(), q)).collect(),
        }
    }

    /// Quote for `symbol`, if the tick priced it.
    pub fn get(&self, symbol: &str) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    /// Price for `symbol`, if present.
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.get(symbol).map(|q| q.price)
    }

    /// Iterates symbols in ascending order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.quotes.keys().map(String::as_str)
    }

    /// Iterates quotes in symbol order.
    pub fn quotes(&self) -> impl Iterator<Item = &Quote> {
        self.quotes.values()
    }

    /// Number of symbols in the snapshot.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// `true` before the first tick.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Encode as one newline-terminated JSON line.
    pub fn to_line(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Decode one line produced by [`Self::to_line`].
    ///
    /// Surrounding whitespace (including the delimiter) is ignored. A quote whose
    /// `symbol` field differs from its key is rejected.
    pub fn from_line(line: &[u8]) -> Result<Snapshot> {
        let snapshot: Snapshot = serde_json::from_slice(line.trim_ascii())?;
        if let Some((key, quote)) = snapshot.quotes.iter().find(|(k, q)| **k != q.symbol) {
            return Err(MarketError::MalformedSnapshot(format!(
                "key '{}' carries quote for '{}'",
                key, quote.symbol
            )));
        }
        Ok(snapshot)
    }
}
