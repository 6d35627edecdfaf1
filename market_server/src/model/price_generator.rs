//! Synthetic price generation.
//!
//! Each symbol follows a bounded random walk: the next price is the previous one
//! plus a normally distributed perturbation whose standard deviation is 0.1% of
//! the previous price, rounded to cents. The first price of a symbol is seeded
//! uniformly in `[50, 500]`. Prices never drop below [`PRICE_FLOOR`].
//!
//! Volume is drawn independently of price, uniformly in [`VOLUME_RANGE`].

use std::ops::RangeInclusive;

use market_common::{Quote, Snapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Smallest price the walk may produce.
pub const PRICE_FLOOR: f64 = 0.01;
/// Range for a symbol's very first price.
pub const SEED_PRICE_RANGE: RangeInclusive<f64> = 50.0..=500.0;
/// Range for per-tick volume.
pub const VOLUME_RANGE: RangeInclusive<u32> = 1_000..=100_000;
/// Perturbation standard deviation as a fraction of the previous price.
const VOLATILITY: f64 = 0.001;

/// Random-walk price source backed by a seedable RNG.
pub struct PriceGenerator {
    rng: StdRng,
}

impl PriceGenerator {
    /// Create a generator; a fixed `seed` makes the walk reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    /// Advance one price by one tick.
    ///
    /// - previous: last published price, or `None` for a symbol's first tick.
    /// - Returns: the new price, rounded to two decimals and `>= PRICE_FLOOR`.
    pub fn next_price(&mut self, previous: Option<f64>) -> f64 {
        let last = match previous {
            Some(price) if price.is_finite() && price > 0.0 => price,
            _ => self.rng.random_range(SEED_PRICE_RANGE),
        };
        let change = match Normal::new(0.0, last * VOLATILITY) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => 0.0,
        };
        round_price(last + change).max(PRICE_FLOOR)
    }

    /// Draw a volume for one symbol at one tick.
    pub fn next_volume(&mut self) -> u32 {
        self.rng.random_range(VOLUME_RANGE)
    }

    /// Price every symbol once, walking from the quotes in `previous`.
    ///
    /// The result holds exactly one entry per element of `symbols`.
    pub fn next_snapshot(&mut self, symbols: &[String], previous: &Snapshot, timestamp: f64) -> Snapshot {
        let quotes: Vec<Quote> = symbols
            .iter()
            .map(|symbol| Quote {
                symbol: symbol.clone(),
                price: self.next_price(previous.price(symbol)),
                volume: self.next_volume(),
                timestamp,
            })
            .collect();
        Snapshot::from_quotes(quotes)
    }
}

/// Round to two fractional digits.
pub fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn symbols() -> Vec<String> {
        ["AAPL", "GOOGL", "MSFT", "AMZN", "TSLA"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn every_tick_prices_exactly_the_configured_symbols() {
        let mut generator = PriceGenerator::new(Some(7));
        let symbols = symbols();
        let mut expected: Vec<&str> = symbols.iter().map(String::as_str).collect();
        expected.sort();

        let mut snapshot = Snapshot::default();
        for tick in 0..50 {
            snapshot = generator.next_snapshot(&symbols, &snapshot, tick as f64 * 0.1);
            assert_eq!(snapshot.symbols().collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn first_price_is_seeded_in_range() {
        let mut generator = PriceGenerator::new(Some(1));
        for _ in 0..200 {
            let price = generator.next_price(None);
            // One perturbation of at most a few sigma on top of the seed.
            assert!((45.0..=505.0).contains(&price), "price {} out of range", price);
        }
    }

    #[test]
    fn prices_stay_positive_over_long_walks() {
        let mut generator = PriceGenerator::new(Some(99));
        let mut price = generator.next_price(None);
        for _ in 0..100_000 {
            price = generator.next_price(Some(price));
            assert!(price > 0.0);
        }
    }

    #[test]
    fn tiny_prices_are_clamped_to_floor() {
        let mut generator = PriceGenerator::new(Some(3));
        for _ in 0..1_000 {
            let price = generator.next_price(Some(0.004));
            assert!(price >= PRICE_FLOOR);
        }
    }

    #[test]
    fn prices_have_two_decimals() {
        let mut generator = PriceGenerator::new(Some(5));
        let mut price = None;
        for _ in 0..500 {
            let next = generator.next_price(price);
            assert_eq!(round_price(next), next);
            price = Some(next);
        }
    }

    #[test]
    fn volume_within_bounds() {
        let mut generator = PriceGenerator::new(Some(11));
        for _ in 0..10_000 {
            assert!(VOLUME_RANGE.contains(&generator.next_volume()));
        }
    }

    #[test]
    fn same_seed_same_walk() {
        let symbols = symbols();
        let mut a = PriceGenerator::new(Some(42));
        let mut b = PriceGenerator::new(Some(42));
        let first_a = a.next_snapshot(&symbols, &Snapshot::default(), 0.0);
        let first_b = b.next_snapshot(&symbols, &Snapshot::default(), 0.0);
        assert_eq!(first_a, first_b);
        assert_eq!(
            a.next_snapshot(&symbols, &first_a, 0.1),
            b.next_snapshot(&symbols, &first_b, 0.1)
        );
    }
}
