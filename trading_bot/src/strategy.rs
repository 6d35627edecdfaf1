//! Per-subscriber trading decisions and position bookkeeping.
//!
//! The strategy is deliberately random: for every symbol in a snapshot it draws
//! BUY, SELL or HOLD with weights 0.4 / 0.4 / 0.2. Buys add a uniform quantity in
//! `[min, max]` and move the average price to the quantity-weighted mean. Sells
//! take a uniform quantity in `[min, held]` (everything when fewer than `min`
//! are held) and leave the average price alone. Positions never go negative.

use market_common::{MarketConfig, MarketError, Result, Snapshot};
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strum_macros::{Display, EnumString};

/// Decision taken for one symbol on one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Action {
    /// Quantity was added to the position.
    Buy,
    /// Quantity was removed from the position.
    Sell,
    /// Position untouched.
    Hold,
}

/// Draw weights for `[Buy, Sell, Hold]`.
pub const ACTION_WEIGHTS: [f64; 3] = [0.4, 0.4, 0.2];
const ACTIONS: [Action; 3] = [Action::Buy, Action::Sell, Action::Hold];

/// Private holding of one symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    /// Units held.
    pub quantity: u64,
    /// Cost basis per unit of the units held.
    pub average_price: f64,
}

impl Position {
    /// Add `quantity` units bought at `price`.
    pub fn apply_buy(&mut self, quantity: u64, price: f64) {
        if quantity == 0 {
            return;
        }
        let total = self.quantity + quantity;
        self.average_price =
            (self.average_price * self.quantity as f64 + price * quantity as f64) / total as f64;
        self.quantity = total;
    }

    /// Remove up to `quantity` units; returns how many were actually sold.
    pub fn apply_sell(&mut self, quantity: u64) -> u64 {
        let sold = quantity.min(self.quantity);
        self.quantity -= sold;
        sold
    }
}

/// Random strategy with a private RNG.
pub struct StrategyEngine {
    rng: StdRng,
    actions: WeightedIndex<f64>,
    min_quantity: u64,
    max_quantity: u64,
}

impl StrategyEngine {
    /// Build an engine using the trade size limits from `config`.
    pub fn new(config: &MarketConfig, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        let actions =
            WeightedIndex::new(ACTION_WEIGHTS).map_err(|e| MarketError::Config(e.to_string()))?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            rng,
            actions,
            min_quantity: config.min_trade_quantity,
            max_quantity: config.max_trade_quantity,
        })
    }

    /// Decide what to do with `symbol` given the latest snapshot.
    ///
    /// A symbol missing from `snapshot` always yields `Hold` with the position
    /// returned as is. A drawn `Sell` on an empty position also becomes `Hold`.
    pub fn decide(&mut self, symbol: &str, snapshot: &Snapshot, position: Position) -> (Action, Position) {
        let Some(price) = snapshot.price(symbol) else {
            return (Action::Hold, position);
        };

        let mut updated = position;
        match ACTIONS[self.actions.sample(&mut self.rng)] {
            Action::Buy => {
                let quantity = self.rng.random_range(self.min_quantity..=self.max_quantity);
                updated.apply_buy(quantity, price);
                (Action::Buy, updated)
            }
            Action::Sell if updated.quantity > 0 => {
                let quantity = self.sell_quantity(updated.quantity);
                updated.apply_sell(quantity);
                (Action::Sell, updated)
            }
            _ => (Action::Hold, updated),
        }
    }

    fn sell_quantity(&mut self, held: u64) -> u64 {
        let low = self.min_quantity.min(held);
        self.rng.random_range(low..=held)
    }
}
