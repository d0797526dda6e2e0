//! Resolved rounds and the market-clearing price.

use crate::player::ClientId;

/// Price when nothing is caught
pub const BASE_PRICE: i64 = 45;
/// Every this many kilograms caught in total lowers the price by one
pub const KILOGRAMS_PER_PRICE_STEP: i64 = 5;

/// `45 - floor(0.2 * total)`, computed in integers. Not clamped: a large
/// enough total drives the price negative.
pub fn clearing_price(total_caught: i64) -> i64 {
    BASE_PRICE - total_caught / KILOGRAMS_PER_PRICE_STEP
}

/// `(price - expenses) * caught`
pub fn round_profit(price: i64, expenses: i64, caught: i64) -> i64 {
    price.saturating_sub(expenses).saturating_mul(caught)
}

/// One seat's outcome in a resolved round
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundEntry {
    pub player: ClientId,
    pub name: String,
    pub caught: i64,
    pub profit: i64,
    /// Player's cumulative money after this round
    pub money: i64,
    pub expenses: i64,
}

/// Immutable record of a resolved round, entries in seat order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round {
    pub number: u32,
    pub entries: Vec<RoundEntry>,
    pub total_caught: i64,
    pub price: i64,
}

impl Round {
    pub fn entry(&self, player: ClientId) -> Option<&RoundEntry> {
        self.entries.iter().find(|e| e.player == player)
    }

    /// Per-kilogram margin of the first seat; all seats share one expense
    /// level in practice.
    pub fn margin(&self) -> i64 {
        let expenses = self.entries.first().map_or(0, |e| e.expenses);
        self.price - expenses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_formula() {
        assert_eq!(clearing_price(0), 45);
        assert_eq!(clearing_price(15), 42);
        assert_eq!(clearing_price(30), 39);
        // floor, not rounding
        assert_eq!(clearing_price(34), 39);
        assert_eq!(clearing_price(35), 38);
    }

    #[test]
    fn price_is_not_clamped() {
        assert_eq!(clearing_price(225), 0);
        assert_eq!(clearing_price(300), -15);
    }

    #[test]
    fn profit_formula() {
        assert_eq!(round_profit(39, 5, 10), 340);
        assert_eq!(round_profit(42, 5, 5), 185);
        assert_eq!(round_profit(42, 5, 0), 0);
        assert_eq!(round_profit(3, 5, 10), -20);
    }
}
