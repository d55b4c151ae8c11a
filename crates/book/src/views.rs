use bourse_core::{Price, Quantity, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One aggregated price level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    /// Resting (unfilled) quantity at this price
    pub quantity: Quantity,
    /// Running total from the top of the book down to this level
    pub cumulative_quantity: Quantity,
    pub order_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookDepth {
    pub pair: Symbol,
    /// Highest price first
    pub bids: Vec<DepthLevel>,
    /// Lowest price first
    pub asks: Vec<DepthLevel>,
}

impl OrderBookDepth {
    pub fn empty(pair: impl Into<Symbol>) -> Self {
        Self {
            pair: pair.into(),
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spread {
    pub pair: Symbol,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub spread: Option<Price>,
    /// spread / best_ask * 100
    pub spread_pct: Option<Decimal>,
}

impl Spread {
    pub fn new(pair: impl Into<Symbol>, best_bid: Option<Price>, best_ask: Option<Price>) -> Self {
        let (spread, spread_pct) = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => {
                let spread = ask - bid;
                let pct = if ask.is_zero() {
                    None
                } else {
                    Some((spread / ask * Decimal::ONE_HUNDRED).round_dp(8))
                };
                (Some(spread), pct)
            }
            _ => (None, None),
        };

        Self {
            pair: pair.into(),
            best_bid,
            best_ask,
            spread,
            spread_pct,
        }
    }
}
