use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TradeFees;
use crate::values::{Amount, Price, Quantity, Symbol};

/// Rolling 24h statistics, written by the stats job and read-only to the core
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStats {
    pub last_price: Option<Price>,
    pub high_24h: Option<Price>,
    pub low_24h: Option<Price>,
    pub volume_24h: Quantity,
    pub price_change_24h: Decimal,
}

/// A spot market between a base and a quote currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    /// Derived as BASE_QUOTE
    pub symbol: Symbol,
    pub base: Symbol,
    pub quote: Symbol,
    pub min_order_size: Quantity,
    pub max_order_size: Quantity,
    pub price_precision: u32,
    pub quantity_precision: u32,
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
    pub is_active: bool,
    #[serde(default)]
    pub stats: MarketStats,
}

impl TradingPair {
    /// Create a pair with the default limits (0.0001 to 1,000,000, 8 decimal places, 0.1% fees)
    pub fn new(base: impl Into<Symbol>, quote: impl Into<Symbol>) -> Self {
        let base = base.into();
        let quote = quote.into();
        Self {
            symbol: Self::symbol_for(&base, &quote),
            base,
            quote,
            min_order_size: Decimal::new(1, 4),
            max_order_size: Decimal::from(1_000_000),
            price_precision: 8,
            quantity_precision: 8,
            maker_fee: Decimal::new(1, 3),
            taker_fee: Decimal::new(1, 3),
            is_active: true,
            stats: MarketStats::default(),
        }
    }

    pub fn symbol_for(base: &str, quote: &str) -> Symbol {
        format!("{}_{}", base, quote)
    }

    /// Set maker and taker fee rates
    pub fn with_fees(mut self, maker_fee: Decimal, taker_fee: Decimal) -> Self {
        self.maker_fee = maker_fee;
        self.taker_fee = taker_fee;
        self
    }

    pub fn with_order_size_limits(mut self, min: Quantity, max: Quantity) -> Self {
        self.min_order_size = min;
        self.max_order_size = max;
        self
    }

    pub fn with_precision(mut self, price_precision: u32, quantity_precision: u32) -> Self {
        self.price_precision = price_precision;
        self.quantity_precision = quantity_precision;
        self
    }

    pub fn last_price(&self) -> Option<Price> {
        self.stats.last_price
    }

    pub fn accepts_quantity(&self, quantity: Quantity) -> bool {
        quantity >= self.min_order_size && quantity <= self.max_order_size
    }

    pub fn price_fits_precision(&self, price: Price) -> bool {
        price.normalize().scale() <= self.price_precision
    }

    pub fn quantity_fits_precision(&self, quantity: Quantity) -> bool {
        quantity.normalize().scale() <= self.quantity_precision
    }

    /// Fees for a trade of `quantity` base units worth `quote_quantity`
    pub fn trade_fees(
        &self,
        quantity: Quantity,
        quote_quantity: Amount,
        buyer_is_maker: bool,
    ) -> TradeFees {
        TradeFees::calculate(
            self.maker_fee,
            self.taker_fee,
            quantity,
            quote_quantity,
            buyer_is_maker,
        )
    }
}
