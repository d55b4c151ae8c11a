use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Amount, Quantity};

/// Fees charged on a single trade
///
/// The buyer pays in base currency (deducted from what they receive),
/// the seller pays in quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeFees {
    pub buyer_fee: Amount,
    pub seller_fee: Amount,
    /// True when the buy order was resting on the book
    pub buyer_is_maker: bool,
}

impl TradeFees {
    /// Maker side pays `maker_rate`, taker side pays `taker_rate`
    pub fn calculate(
        maker_rate: Decimal,
        taker_rate: Decimal,
        quantity: Quantity,
        quote_quantity: Amount,
        buyer_is_maker: bool,
    ) -> Self {
        let (buyer_rate, seller_rate) = if buyer_is_maker {
            (maker_rate, taker_rate)
        } else {
            (taker_rate, maker_rate)
        };

        Self {
            buyer_fee: quantity * buyer_rate,
            seller_fee: quote_quantity * seller_rate,
            buyer_is_maker,
        }
    }
}
