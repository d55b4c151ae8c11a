use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderId, TradeFees};
use crate::values::{Amount, Price, Quantity, Symbol, Timestamp, UserId};

/// Unique identifier for a trade
pub type TradeId = Uuid;

/// Immutable record of one match between a taker and a resting maker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub pair: Symbol,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    /// Always the maker's price
    pub price: Price,
    pub quantity: Quantity,
    pub quote_quantity: Amount,
    pub buyer_fee: Amount,
    pub seller_fee: Amount,
    pub buyer_is_maker: bool,
    pub created_at: Timestamp,
}

impl Trade {
    /// Create a trade with a pre-allocated id so ledger entries can reference it
    #[allow(clippy::too_many_arguments)]
    pub fn new_with_id(
        id: TradeId,
        pair: impl Into<Symbol>,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        buyer_id: impl Into<UserId>,
        seller_id: impl Into<UserId>,
        price: Price,
        quantity: Quantity,
        fees: TradeFees,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            pair: pair.into(),
            buy_order_id,
            sell_order_id,
            buyer_id: buyer_id.into(),
            seller_id: seller_id.into(),
            price,
            quantity,
            quote_quantity: price * quantity,
            buyer_fee: fees.buyer_fee,
            seller_fee: fees.seller_fee,
            buyer_is_maker: fees.buyer_is_maker,
            created_at: timestamp,
        }
    }

    pub fn maker_order_id(&self) -> OrderId {
        if self.buyer_is_maker {
            self.buy_order_id
        } else {
            self.sell_order_id
        }
    }

    pub fn taker_order_id(&self) -> OrderId {
        if self.buyer_is_maker {
            self.sell_order_id
        } else {
            self.buy_order_id
        }
    }

    pub fn involves_user(&self, user_id: &str) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }
}
