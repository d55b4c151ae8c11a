use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderKind, OrderStatus, Side, TimeInForce, TradingPair};
use crate::values::{Amount, Price, Quantity, Symbol, Timestamp, UserId};

/// Unique identifier for an order
pub type OrderId = Uuid;

/// Full order details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub pair: Symbol,
    pub side: Side,
    pub kind: OrderKind,
    pub status: OrderStatus,
    /// Limit price; always `None` for market orders
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub time_in_force: TimeInForce,
    pub client_order_id: Option<String>,
    /// Required for StopLoss and StopLimit orders
    pub stop_price: Option<Price>,
    /// Required for TakeProfit and TakeProfitLimit orders
    pub take_profit_price: Option<Price>,
    /// Required for TrailingStop orders, in percent (5 = 5%)
    pub trailing_percent: Option<Decimal>,
    pub highest_price_seen: Option<Price>,
    pub lowest_price_seen: Option<Price>,
    /// OCO sibling
    pub parent_order: Option<OrderId>,
    /// Funds still locked for this order, in its lock currency
    pub reserved: Amount,
    /// Arrival sequence, breaks ties between equal creation timestamps
    pub sequence: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub filled_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub triggered_at: Option<Timestamp>,
}

impl Order {
    /// Create a new order with explicit timestamp
    ///
    /// Conditional kinds start `pending`, everything else `open`.
    #[allow(clippy::too_many_arguments)]
    pub fn new_with_time(
        user_id: impl Into<UserId>,
        pair: impl Into<Symbol>,
        side: Side,
        kind: OrderKind,
        quantity: Quantity,
        price: Option<Price>,
        time_in_force: TimeInForce,
        timestamp: Timestamp,
    ) -> Self {
        let status = if kind.is_conditional() {
            OrderStatus::Pending
        } else {
            OrderStatus::Open
        };

        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            pair: pair.into(),
            side,
            kind,
            status,
            price,
            quantity,
            filled_quantity: Decimal::ZERO,
            time_in_force,
            client_order_id: None,
            stop_price: None,
            take_profit_price: None,
            trailing_percent: None,
            highest_price_seen: None,
            lowest_price_seen: None,
            parent_order: None,
            reserved: Decimal::ZERO,
            sequence: 0,
            created_at: timestamp,
            updated_at: timestamp,
            filled_at: None,
            cancelled_at: None,
            triggered_at: None,
        }
    }

    pub fn with_client_order_id(mut self, client_order_id: Option<String>) -> Self {
        self.client_order_id = client_order_id;
        self
    }

    pub fn with_stop_price(mut self, stop_price: Option<Price>) -> Self {
        self.stop_price = stop_price;
        self
    }

    pub fn with_take_profit_price(mut self, take_profit_price: Option<Price>) -> Self {
        self.take_profit_price = take_profit_price;
        self
    }

    /// Set the trailing distance and seed the running extreme with the current price
    pub fn with_trailing(mut self, trailing_percent: Option<Decimal>, reference: Price) -> Self {
        self.trailing_percent = trailing_percent;
        match self.side {
            Side::Sell => self.highest_price_seen = Some(reference),
            Side::Buy => self.lowest_price_seen = Some(reference),
        }
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Returns remaining quantity to be filled
    pub fn remaining_quantity(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }

    /// Returns true if the order is completely filled
    pub fn is_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }

    pub fn is_market(&self) -> bool {
        matches!(self.kind, OrderKind::Market)
    }

    /// Currency whose funds back this order: quote for buys, base for sells
    pub fn lock_currency<'a>(&self, pair: &'a TradingPair) -> &'a Symbol {
        match self.side {
            Side::Buy => &pair.quote,
            Side::Sell => &pair.base,
        }
    }

    /// Record an execution; status becomes `filled` or `partial`
    pub fn record_fill(&mut self, quantity: Quantity, timestamp: Timestamp) {
        let quantity = quantity.min(self.remaining_quantity());
        self.filled_quantity += quantity;
        self.updated_at = timestamp;

        if self.is_filled() {
            self.status = OrderStatus::Filled;
            self.filled_at = Some(timestamp);
        } else if self.filled_quantity > Decimal::ZERO {
            self.status = OrderStatus::Partial;
        }
    }

    pub fn mark_cancelled(&mut self, timestamp: Timestamp) {
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(timestamp);
        self.updated_at = timestamp;
    }

    /// Promote a pending conditional order into the active lifecycle
    ///
    /// The kind is rewritten to its non-conditional equivalent; an order that
    /// becomes a market order drops any limit price.
    pub fn trigger(&mut self, timestamp: Timestamp) {
        self.kind = self.kind.activated_kind();
        if self.kind == OrderKind::Market {
            self.price = None;
        }
        self.status = OrderStatus::Open;
        self.triggered_at = Some(timestamp);
        self.updated_at = timestamp;
    }

    /// Triggered but not yet funded and matched
    pub fn awaiting_activation(&self) -> bool {
        self.status == OrderStatus::Open
            && self.triggered_at.is_some()
            && self.reserved.is_zero()
            && self.filled_quantity.is_zero()
    }
}
