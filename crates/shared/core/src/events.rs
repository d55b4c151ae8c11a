//! Events emitted by the matching engine as a side channel.
//!
//! Consumers (notifications, the conditional order monitor) must never be
//! able to block or roll back the trade that produced an event.

use serde::{Deserialize, Serialize};

use crate::entities::{Order, OrderId, OrderKind, OrderStatus, Side, Trade, TradeId};
use crate::values::{Price, Quantity, Symbol, Timestamp, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ExchangeEvent {
    /// Order passed validation and, unless conditional, has funds reserved
    OrderAccepted(OrderEvent),
    /// Conditional order met its trigger condition
    OrderTriggered(OrderEvent),
    /// Order reached `filled`
    OrderFilled(OrderEvent),
    /// Order was cancelled by the user, by time-in-force or by its OCO sibling
    OrderCancelled(OrderEvent),
    /// Trade settled
    TradeExecuted(TradeExecutedEvent),
    /// A match was abandoned because its settlement failed
    SettlementFailed(SettlementFailedEvent),
}

impl ExchangeEvent {
    pub fn pair(&self) -> &str {
        match self {
            ExchangeEvent::OrderAccepted(e)
            | ExchangeEvent::OrderTriggered(e)
            | ExchangeEvent::OrderFilled(e)
            | ExchangeEvent::OrderCancelled(e) => &e.pair,
            ExchangeEvent::TradeExecuted(e) => &e.pair,
            ExchangeEvent::SettlementFailed(e) => &e.pair,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub client_order_id: Option<String>,
    pub user_id: UserId,
    pub pair: Symbol,
    pub side: Side,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub timestamp: Timestamp,
}

impl From<&Order> for OrderEvent {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            client_order_id: order.client_order_id.clone(),
            user_id: order.user_id.clone(),
            pair: order.pair.clone(),
            side: order.side,
            kind: order.kind,
            status: order.status,
            quantity: order.quantity,
            filled_quantity: order.filled_quantity,
            timestamp: order.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeExecutedEvent {
    pub trade_id: TradeId,
    pub pair: Symbol,
    pub price: Price,
    pub quantity: Quantity,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer_is_maker: bool,
    pub timestamp: Timestamp,
}

impl From<&Trade> for TradeExecutedEvent {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.id,
            pair: trade.pair.clone(),
            price: trade.price,
            quantity: trade.quantity,
            buy_order_id: trade.buy_order_id,
            sell_order_id: trade.sell_order_id,
            buyer_is_maker: trade.buyer_is_maker,
            timestamp: trade.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementFailedEvent {
    pub order_id: OrderId,
    pub counter_order_id: OrderId,
    pub pair: Symbol,
    pub reason: String,
    pub timestamp: Timestamp,
}
