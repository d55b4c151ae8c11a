use bourse_core::{Order, OrderKind, Price, Quantity, Side, Symbol, TimeInForce, Trade, UserId};
use bourse_ports::ExchangeError;
use rust_decimal::Decimal;

/// Request to place an order of any kind
#[derive(Debug, Clone)]
pub struct CreateOrderCommand {
    pub user_id: UserId,
    pub pair: Symbol,
    pub kind: OrderKind,
    pub side: Side,
    pub quantity: Quantity,
    pub price: Option<Price>,
    pub time_in_force: TimeInForce,
    pub client_order_id: Option<String>,
    pub stop_price: Option<Price>,
    pub take_profit_price: Option<Price>,
    pub trailing_percent: Option<Decimal>,
}

impl CreateOrderCommand {
    fn base(
        user_id: impl Into<UserId>,
        pair: impl Into<Symbol>,
        kind: OrderKind,
        side: Side,
        quantity: Quantity,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            pair: pair.into(),
            kind,
            side,
            quantity,
            price: None,
            time_in_force: TimeInForce::GTC,
            client_order_id: None,
            stop_price: None,
            take_profit_price: None,
            trailing_percent: None,
        }
    }

    pub fn limit(
        user_id: impl Into<UserId>,
        pair: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        price: Price,
    ) -> Self {
        Self {
            price: Some(price),
            ..Self::base(user_id, pair, OrderKind::Limit, side, quantity)
        }
    }

    pub fn market(
        user_id: impl Into<UserId>,
        pair: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
    ) -> Self {
        Self::base(user_id, pair, OrderKind::Market, side, quantity)
    }

    pub fn stop_loss(
        user_id: impl Into<UserId>,
        pair: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        stop_price: Price,
    ) -> Self {
        Self {
            stop_price: Some(stop_price),
            ..Self::base(user_id, pair, OrderKind::StopLoss, side, quantity)
        }
    }

    pub fn stop_limit(
        user_id: impl Into<UserId>,
        pair: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        stop_price: Price,
        limit_price: Price,
    ) -> Self {
        Self {
            stop_price: Some(stop_price),
            price: Some(limit_price),
            ..Self::base(user_id, pair, OrderKind::StopLimit, side, quantity)
        }
    }

    pub fn take_profit(
        user_id: impl Into<UserId>,
        pair: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        take_profit_price: Price,
    ) -> Self {
        Self {
            take_profit_price: Some(take_profit_price),
            ..Self::base(user_id, pair, OrderKind::TakeProfit, side, quantity)
        }
    }

    pub fn take_profit_limit(
        user_id: impl Into<UserId>,
        pair: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        take_profit_price: Price,
        limit_price: Price,
    ) -> Self {
        Self {
            take_profit_price: Some(take_profit_price),
            price: Some(limit_price),
            ..Self::base(user_id, pair, OrderKind::TakeProfitLimit, side, quantity)
        }
    }

    pub fn trailing_stop(
        user_id: impl Into<UserId>,
        pair: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        trailing_percent: Decimal,
    ) -> Self {
        Self {
            trailing_percent: Some(trailing_percent),
            ..Self::base(user_id, pair, OrderKind::TrailingStop, side, quantity)
        }
    }

    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    pub fn with_client_order_id(mut self, client_order_id: impl Into<String>) -> Self {
        self.client_order_id = Some(client_order_id.into());
        self
    }
}

/// Request to place a one-cancels-the-other pair: a resting limit leg and a
/// pending stop leg for the same quantity
#[derive(Debug, Clone)]
pub struct CreateOcoCommand {
    pub user_id: UserId,
    pub pair: Symbol,
    pub side: Side,
    pub quantity: Quantity,
    pub limit_price: Price,
    pub stop_price: Price,
    /// When set the stop leg becomes a stop-limit at this price
    pub stop_limit_price: Option<Price>,
    pub client_order_id: Option<String>,
}

/// Outcome of placing or activating an order
#[derive(Debug, Clone)]
pub struct OrderExecution {
    pub order: Order,
    pub trades: Vec<Trade>,
    /// Set when a settlement failure stopped the matching loop; trades listed
    /// before the failure are committed
    pub interrupted: Option<ExchangeError>,
}

impl OrderExecution {
    pub(crate) fn accepted(order: Order) -> Self {
        Self {
            order,
            trades: Vec::new(),
            interrupted: None,
        }
    }

    pub fn filled_quantity(&self) -> Quantity {
        self.trades.iter().map(|t| t.quantity).sum()
    }
}

#[derive(Debug, Clone)]
pub struct OcoExecution {
    pub limit: OrderExecution,
    pub stop: Order,
}
