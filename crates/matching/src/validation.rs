use bourse_core::{Amount, OrderKind, Price, Quantity, TradingPair};
use bourse_ports::{ExchangeError, ExchangeResult};
use rust_decimal::Decimal;

use crate::command::CreateOrderCommand;

/// Check an order request against its pair before anything is locked
pub(crate) fn validate_order(cmd: &CreateOrderCommand, pair: &TradingPair) -> ExchangeResult<()> {
    if !pair.is_active {
        return Err(ExchangeError::InvalidOrder(format!(
            "trading pair {} is not active",
            pair.symbol
        )));
    }
    validate_quantity(cmd.quantity, pair)?;

    if cmd.kind.requires_limit_price() {
        let price = cmd.price.ok_or_else(|| {
            ExchangeError::InvalidOrder(format!("{} orders require a price", cmd.kind))
        })?;
        validate_price(price, "price", pair)?;
        notional(cmd.quantity, price)?;
    } else if cmd.price.is_some() {
        return Err(ExchangeError::InvalidOrder(format!(
            "{} orders must not carry a limit price",
            cmd.kind
        )));
    }

    match cmd.kind {
        OrderKind::Market | OrderKind::Limit => Ok(()),
        OrderKind::StopLoss | OrderKind::StopLimit => {
            let stop = required(cmd.stop_price, "stop_price", cmd.kind)?;
            validate_price(stop, "stop_price", pair)
        }
        OrderKind::TakeProfit | OrderKind::TakeProfitLimit => {
            let target = required(cmd.take_profit_price, "take_profit_price", cmd.kind)?;
            validate_price(target, "take_profit_price", pair)
        }
        OrderKind::TrailingStop => {
            let pct = required(cmd.trailing_percent, "trailing_percent", cmd.kind)?;
            if pct <= Decimal::ZERO || pct >= Decimal::ONE_HUNDRED {
                return Err(ExchangeError::InvalidOrder(format!(
                    "trailing_percent must be between 0 and 100, got {}",
                    pct
                )));
            }
            Ok(())
        }
    }
}

pub(crate) fn validate_quantity(quantity: Quantity, pair: &TradingPair) -> ExchangeResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(ExchangeError::InvalidAmount(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    if !pair.accepts_quantity(quantity) {
        return Err(ExchangeError::InvalidOrder(format!(
            "quantity {} outside [{}, {}] for {}",
            quantity, pair.min_order_size, pair.max_order_size, pair.symbol
        )));
    }
    if !pair.quantity_fits_precision(quantity) {
        return Err(ExchangeError::InvalidOrder(format!(
            "quantity {} exceeds {} decimal places",
            quantity, pair.quantity_precision
        )));
    }
    Ok(())
}

pub(crate) fn validate_price(price: Price, field: &str, pair: &TradingPair) -> ExchangeResult<()> {
    if price <= Decimal::ZERO {
        return Err(ExchangeError::InvalidAmount(format!(
            "{} must be positive, got {}",
            field, price
        )));
    }
    if !pair.price_fits_precision(price) {
        return Err(ExchangeError::InvalidOrder(format!(
            "{} {} exceeds {} decimal places",
            field, price, pair.price_precision
        )));
    }
    Ok(())
}

/// `quantity × price`, rejected when it does not fit in a decimal
pub(crate) fn notional(quantity: Quantity, price: Price) -> ExchangeResult<Amount> {
    quantity.checked_mul(price).ok_or_else(|| {
        ExchangeError::InvalidAmount(format!(
            "notional of {} at {} is out of range",
            quantity, price
        ))
    })
}

fn required<T>(value: Option<T>, field: &str, kind: OrderKind) -> ExchangeResult<T> {
    value.ok_or_else(|| ExchangeError::InvalidOrder(format!("{} orders require {}", kind, field)))
}
