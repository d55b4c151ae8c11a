//! Trigger rules for conditional orders

use bourse_core::{Order, OrderKind, Price, Side};
use rust_decimal::Decimal;

/// Whether a pending conditional order fires at `price`
///
/// | kind                          | sell            | buy             |
/// |-------------------------------|-----------------|-----------------|
/// | stop_loss, stop_limit         | price <= stop   | price >= stop   |
/// | take_profit, take_profit_limit| price >= target | price <= target |
/// | trailing_stop                 | retrace from highest | retrace from lowest |
pub fn should_trigger(order: &Order, price: Price) -> bool {
    match order.kind {
        OrderKind::StopLoss | OrderKind::StopLimit => {
            order.stop_price.is_some_and(|stop| match order.side {
                Side::Sell => price <= stop,
                Side::Buy => price >= stop,
            })
        }
        OrderKind::TakeProfit | OrderKind::TakeProfitLimit => {
            order.take_profit_price.is_some_and(|target| match order.side {
                Side::Sell => price >= target,
                Side::Buy => price <= target,
            })
        }
        OrderKind::TrailingStop => trailing_threshold(order).is_some_and(|threshold| {
            match order.side {
                Side::Sell => price <= threshold,
                Side::Buy => price >= threshold,
            }
        }),
        OrderKind::Market | OrderKind::Limit => false,
    }
}

/// Price a trailing stop fires at, given the extreme seen so far
pub fn trailing_threshold(order: &Order) -> Option<Price> {
    let pct = order.trailing_percent? / Decimal::ONE_HUNDRED;
    match order.side {
        Side::Sell => order.highest_price_seen.map(|high| high * (Decimal::ONE - pct)),
        Side::Buy => order.lowest_price_seen.map(|low| low * (Decimal::ONE + pct)),
    }
}

/// Move a trailing stop's extreme in the favorable direction
///
/// Returns true when the extreme moved. Other kinds are left alone.
pub fn update_extremes(order: &mut Order, price: Price) -> bool {
    if order.kind != OrderKind::TrailingStop {
        return false;
    }

    match order.side {
        Side::Sell if order.highest_price_seen.is_none_or(|high| price > high) => {
            order.highest_price_seen = Some(price);
            true
        }
        Side::Buy if order.lowest_price_seen.is_none_or(|low| price < low) => {
            order.lowest_price_seen = Some(price);
            true
        }
        _ => false,
    }
}

/// One price tick: follow the extreme, then check the trigger
pub fn evaluate_tick(order: &mut Order, price: Price) -> bool {
    update_extremes(order, price);
    should_trigger(order, price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::TimeInForce;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn conditional(kind: OrderKind, side: Side) -> Order {
        Order::new_with_time(
            "alice",
            "BTC_USDT",
            side,
            kind,
            dec!(1),
            None,
            TimeInForce::GTC,
            Utc::now(),
        )
    }

    #[test]
    fn test_stop_loss_sell_and_buy() {
        let sell = conditional(OrderKind::StopLoss, Side::Sell).with_stop_price(Some(dec!(90)));
        assert!(!should_trigger(&sell, dec!(91)));
        assert!(should_trigger(&sell, dec!(90)));
        assert!(should_trigger(&sell, dec!(85)));

        let buy = conditional(OrderKind::StopLimit, Side::Buy).with_stop_price(Some(dec!(110)));
        assert!(!should_trigger(&buy, dec!(109.99)));
        assert!(should_trigger(&buy, dec!(110)));
    }

    #[test]
    fn test_take_profit_sell_and_buy() {
        let sell = conditional(OrderKind::TakeProfit, Side::Sell)
            .with_take_profit_price(Some(dec!(120)));
        assert!(!should_trigger(&sell, dec!(119)));
        assert!(should_trigger(&sell, dec!(121)));

        let buy = conditional(OrderKind::TakeProfitLimit, Side::Buy)
            .with_take_profit_price(Some(dec!(80)));
        assert!(should_trigger(&buy, dec!(80)));
        assert!(!should_trigger(&buy, dec!(81)));
    }

    #[test]
    fn test_trailing_sell_retrace() {
        let mut order = conditional(OrderKind::TrailingStop, Side::Sell)
            .with_trailing(Some(dec!(5)), dec!(100));
        assert_eq!(order.highest_price_seen, Some(dec!(100)));

        // 94 <= 100 * 0.95
        assert!(evaluate_tick(&mut order, dec!(94)));
        assert_eq!(order.highest_price_seen, Some(dec!(100)));
    }

    #[test]
    fn test_trailing_sell_follows_new_highs() {
        let mut order = conditional(OrderKind::TrailingStop, Side::Sell)
            .with_trailing(Some(dec!(5)), dec!(100));

        assert!(!evaluate_tick(&mut order, dec!(120)));
        assert_eq!(order.highest_price_seen, Some(dec!(120)));
        assert_eq!(trailing_threshold(&order), Some(dec!(114)));

        // Would have fired against the old high of 100, not against 120
        assert!(!evaluate_tick(&mut order, dec!(115)));
        assert!(evaluate_tick(&mut order, dec!(114)));
    }

    #[test]
    fn test_trailing_buy_follows_new_lows() {
        let mut order = conditional(OrderKind::TrailingStop, Side::Buy)
            .with_trailing(Some(dec!(10)), dec!(100));

        assert!(!evaluate_tick(&mut order, dec!(80)));
        assert_eq!(order.lowest_price_seen, Some(dec!(80)));
        assert!(!evaluate_tick(&mut order, dec!(87)));
        assert!(evaluate_tick(&mut order, dec!(88)));
    }

    #[test]
    fn test_plain_orders_never_trigger() {
        let mut limit = conditional(OrderKind::Limit, Side::Sell);
        assert!(!evaluate_tick(&mut limit, dec!(1)));
        assert!(!update_extremes(&mut limit, dec!(1)));
    }
}
