//! End-to-end matching scenarios: order placement, price-time matching,
//! settlement, time-in-force and cancellation against a real ledger.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bourse_book::OrderBookIndex;
use bourse_clock::ManualClock;
use bourse_core::{
    Balance, BalanceKey, Currency, EntryType, ExchangeEvent, OrderStatus, Side, TimeInForce,
    TradingPair,
};
use bourse_ledger::Ledger;
use bourse_matching::{
    BroadcastEventPublisher, CreateOcoCommand, CreateOrderCommand, EngineConfig, ExchangeError,
    MarketRegistry, MatchingEngine, OrderExecution,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const PAIR: &str = "BTC_USDT";

struct Harness {
    engine: Arc<MatchingEngine>,
    ledger: Arc<Ledger>,
    publisher: Arc<BroadcastEventPublisher>,
}

impl Harness {
    fn new() -> Self {
        Self::with(Decimal::ZERO, Decimal::ZERO, EngineConfig::default())
    }

    fn with(maker_fee: Decimal, taker_fee: Decimal, config: EngineConfig) -> Self {
        Self::build(maker_fee, taker_fee, config, Duration::from_secs(5))
    }

    fn build(
        maker_fee: Decimal,
        taker_fee: Decimal,
        config: EngineConfig,
        ledger_timeout: Duration,
    ) -> Self {
        let clock = Arc::new(
            ManualClock::starting_at_epoch().with_tick(chrono::Duration::milliseconds(1)),
        );
        let markets = Arc::new(MarketRegistry::new());
        markets.register_currency(Currency::new("BTC", 8)).unwrap();
        markets.register_currency(Currency::new("USDT", 6)).unwrap();
        markets
            .register_pair(TradingPair::new("BTC", "USDT").with_fees(maker_fee, taker_fee))
            .unwrap();

        let ledger = Arc::new(Ledger::new(clock.clone()).with_lock_timeout(ledger_timeout));
        let book = Arc::new(OrderBookIndex::new());
        let publisher = Arc::new(BroadcastEventPublisher::new(4096));
        let engine = Arc::new(MatchingEngine::new(
            markets,
            ledger.clone(),
            book,
            publisher.clone(),
            clock,
            config,
        ));

        Self {
            engine,
            ledger,
            publisher,
        }
    }

    fn fund(&self, user: &str, currency: &str, amount: Decimal) {
        self.ledger
            .credit(user, currency, amount, EntryType::Deposit, None)
            .unwrap();
    }

    fn balance(&self, user: &str, currency: &str) -> Balance {
        self.ledger.balance(user, currency).unwrap()
    }

    fn limit(
        &self,
        user: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> OrderExecution {
        self.engine
            .create_order(CreateOrderCommand::limit(user, PAIR, side, quantity, price))
            .unwrap()
    }

    fn assert_reconciled(&self) {
        for key in self.ledger.balance_keys() {
            let reconciliation = self.ledger.reconcile(&key.user_id, &key.currency).unwrap();
            assert!(
                reconciliation.is_consistent(),
                "{}/{} does not reconcile: {:?}",
                key.user_id,
                key.currency,
                reconciliation
            );
        }
    }
}

#[test]
fn test_full_match_at_maker_price() {
    let h = Harness::new();
    h.fund("seller", "BTC", dec!(10));
    h.fund("buyer", "USDT", dec!(1000));

    let sell = h.limit("seller", Side::Sell, dec!(10), dec!(50));
    assert_eq!(sell.order.status, OrderStatus::Open);
    assert_eq!(h.balance("seller", "BTC").locked, dec!(10));

    let buy = h.limit("buyer", Side::Buy, dec!(10), dec!(55));
    assert_eq!(buy.trades.len(), 1);
    assert_eq!(buy.trades[0].price, dec!(50));
    assert_eq!(buy.trades[0].quantity, dec!(10));
    assert!(!buy.trades[0].buyer_is_maker);
    assert_eq!(buy.order.status, OrderStatus::Filled);
    assert_eq!(
        h.engine.get_order(&sell.order.id).unwrap().status,
        OrderStatus::Filled
    );

    // Price improvement: 550 reserved, 500 spent, 50 released
    let buyer_usdt = h.balance("buyer", "USDT");
    assert_eq!(buyer_usdt.available, dec!(500));
    assert_eq!(buyer_usdt.locked, dec!(0));
    assert_eq!(h.balance("buyer", "BTC").available, dec!(10));

    let seller_btc = h.balance("seller", "BTC");
    assert_eq!(seller_btc.available, dec!(0));
    assert_eq!(seller_btc.locked, dec!(0));
    assert_eq!(h.balance("seller", "USDT").available, dec!(500));

    assert_eq!(h.engine.book().resting_count(PAIR), 0);
    assert_eq!(h.engine.markets().pair(PAIR).unwrap().last_price(), Some(dec!(50)));
    h.assert_reconciled();
}

#[test]
fn test_partial_fill_then_cancel_releases_remainder() {
    let h = Harness::new();
    h.fund("seller", "BTC", dec!(10));
    h.fund("buyer", "USDT", dec!(1000));

    let sell = h.limit("seller", Side::Sell, dec!(10), dec!(50));
    let buy = h.limit("buyer", Side::Buy, dec!(4), dec!(50));
    assert_eq!(buy.order.status, OrderStatus::Filled);

    let resting = h.engine.get_order(&sell.order.id).unwrap();
    assert_eq!(resting.status, OrderStatus::Partial);
    assert_eq!(resting.filled_quantity, dec!(4));
    assert_eq!(h.balance("seller", "BTC").locked, dec!(6));

    let cancelled = h.engine.cancel_order("seller", &sell.order.id).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.filled_quantity, dec!(4));

    let seller_btc = h.balance("seller", "BTC");
    assert_eq!(seller_btc.available, dec!(6));
    assert_eq!(seller_btc.locked, dec!(0));

    let unlock = h.ledger.entries_for("seller", "BTC").pop().unwrap();
    assert_eq!(unlock.entry_type, EntryType::OrderUnlock);
    assert_eq!(unlock.available_delta, dec!(6));
    assert_eq!(unlock.locked_delta, dec!(-6));
    h.assert_reconciled();
}

#[test]
fn test_cancel_twice_is_invalid_state_without_entries() {
    let h = Harness::new();
    h.fund("seller", "BTC", dec!(1));
    let sell = h.limit("seller", Side::Sell, dec!(1), dec!(50));

    h.engine.cancel_order("seller", &sell.order.id).unwrap();
    let journal_len = h.ledger.journal_len();

    let second = h.engine.cancel_order("seller", &sell.order.id);
    assert!(matches!(second, Err(ExchangeError::InvalidState(_))));
    assert_eq!(h.ledger.journal_len(), journal_len);
}

#[test]
fn test_cancel_someone_elses_order_is_not_found() {
    let h = Harness::new();
    h.fund("seller", "BTC", dec!(1));
    let sell = h.limit("seller", Side::Sell, dec!(1), dec!(50));

    let result = h.engine.cancel_order("mallory", &sell.order.id);
    assert!(matches!(result, Err(ExchangeError::NotFound(_))));
    assert_eq!(
        h.engine.get_order(&sell.order.id).unwrap().status,
        OrderStatus::Open
    );
}

#[test]
fn test_insufficient_balance_creates_nothing() {
    let h = Harness::new();
    h.fund("buyer", "USDT", dec!(100));
    let journal_len = h.ledger.journal_len();

    let result = h
        .engine
        .create_order(CreateOrderCommand::limit("buyer", PAIR, Side::Buy, dec!(10), dec!(50)));
    assert!(matches!(
        result,
        Err(ExchangeError::InsufficientBalance { .. })
    ));
    assert!(h.engine.get_user_orders("buyer", None, None).unwrap().is_empty());
    assert_eq!(h.ledger.journal_len(), journal_len);
    assert_eq!(h.balance("buyer", "USDT").available, dec!(100));
}

#[test]
fn test_ioc_cancels_unfilled_remainder() {
    let h = Harness::new();
    h.fund("seller", "BTC", dec!(5));
    h.fund("buyer", "USDT", dec!(1000));
    h.limit("seller", Side::Sell, dec!(5), dec!(50));

    let buy = h
        .engine
        .create_order(
            CreateOrderCommand::limit("buyer", PAIR, Side::Buy, dec!(8), dec!(50))
                .with_time_in_force(TimeInForce::IOC),
        )
        .unwrap();

    assert_eq!(buy.filled_quantity(), dec!(5));
    assert_eq!(buy.order.status, OrderStatus::Cancelled);
    assert_eq!(buy.order.filled_quantity, dec!(5));

    let buyer_usdt = h.balance("buyer", "USDT");
    assert_eq!(buyer_usdt.available, dec!(750));
    assert_eq!(buyer_usdt.locked, dec!(0));
    assert_eq!(h.engine.book().resting_count(PAIR), 0);
    h.assert_reconciled();
}

#[test]
fn test_fok_without_enough_liquidity_trades_nothing() {
    let h = Harness::new();
    h.fund("seller", "BTC", dec!(5));
    h.fund("buyer", "USDT", dec!(1000));
    let sell = h.limit("seller", Side::Sell, dec!(5), dec!(50));

    let buy = h
        .engine
        .create_order(
            CreateOrderCommand::limit("buyer", PAIR, Side::Buy, dec!(8), dec!(50))
                .with_time_in_force(TimeInForce::FOK),
        )
        .unwrap();

    assert!(buy.trades.is_empty());
    assert_eq!(buy.order.status, OrderStatus::Cancelled);
    assert_eq!(buy.order.filled_quantity, dec!(0));
    assert_eq!(h.balance("buyer", "USDT").available, dec!(1000));
    assert_eq!(h.balance("buyer", "USDT").locked, dec!(0));
    assert_eq!(
        h.engine.get_order(&sell.order.id).unwrap().status,
        OrderStatus::Open
    );
}

#[test]
fn test_fok_fills_across_levels() {
    let h = Harness::new();
    h.fund("seller", "BTC", dec!(10));
    h.fund("buyer", "USDT", dec!(1000));
    h.limit("seller", Side::Sell, dec!(3), dec!(50));
    h.limit("seller", Side::Sell, dec!(5), dec!(51));

    let buy = h
        .engine
        .create_order(
            CreateOrderCommand::limit("buyer", PAIR, Side::Buy, dec!(8), dec!(51))
                .with_time_in_force(TimeInForce::FOK),
        )
        .unwrap();

    assert_eq!(buy.order.status, OrderStatus::Filled);
    assert_eq!(buy.trades.len(), 2);
    assert_eq!(buy.trades[0].price, dec!(50));
    assert_eq!(buy.trades[1].price, dec!(51));
    // 3 x 50 + 5 x 51
    assert_eq!(h.balance("buyer", "USDT").available, dec!(595));
    assert_eq!(h.balance("buyer", "USDT").locked, dec!(0));
}

#[test]
fn test_price_time_priority() {
    let h = Harness::new();
    h.fund("seller", "BTC", dec!(10));
    h.fund("buyer", "USDT", dec!(1000));

    let a = h.limit("seller", Side::Sell, dec!(1), dec!(100));
    let b = h.limit("seller", Side::Sell, dec!(1), dec!(99));
    let c = h.limit("seller", Side::Sell, dec!(1), dec!(99));
    h.limit("seller", Side::Sell, dec!(1), dec!(101));

    let buy = h.limit("buyer", Side::Buy, dec!(3), dec!(100));
    let makers: Vec<_> = buy.trades.iter().map(|t| t.sell_order_id).collect();
    assert_eq!(makers, vec![b.order.id, c.order.id, a.order.id]);
}

#[test]
fn test_market_buy_without_asks_is_no_liquidity() {
    let h = Harness::new();
    h.fund("buyer", "USDT", dec!(1000));
    let journal_len = h.ledger.journal_len();

    let result = h
        .engine
        .create_order(CreateOrderCommand::market("buyer", PAIR, Side::Buy, dec!(1)));
    assert!(matches!(result, Err(ExchangeError::NoLiquidity(_))));
    assert_eq!(h.ledger.journal_len(), journal_len);
}

#[test]
fn test_market_buy_sweeps_levels_and_releases_buffer() {
    let h = Harness::new();
    h.fund("seller", "BTC", dec!(5));
    h.fund("buyer", "USDT", dec!(1000));
    h.limit("seller", Side::Sell, dec!(2), dec!(50));
    h.limit("seller", Side::Sell, dec!(3), dec!(51));

    let buy = h
        .engine
        .create_order(CreateOrderCommand::market("buyer", PAIR, Side::Buy, dec!(4)))
        .unwrap();

    assert_eq!(buy.order.status, OrderStatus::Filled);
    assert_eq!(buy.trades.len(), 2);
    assert_eq!(buy.trades[1].quantity, dec!(2));
    // 2 x 50 + 2 x 51
    let buyer_usdt = h.balance("buyer", "USDT");
    assert_eq!(buyer_usdt.available, dec!(798));
    assert_eq!(buyer_usdt.locked, dec!(0));
    assert_eq!(h.balance("buyer", "BTC").available, dec!(4));
    h.assert_reconciled();
}

#[test]
fn test_market_sell_without_bids_is_cancelled() {
    let h = Harness::new();
    h.fund("seller", "BTC", dec!(1));

    let sell = h
        .engine
        .create_order(CreateOrderCommand::market("seller", PAIR, Side::Sell, dec!(1)))
        .unwrap();
    assert!(sell.trades.is_empty());
    assert_eq!(sell.order.status, OrderStatus::Cancelled);
    assert_eq!(h.balance("seller", "BTC").available, dec!(1));
    assert_eq!(h.balance("seller", "BTC").locked, dec!(0));
}

#[test]
fn test_self_match_is_skipped() {
    let h = Harness::new();
    h.fund("alice", "BTC", dec!(1));
    h.fund("alice", "USDT", dec!(100));

    h.limit("alice", Side::Sell, dec!(1), dec!(50));
    let buy = h.limit("alice", Side::Buy, dec!(1), dec!(50));

    assert!(buy.trades.is_empty());
    assert_eq!(buy.order.status, OrderStatus::Open);
    assert_eq!(h.engine.book().resting_count(PAIR), 2);
}

#[test]
fn test_fees_are_collected_by_fee_account() {
    let config = EngineConfig {
        fee_account: Some("fees".to_string()),
        ..EngineConfig::default()
    };
    let h = Harness::with(dec!(0.001), dec!(0.002), config);
    h.fund("seller", "BTC", dec!(10));
    h.fund("buyer", "USDT", dec!(1000));

    h.limit("seller", Side::Sell, dec!(10), dec!(50));
    let buy = h.limit("buyer", Side::Buy, dec!(10), dec!(50));

    // Buyer is taker: 0.2% of 10 BTC; seller is maker: 0.1% of 500 USDT
    let trade = &buy.trades[0];
    assert_eq!(trade.buyer_fee, dec!(0.02));
    assert_eq!(trade.seller_fee, dec!(0.5));
    assert_eq!(h.balance("buyer", "BTC").available, dec!(9.98));
    assert_eq!(h.balance("seller", "USDT").available, dec!(499.5));
    assert_eq!(h.balance("fees", "BTC").available, dec!(0.02));
    assert_eq!(h.balance("fees", "USDT").available, dec!(0.5));
    h.assert_reconciled();
}

#[test]
fn test_conditional_order_waits_without_reserving() {
    let h = Harness::new();
    h.fund("alice", "BTC", dec!(1));

    let stop = h
        .engine
        .create_order(CreateOrderCommand::stop_loss("alice", PAIR, Side::Sell, dec!(1), dec!(40)))
        .unwrap();
    assert_eq!(stop.order.status, OrderStatus::Pending);
    assert_eq!(h.balance("alice", "BTC").locked, dec!(0));
    assert_eq!(h.engine.conditional_order_ids(PAIR), vec![stop.order.id]);
    assert_eq!(
        h.engine.get_user_conditional_orders("alice").unwrap().len(),
        1
    );

    // Pending orders go through the conditional cancel path
    assert!(matches!(
        h.engine.cancel_order("alice", &stop.order.id),
        Err(ExchangeError::InvalidState(_))
    ));
    let cancelled = h
        .engine
        .cancel_conditional_order("alice", &stop.order.id)
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(h.engine.conditional_order_ids(PAIR).is_empty());
}

#[test]
fn test_trailing_stop_needs_a_last_price() {
    let h = Harness::new();
    h.fund("alice", "BTC", dec!(1));

    let result = h.engine.create_order(CreateOrderCommand::trailing_stop(
        "alice",
        PAIR,
        Side::Sell,
        dec!(1),
        dec!(5),
    ));
    assert!(matches!(result, Err(ExchangeError::NoLiquidity(_))));
}

#[test]
fn test_activating_a_triggered_stop_sells_into_bids() {
    let h = Harness::new();
    h.fund("alice", "BTC", dec!(1));
    h.fund("bob", "USDT", dec!(1000));

    let stop = h
        .engine
        .create_order(CreateOrderCommand::stop_loss("alice", PAIR, Side::Sell, dec!(1), dec!(40)))
        .unwrap();
    h.limit("bob", Side::Buy, dec!(1), dec!(39));

    let triggered = h
        .engine
        .apply_trigger(&stop.order.id, dec!(39), |order, price| {
            order.stop_price.is_some_and(|stop| price <= stop)
        })
        .unwrap()
        .unwrap();
    assert_eq!(triggered.status, OrderStatus::Open);
    assert!(triggered.triggered_at.is_some());

    let execution = h.engine.activate_triggered(&stop.order.id).unwrap().unwrap();
    assert_eq!(execution.order.status, OrderStatus::Filled);
    assert_eq!(execution.trades[0].price, dec!(39));
    assert_eq!(h.balance("alice", "USDT").available, dec!(39));

    // Already activated
    assert!(h.engine.activate_triggered(&stop.order.id).unwrap().is_none());
    h.assert_reconciled();
}

#[test]
fn test_unfunded_trigger_is_cancelled() {
    let h = Harness::new();
    h.fund("alice", "USDT", dec!(10));
    h.fund("bob", "BTC", dec!(1));
    h.limit("bob", Side::Sell, dec!(1), dec!(60));

    let stop = h
        .engine
        .create_order(CreateOrderCommand::stop_loss("alice", PAIR, Side::Buy, dec!(1), dec!(55)))
        .unwrap();
    h.engine
        .apply_trigger(&stop.order.id, dec!(60), |_, _| true)
        .unwrap();

    let execution = h.engine.activate_triggered(&stop.order.id).unwrap().unwrap();
    assert_eq!(execution.order.status, OrderStatus::Cancelled);
    assert!(matches!(
        execution.interrupted,
        Some(ExchangeError::InsufficientBalance { .. })
    ));
    assert_eq!(h.balance("alice", "USDT").available, dec!(10));
}

#[test]
fn test_oco_fill_cancels_stop_leg() {
    let h = Harness::new();
    h.fund("alice", "BTC", dec!(1));
    h.fund("bob", "USDT", dec!(1000));

    let oco = h
        .engine
        .create_oco_order(CreateOcoCommand {
            user_id: "alice".into(),
            pair: PAIR.into(),
            side: Side::Sell,
            quantity: dec!(1),
            limit_price: dec!(60),
            stop_price: dec!(40),
            stop_limit_price: None,
            client_order_id: None,
        })
        .unwrap();
    assert_eq!(oco.limit.order.status, OrderStatus::Open);
    assert_eq!(oco.stop.status, OrderStatus::Pending);
    assert_eq!(oco.limit.order.parent_order, Some(oco.stop.id));
    assert_eq!(oco.stop.parent_order, Some(oco.limit.order.id));

    h.limit("bob", Side::Buy, dec!(1), dec!(60));

    assert_eq!(
        h.engine.get_order(&oco.limit.order.id).unwrap().status,
        OrderStatus::Filled
    );
    assert_eq!(
        h.engine.get_order(&oco.stop.id).unwrap().status,
        OrderStatus::Cancelled
    );
    assert!(h.engine.conditional_order_ids(PAIR).is_empty());
}

#[test]
fn test_oco_leg_trades_only_once_its_sibling_is_cancellable() {
    let h = Harness::with(
        Decimal::ZERO,
        Decimal::ZERO,
        EngineConfig {
            row_lock_timeout: Duration::from_millis(20),
            ..EngineConfig::default()
        },
    );
    h.fund("alice", "BTC", dec!(1));
    h.fund("bob", "USDT", dec!(1000));

    let oco = h
        .engine
        .create_oco_order(CreateOcoCommand {
            user_id: "alice".into(),
            pair: PAIR.into(),
            side: Side::Sell,
            quantity: dec!(1),
            limit_price: dec!(60),
            stop_price: dec!(40),
            stop_limit_price: None,
            client_order_id: None,
        })
        .unwrap();
    let take_limit_leg = || {
        CreateOrderCommand::limit("bob", PAIR, Side::Buy, dec!(1), dec!(60))
            .with_time_in_force(TimeInForce::IOC)
    };

    // Bob takes the limit leg while a trigger evaluation holds the stop leg
    let mut blocked = None;
    let triggered = h
        .engine
        .apply_trigger(&oco.stop.id, dec!(50), |_, _| {
            blocked = Some(h.engine.create_order(take_limit_leg()).unwrap());
            false
        })
        .unwrap();
    assert!(triggered.is_none());

    let blocked = blocked.unwrap();
    assert!(blocked.trades.is_empty());
    assert!(matches!(blocked.interrupted, Some(ExchangeError::Contention(_))));
    assert_eq!(
        h.engine.get_order(&oco.limit.order.id).unwrap().status,
        OrderStatus::Open
    );
    assert_eq!(
        h.engine.get_order(&oco.stop.id).unwrap().status,
        OrderStatus::Pending
    );
    assert_eq!(h.balance("alice", "BTC").locked, dec!(1));
    assert_eq!(h.balance("bob", "USDT").available, dec!(1000));

    let filled = h.engine.create_order(take_limit_leg()).unwrap();
    assert_eq!(filled.trades.len(), 1);
    assert_eq!(
        h.engine.get_order(&oco.limit.order.id).unwrap().status,
        OrderStatus::Filled
    );
    assert_eq!(
        h.engine.get_order(&oco.stop.id).unwrap().status,
        OrderStatus::Cancelled
    );
    assert!(h.engine.conditional_order_ids(PAIR).is_empty());
    h.assert_reconciled();
}

#[test]
fn test_oco_cancel_releases_both_legs() {
    let h = Harness::new();
    h.fund("alice", "BTC", dec!(1));

    let oco = h
        .engine
        .create_oco_order(CreateOcoCommand {
            user_id: "alice".into(),
            pair: PAIR.into(),
            side: Side::Sell,
            quantity: dec!(1),
            limit_price: dec!(60),
            stop_price: dec!(40),
            stop_limit_price: Some(dec!(39)),
            client_order_id: None,
        })
        .unwrap();
    assert_eq!(h.balance("alice", "BTC").locked, dec!(1));

    h.engine
        .cancel_conditional_order("alice", &oco.stop.id)
        .unwrap();

    assert_eq!(
        h.engine.get_order(&oco.limit.order.id).unwrap().status,
        OrderStatus::Cancelled
    );
    assert_eq!(h.balance("alice", "BTC").available, dec!(1));
    assert_eq!(h.balance("alice", "BTC").locked, dec!(0));
}

#[test]
fn test_oco_rejects_stop_on_wrong_side() {
    let h = Harness::new();
    h.fund("alice", "BTC", dec!(1));

    let result = h.engine.create_oco_order(CreateOcoCommand {
        user_id: "alice".into(),
        pair: PAIR.into(),
        side: Side::Sell,
        quantity: dec!(1),
        limit_price: dec!(40),
        stop_price: dec!(60),
        stop_limit_price: None,
        client_order_id: None,
    });
    assert!(matches!(result, Err(ExchangeError::InvalidOrder(_))));
    assert_eq!(h.balance("alice", "BTC").locked, dec!(0));
}

#[test]
fn test_failed_settlement_keeps_earlier_matches() {
    let h = Harness::build(
        Decimal::ZERO,
        Decimal::ZERO,
        EngineConfig::default(),
        Duration::from_millis(20),
    );
    let mut rx = h.publisher.subscribe();
    h.fund("alice", "BTC", dec!(1));
    h.fund("carol", "BTC", dec!(1));
    h.fund("bob", "USDT", dec!(1000));
    let first = h.limit("alice", Side::Sell, dec!(1), dec!(50));
    let second = h.limit("carol", Side::Sell, dec!(1), dec!(51));

    // Carol's quote row stays locked for the whole order, so only her match fails
    let carol_usdt = BalanceKey::new("carol", "USDT");
    let buy = h
        .ledger
        .transaction(std::slice::from_ref(&carol_usdt), |_| {
            Ok(h.engine.create_order(
                CreateOrderCommand::limit("bob", PAIR, Side::Buy, dec!(2), dec!(51))
                    .with_time_in_force(TimeInForce::IOC),
            ))
        })
        .unwrap()
        .unwrap();

    assert_eq!(buy.trades.len(), 1);
    assert_eq!(buy.trades[0].sell_order_id, first.order.id);
    assert_eq!(buy.order.filled_quantity, dec!(1));
    assert_eq!(buy.order.status, OrderStatus::Cancelled);
    assert!(matches!(buy.interrupted, Some(ExchangeError::Contention(_))));

    let carol_order = h.engine.get_order(&second.order.id).unwrap();
    assert_eq!(carol_order.status, OrderStatus::Open);
    assert_eq!(carol_order.filled_quantity, dec!(0));
    assert_eq!(h.balance("carol", "BTC").locked, dec!(1));
    assert_eq!(h.balance("carol", "USDT").total(), dec!(0));
    assert_eq!(h.balance("alice", "USDT").available, dec!(50));
    assert_eq!(h.balance("bob", "BTC").available, dec!(1));
    assert_eq!(h.balance("bob", "USDT").available, dec!(950));
    assert_eq!(h.balance("bob", "USDT").locked, dec!(0));

    let mut failures = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ExchangeEvent::SettlementFailed(failure) = event {
            failures.push(failure);
        }
    }
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].order_id, buy.order.id);
    assert_eq!(failures[0].counter_order_id, second.order.id);
    h.assert_reconciled();
}

#[test]
fn test_fok_market_buy_checks_what_the_reserve_can_pay_for() {
    let h = Harness::new();
    h.fund("alice", "BTC", dec!(1));
    h.fund("carol", "BTC", dec!(1));
    h.fund("bob", "USDT", dec!(1000));
    h.limit("alice", Side::Sell, dec!(1), dec!(100));
    h.limit("carol", Side::Sell, dec!(1), dec!(200));

    // Reserve is 2 x 100 x 1.05 = 210, enough for 1 at 100 but not 1 at 200
    let buy = h
        .engine
        .create_order(
            CreateOrderCommand::market("bob", PAIR, Side::Buy, dec!(2))
                .with_time_in_force(TimeInForce::FOK),
        )
        .unwrap();

    assert!(buy.trades.is_empty());
    assert_eq!(buy.order.status, OrderStatus::Cancelled);
    assert_eq!(buy.order.filled_quantity, dec!(0));
    assert_eq!(h.balance("bob", "USDT").available, dec!(1000));
    assert_eq!(h.balance("bob", "USDT").locked, dec!(0));
    assert_eq!(h.balance("alice", "BTC").locked, dec!(1));
    assert_eq!(h.balance("carol", "BTC").locked, dec!(1));
    h.assert_reconciled();
}

#[test]
fn test_fok_market_buy_fills_when_affordable() {
    let h = Harness::new();
    h.fund("alice", "BTC", dec!(2));
    h.fund("bob", "USDT", dec!(1000));
    h.limit("alice", Side::Sell, dec!(1), dec!(100));
    h.limit("alice", Side::Sell, dec!(1), dec!(104));

    let buy = h
        .engine
        .create_order(
            CreateOrderCommand::market("bob", PAIR, Side::Buy, dec!(2))
                .with_time_in_force(TimeInForce::FOK),
        )
        .unwrap();

    assert_eq!(buy.order.status, OrderStatus::Filled);
    assert_eq!(buy.trades.len(), 2);
    assert_eq!(h.balance("bob", "USDT").available, dec!(796));
    assert_eq!(h.balance("bob", "USDT").locked, dec!(0));
}

#[test]
fn test_limit_order_with_unrepresentable_notional_is_rejected() {
    let h = Harness::new();
    h.fund("bob", "USDT", dec!(1000));

    let result = h.engine.create_order(CreateOrderCommand::limit(
        "bob",
        PAIR,
        Side::Buy,
        dec!(1000000),
        dec!(100000000000000000000000),
    ));

    assert!(matches!(result, Err(ExchangeError::InvalidAmount(_))));
    assert_eq!(h.balance("bob", "USDT").locked, dec!(0));
    assert!(h.engine.get_user_orders("bob", None, None).unwrap().is_empty());
}

#[test]
fn test_events_follow_the_trade() {
    let h = Harness::new();
    let mut rx = h.publisher.subscribe();
    h.fund("seller", "BTC", dec!(1));
    h.fund("buyer", "USDT", dec!(100));

    h.limit("seller", Side::Sell, dec!(1), dec!(50));
    h.limit("buyer", Side::Buy, dec!(1), dec!(50));

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(match event {
            ExchangeEvent::OrderAccepted(_) => "accepted",
            ExchangeEvent::OrderTriggered(_) => "triggered",
            ExchangeEvent::OrderFilled(_) => "filled",
            ExchangeEvent::OrderCancelled(_) => "cancelled",
            ExchangeEvent::TradeExecuted(_) => "trade",
            ExchangeEvent::SettlementFailed(_) => "settlement_failed",
        });
    }
    assert_eq!(kinds, vec!["accepted", "accepted", "trade", "filled", "filled"]);
}

#[test]
fn test_user_queries() {
    let h = Harness::new();
    h.fund("alice", "BTC", dec!(2));
    let first = h.limit("alice", Side::Sell, dec!(1), dec!(50));
    let second = h.limit("alice", Side::Sell, dec!(1), dec!(51));
    h.engine.cancel_order("alice", &first.order.id).unwrap();

    let all = h.engine.get_user_orders("alice", None, None).unwrap();
    assert_eq!(all[0].id, second.order.id);
    assert_eq!(all[1].id, first.order.id);

    let open = h
        .engine
        .get_user_orders("alice", Some(PAIR), Some(OrderStatus::Open))
        .unwrap();
    assert_eq!(open.len(), 1);
    assert!(h
        .engine
        .get_user_orders("alice", Some("ETH_USDT"), None)
        .unwrap()
        .is_empty());
}

#[test]
fn test_concurrent_orders_conserve_funds() {
    let h = Harness::new();
    let sellers = ["s1", "s2", "s3", "s4"];
    let buyers = ["b1", "b2", "b3", "b4"];
    for user in sellers {
        h.fund(user, "BTC", dec!(20));
    }
    for user in buyers {
        h.fund(user, "USDT", dec!(2000));
    }

    thread::scope(|s| {
        for (seller, buyer) in sellers.iter().zip(buyers.iter()) {
            let engine = h.engine.clone();
            s.spawn(move || {
                for i in 0..10i64 {
                    let price = Decimal::from(95 + i % 10);
                    let cmd = CreateOrderCommand::limit(*seller, PAIR, Side::Sell, dec!(1), price);
                    while let Err(e) = engine.create_order(cmd.clone()) {
                        assert!(e.is_retryable(), "unexpected error: {e}");
                    }
                }
            });
            let engine = h.engine.clone();
            s.spawn(move || {
                for i in 0..10i64 {
                    let price = Decimal::from(100 + i % 5);
                    let cmd = CreateOrderCommand::limit(*buyer, PAIR, Side::Buy, dec!(1), price);
                    while let Err(e) = engine.create_order(cmd.clone()) {
                        assert!(e.is_retryable(), "unexpected error: {e}");
                    }
                }
            });
        }
    });

    let total = |currency: &str| -> Decimal {
        sellers
            .iter()
            .chain(buyers.iter())
            .map(|user| h.balance(user, currency).total())
            .sum()
    };
    assert_eq!(total("BTC"), dec!(80));
    assert_eq!(total("USDT"), dec!(8000));

    for trade in h.engine.trades().all() {
        assert!(trade.quantity > Decimal::ZERO);
    }
    for user in sellers.iter().chain(buyers.iter()) {
        for order in h.engine.get_user_orders(user, None, None).unwrap() {
            assert!(order.filled_quantity >= Decimal::ZERO);
            assert!(order.filled_quantity <= order.quantity);
        }
    }
    h.assert_reconciled();
}
