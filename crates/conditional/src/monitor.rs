use std::sync::Arc;
use std::time::Duration;

use bourse_core::{ExchangeEvent, Order, OrderId, Price};
use bourse_matching::MatchingEngine;
use bourse_ports::ExchangeResult;
use log::{debug, error, info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::trigger::evaluate_tick;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// React to every executed trade in addition to polling
    pub event_driven: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            event_driven: true,
        }
    }
}

/// Counters from one evaluation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationReport {
    pub evaluated: usize,
    pub triggered: usize,
    pub activated: usize,
    pub trades: usize,
    pub failed: usize,
}

impl EvaluationReport {
    fn merge(&mut self, other: EvaluationReport) {
        self.evaluated += other.evaluated;
        self.triggered += other.triggered;
        self.activated += other.activated;
        self.trades += other.trades;
        self.failed += other.failed;
    }
}

/// Promotes conditional orders into the matching engine
pub struct ConditionalOrderMonitor {
    engine: Arc<MatchingEngine>,
    config: MonitorConfig,
}

impl ConditionalOrderMonitor {
    pub fn new(engine: Arc<MatchingEngine>, config: MonitorConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Check one order against `price` under its row lock
    ///
    /// Returns the order if this call moved it from `pending` to `open`. The
    /// order is not funded or matched yet; see [`Self::activate`].
    pub fn trigger_order(&self, order_id: &OrderId, price: Price) -> ExchangeResult<Option<Order>> {
        self.engine.apply_trigger(order_id, price, evaluate_tick)
    }

    /// Fund and match a triggered order
    pub fn activate(&self, order_id: &OrderId, report: &mut EvaluationReport) {
        match self.engine.activate_triggered(order_id) {
            Ok(Some(execution)) => {
                report.activated += 1;
                report.trades += execution.trades.len();
                if let Some(e) = execution.interrupted {
                    warn!(
                        "Conditional activation interrupted: id={}, status={}, error={}",
                        order_id, execution.order.status, e
                    );
                    report.failed += 1;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Conditional activation failed: id={}, error={}", order_id, e);
                report.failed += 1;
            }
        }
    }

    /// Evaluate every pending conditional order on `pair` at `price`
    pub fn evaluate(&self, pair: &str, price: Price) -> EvaluationReport {
        let mut report = EvaluationReport::default();
        let mut triggered = Vec::new();

        for order_id in self.engine.conditional_order_ids(pair) {
            report.evaluated += 1;
            match self.trigger_order(&order_id, price) {
                Ok(Some(order)) => triggered.push(order.id),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "Conditional trigger check failed: id={}, pair={}, error={}",
                        order_id, pair, e
                    );
                    report.failed += 1;
                }
            }
        }

        report.triggered = triggered.len();
        for order_id in &triggered {
            self.activate(order_id, &mut report);
        }

        if report.triggered > 0 {
            info!(
                "Conditional evaluation: pair={}, price={}, triggered={}, activated={}, trades={}",
                pair, price, report.triggered, report.activated, report.trades
            );
        }
        report
    }

    /// One polling pass over every active pair with a last price
    ///
    /// Also activates orders left triggered but unfunded by an earlier pass,
    /// e.g. after a `Contention` failure.
    pub fn poll_once(&self) -> EvaluationReport {
        let mut report = EvaluationReport::default();

        for pair in self.engine.markets().active_pairs() {
            let Some(price) = pair.last_price() else {
                continue;
            };
            report.merge(self.evaluate(&pair.symbol, price));

            for order_id in self.engine.conditional_order_ids(&pair.symbol) {
                match self.engine.get_order(&order_id) {
                    Ok(order) if order.awaiting_activation() => {
                        debug!("Recovering triggered order: id={}", order_id);
                        self.activate(&order_id, &mut report);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Conditional recovery skipped: id={}, error={}", order_id, e);
                        report.failed += 1;
                    }
                }
            }
        }

        report
    }

    /// Re-evaluate a pair on every executed trade
    pub fn spawn_event_loop(
        self: &Arc<Self>,
        mut rx: broadcast::Receiver<ExchangeEvent>,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            info!("Conditional monitor listening for trades");
            loop {
                match rx.recv().await {
                    Ok(ExchangeEvent::TradeExecuted(trade)) => {
                        // Evaluation takes blocking row locks; keep it off the runtime workers
                        let evaluator = Arc::clone(&monitor);
                        let evaluated = tokio::task::spawn_blocking(move || {
                            evaluator.evaluate(&trade.pair, trade.price);
                        })
                        .await;
                        if let Err(e) = evaluated {
                            error!("Conditional evaluation task failed: {}", e);
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Conditional monitor lagged {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Event channel closed, stopping conditional monitor");
                        break;
                    }
                }
            }
        })
    }

    /// Poll every pair on a fixed interval
    pub fn spawn_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        let period = self.config.poll_interval;
        tokio::spawn(async move {
            info!("Starting conditional poller with interval of {:?}", period);
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let poller = Arc::clone(&monitor);
                match tokio::task::spawn_blocking(move || poller.poll_once()).await {
                    Ok(report) if report.failed > 0 => {
                        warn!("Conditional poll finished with {} failures", report.failed);
                    }
                    Ok(_) => {}
                    Err(e) => error!("Conditional poll task failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_book::OrderBookIndex;
    use bourse_clock::SystemClock;
    use bourse_core::{Currency, EntryType, OrderKind, OrderStatus, Side, TradingPair};
    use bourse_ledger::Ledger;
    use bourse_matching::{
        BroadcastEventPublisher, CreateOrderCommand, EngineConfig, MarketRegistry,
    };
    use bourse_ports::Clock;
    use rust_decimal_macros::dec;

    fn monitor() -> ConditionalOrderMonitor {
        let markets = Arc::new(MarketRegistry::new());
        markets.register_currency(Currency::new("BTC", 8)).unwrap();
        markets.register_currency(Currency::new("USDT", 6)).unwrap();
        markets
            .register_pair(TradingPair::new("BTC", "USDT"))
            .unwrap();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let engine = MatchingEngine::new(
            markets,
            Arc::new(Ledger::new(clock.clone())),
            Arc::new(OrderBookIndex::new()),
            Arc::new(BroadcastEventPublisher::default()),
            clock,
            EngineConfig::default(),
        );
        ConditionalOrderMonitor::new(Arc::new(engine), MonitorConfig::default())
    }

    fn trailing_sell(monitor: &ConditionalOrderMonitor) -> OrderId {
        monitor
            .engine
            .markets()
            .record_last_price("BTC_USDT", dec!(100));
        monitor
            .engine
            .create_order(CreateOrderCommand::trailing_stop(
                "alice",
                "BTC_USDT",
                Side::Sell,
                dec!(1),
                dec!(5),
            ))
            .unwrap()
            .order
            .id
    }

    #[test]
    fn test_trailing_stop_triggers_into_market_order() {
        let monitor = monitor();
        let id = trailing_sell(&monitor);

        let order = monitor.trigger_order(&id, dec!(94)).unwrap().unwrap();
        assert_eq!(order.kind, OrderKind::Market);
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.price, None);
        assert!(order.triggered_at.is_some());
        assert_eq!(order.highest_price_seen, Some(dec!(100)));
    }

    #[test]
    fn test_trailing_extreme_is_persisted() {
        let monitor = monitor();
        let id = trailing_sell(&monitor);

        assert!(monitor.trigger_order(&id, dec!(110)).unwrap().is_none());
        let order = monitor.engine.get_order(&id).unwrap();
        assert_eq!(order.highest_price_seen, Some(dec!(110)));
        assert_eq!(order.status, OrderStatus::Pending);

        // 104 > 110 * 0.95
        assert!(monitor.trigger_order(&id, dec!(104)).unwrap().is_none());
        assert!(monitor.trigger_order(&id, dec!(104.5)).unwrap().is_some());
    }

    #[test]
    fn test_order_triggers_once() {
        let monitor = monitor();
        let id = trailing_sell(&monitor);

        assert!(monitor.trigger_order(&id, dec!(90)).unwrap().is_some());
        assert!(monitor.trigger_order(&id, dec!(80)).unwrap().is_none());
    }

    #[test]
    fn test_cancelled_order_does_not_trigger() {
        let monitor = monitor();
        let id = trailing_sell(&monitor);

        monitor
            .engine
            .cancel_conditional_order("alice", &id)
            .unwrap();
        assert!(monitor.trigger_order(&id, dec!(50)).unwrap().is_none());
        assert_eq!(
            monitor.engine.get_order(&id).unwrap().status,
            OrderStatus::Cancelled
        );
    }

    #[test]
    fn test_evaluate_without_liquidity_cancels_the_activation() {
        let monitor = monitor();
        monitor
            .engine
            .ledger()
            .credit("alice", "BTC", dec!(1), EntryType::Deposit, None)
            .unwrap();
        let id = trailing_sell(&monitor);

        // No bids: the activated market sell is cancelled
        let report = monitor.evaluate("BTC_USDT", dec!(90));
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.triggered, 1);
        assert_eq!(report.activated, 1);
        assert_eq!(report.trades, 0);

        let order = monitor.engine.get_order(&id).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        let balance = monitor.engine.ledger().balance("alice", "BTC").unwrap();
        assert_eq!(balance.available, dec!(1));
        assert_eq!(balance.locked, dec!(0));
    }
}
