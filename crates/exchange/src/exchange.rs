use std::sync::Arc;
use std::time::Duration;

use bourse_book::{OrderBookDepth, OrderBookIndex, Spread};
use bourse_clock::SystemClock;
use bourse_conditional::ConditionalOrderMonitor;
use bourse_core::{
    Amount, Balance, ExchangeEvent, Order, OrderId, OrderStatus, Reference, ReferenceKind, Trade,
};
use bourse_ledger::{AdjustmentDirection, Ledger, Reconciliation, TransferReceipt};
use bourse_matching::{
    BroadcastEventPublisher, CreateOcoCommand, CreateOrderCommand, MarketRegistry,
    MatchingEngine, OcoExecution, OrderExecution,
};
use bourse_ports::{Clock, ExchangeError, ExchangeResult};
use log::info;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, ExchangeConfig};

pub const DEFAULT_BOOK_DEPTH: usize = 50;
pub const MAX_BOOK_DEPTH: usize = 100;

/// Failure while building an exchange from its configuration
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load reference data: {0}")]
    Exchange(#[from] ExchangeError),
}

/// The exchange core: ledger, order book index, matching engine and
/// conditional order monitor behind one request-layer API
pub struct Exchange {
    config: ExchangeConfig,
    markets: Arc<MarketRegistry>,
    ledger: Arc<Ledger>,
    book: Arc<OrderBookIndex>,
    engine: Arc<MatchingEngine>,
    monitor: Arc<ConditionalOrderMonitor>,
    publisher: Arc<BroadcastEventPublisher>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Exchange {
    pub fn new(config: ExchangeConfig) -> Result<Self, SetupError> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Build with an explicit clock (tests use a `ManualClock`)
    pub fn with_clock(config: ExchangeConfig, clock: Arc<dyn Clock>) -> Result<Self, SetupError> {
        config.validate()?;

        let markets = Arc::new(MarketRegistry::new());
        for currency in &config.currencies {
            markets.register_currency(currency.to_domain())?;
        }
        for pair in &config.pairs {
            markets.register_pair(pair.to_domain())?;
        }

        let clock_name = clock.name().to_string();
        let ledger = Arc::new(
            Ledger::new(clock.clone()).with_lock_timeout(config.engine.lock_timeout()),
        );
        let book = Arc::new(OrderBookIndex::with_cache_ttl(Duration::from_millis(
            config.book.cache_ttl_ms,
        )));
        let publisher = Arc::new(BroadcastEventPublisher::new(config.event_capacity));
        let engine = Arc::new(MatchingEngine::new(
            markets.clone(),
            ledger.clone(),
            book.clone(),
            publisher.clone(),
            clock,
            config.engine.to_engine_config(),
        ));
        let monitor = Arc::new(ConditionalOrderMonitor::new(
            engine.clone(),
            config.monitor.to_monitor_config(),
        ));

        for account in &config.accounts {
            for deposit in &account.deposits {
                let currency = markets.currency(&deposit.currency)?;
                ledger.deposit(
                    &account.user_id,
                    &currency,
                    deposit.amount,
                    Some(Reference::new(ReferenceKind::Deposit, "opening-balance")),
                )?;
            }
        }

        info!(
            "Exchange initialized: name={}, clock={}, currencies={}, pairs={}, accounts={}",
            config.name,
            clock_name,
            config.currencies.len(),
            config.pairs.len(),
            config.accounts.len()
        );

        Ok(Self {
            config,
            markets,
            ledger,
            book,
            engine,
            monitor,
            publisher,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the conditional monitor tasks; must run inside a tokio runtime
    pub fn start(&self) {
        if !self.config.monitor.enabled {
            info!("Conditional monitor disabled");
            return;
        }

        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }
        if self.config.monitor.event_driven {
            tasks.push(self.monitor.spawn_event_loop(self.publisher.subscribe()));
        }
        tasks.push(self.monitor.spawn_poller());
        info!("Exchange started: name={}, tasks={}", self.config.name, tasks.len());
    }

    /// Stop the background tasks
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock();
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("Exchange stopped: name={}", self.config.name);
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn markets(&self) -> &Arc<MarketRegistry> {
        &self.markets
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn engine(&self) -> &Arc<MatchingEngine> {
        &self.engine
    }

    pub fn monitor(&self) -> &Arc<ConditionalOrderMonitor> {
        &self.monitor
    }

    // Orders

    pub fn create_order(&self, cmd: CreateOrderCommand) -> ExchangeResult<OrderExecution> {
        self.engine.create_order(cmd)
    }

    pub fn create_oco_order(&self, cmd: CreateOcoCommand) -> ExchangeResult<OcoExecution> {
        self.engine.create_oco_order(cmd)
    }

    pub fn cancel_order(&self, user_id: &str, order_id: &OrderId) -> ExchangeResult<Order> {
        self.engine.cancel_order(user_id, order_id)
    }

    pub fn cancel_conditional_order(
        &self,
        user_id: &str,
        order_id: &OrderId,
    ) -> ExchangeResult<Order> {
        self.engine.cancel_conditional_order(user_id, order_id)
    }

    pub fn get_order(&self, order_id: &OrderId) -> ExchangeResult<Order> {
        self.engine.get_order(order_id)
    }

    pub fn get_user_orders(
        &self,
        user_id: &str,
        pair: Option<&str>,
        status: Option<OrderStatus>,
    ) -> ExchangeResult<Vec<Order>> {
        self.engine.get_user_orders(user_id, pair, status)
    }

    pub fn get_user_conditional_orders(&self, user_id: &str) -> ExchangeResult<Vec<Order>> {
        self.engine.get_user_conditional_orders(user_id)
    }

    // Market data

    /// Aggregated depth, `DEFAULT_BOOK_DEPTH` levels unless asked, at most `MAX_BOOK_DEPTH`
    pub fn get_order_book(&self, pair: &str, depth: Option<usize>) -> ExchangeResult<OrderBookDepth> {
        let pair = self.markets.pair(pair)?;
        let levels = depth.unwrap_or(DEFAULT_BOOK_DEPTH).clamp(1, MAX_BOOK_DEPTH);
        Ok(self.book.get_depth(&pair.symbol, levels))
    }

    pub fn get_spread(&self, pair: &str) -> ExchangeResult<Spread> {
        let pair = self.markets.pair(pair)?;
        Ok(self.book.get_spread(&pair.symbol))
    }

    pub fn recent_trades(&self, pair: &str, limit: usize) -> ExchangeResult<Vec<Trade>> {
        let pair = self.markets.pair(pair)?;
        Ok(self.engine.recent_trades(&pair.symbol, limit))
    }

    // Balances

    pub fn balance(&self, user_id: &str, currency: &str) -> ExchangeResult<Balance> {
        self.markets.currency(currency)?;
        self.ledger.balance(user_id, currency)
    }

    pub fn deposit(
        &self,
        user_id: &str,
        currency: &str,
        amount: Amount,
        reference: Option<String>,
    ) -> ExchangeResult<Balance> {
        let currency = self.markets.currency(currency)?;
        let reference = reference.map(|id| Reference::new(ReferenceKind::Deposit, id));
        self.ledger
            .deposit(user_id, &currency, amount, reference)
            .map(|(balance, _)| balance)
    }

    pub fn withdraw(
        &self,
        user_id: &str,
        currency: &str,
        amount: Amount,
        reference: Option<String>,
    ) -> ExchangeResult<Balance> {
        let currency = self.markets.currency(currency)?;
        let reference = reference.map(|id| Reference::new(ReferenceKind::Withdrawal, id));
        self.ledger
            .withdraw(user_id, &currency, amount, reference)
            .map(|(balance, _)| balance)
    }

    /// Move available funds between two users
    pub fn transfer(
        &self,
        from: &str,
        to: &str,
        currency: &str,
        amount: Amount,
        note: Option<&str>,
    ) -> ExchangeResult<TransferReceipt> {
        let currency = self.markets.currency(currency)?;
        self.ledger.transfer(from, to, &currency, amount, note)
    }

    pub fn admin_adjust(
        &self,
        actor: &str,
        user_id: &str,
        currency: &str,
        amount: Amount,
        direction: AdjustmentDirection,
        reason: &str,
    ) -> ExchangeResult<Balance> {
        self.markets.currency(currency)?;
        self.ledger
            .admin_adjust(actor, user_id, currency, amount, direction, reason)
            .map(|(balance, _)| balance)
    }

    pub fn reconcile(&self, user_id: &str, currency: &str) -> ExchangeResult<Reconciliation> {
        self.ledger.reconcile(user_id, currency)
    }

    // Events

    /// Subscribe to the notification side channel
    pub fn subscribe(&self) -> broadcast::Receiver<ExchangeEvent> {
        self.publisher.subscribe()
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}
