use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bourse_book::OrderBookIndex;
use bourse_core::{
    ExchangeEvent, Order, OrderId, OrderKind, OrderStatus, Price, Quantity, Reference,
    SettlementFailedEvent, Side, TimeInForce, Trade, TradingPair, UserId,
};
use bourse_ledger::Ledger;
use bourse_ports::{Clock, EventPublisher, ExchangeError, ExchangeResult};
use dashmap::DashMap;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::command::{CreateOcoCommand, CreateOrderCommand, OcoExecution, OrderExecution};
use crate::markets::MarketRegistry;
use crate::settlement::{Settlement, settle};
use crate::store::{OrderRow, OrderStore};
use crate::trades::TradeStore;
use crate::validation::{notional, validate_order};

/// Matching engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wait for a contended order row before failing with `Contention`
    pub row_lock_timeout: Duration,
    /// Wait for a pair's matching lock before failing with `Contention`
    pub pair_lock_timeout: Duration,
    /// Safety margin over the best ask when reserving for a market buy
    pub market_buy_buffer: Decimal,
    /// Account credited with trading fees; fees are simply withheld when unset
    pub fee_account: Option<UserId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            row_lock_timeout: Duration::from_millis(250),
            pair_lock_timeout: Duration::from_secs(2),
            market_buy_buffer: Decimal::new(5, 2),
            fee_account: None,
        }
    }
}

/// Owner of every order and trade
///
/// Matching is serialized per trading pair by a pair lock. Within a pair the
/// lock order is: pair, incoming order row, OCO sibling rows, resting order
/// row, ledger rows.
pub struct MatchingEngine {
    markets: Arc<MarketRegistry>,
    ledger: Arc<Ledger>,
    book: Arc<OrderBookIndex>,
    orders: OrderStore,
    trades: TradeStore,
    pair_locks: DashMap<String, Arc<Mutex<()>>>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    sequence: AtomicU64,
}

impl MatchingEngine {
    pub fn new(
        markets: Arc<MarketRegistry>,
        ledger: Arc<Ledger>,
        book: Arc<OrderBookIndex>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        for pair in markets.pairs() {
            book.register_pair(&pair.symbol);
        }

        Self {
            markets,
            ledger,
            book,
            orders: OrderStore::new(config.row_lock_timeout),
            trades: TradeStore::new(),
            pair_locks: DashMap::new(),
            publisher,
            clock,
            config,
            sequence: AtomicU64::new(1),
        }
    }

    pub fn markets(&self) -> &Arc<MarketRegistry> {
        &self.markets
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn book(&self) -> &Arc<OrderBookIndex> {
        &self.book
    }

    pub fn trades(&self) -> &TradeStore {
        &self.trades
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate, reserve funds, match, then apply time-in-force
    ///
    /// Conditional kinds are stored `pending` without reserving funds; they
    /// are funded and matched when the monitor activates them.
    pub fn create_order(&self, cmd: CreateOrderCommand) -> ExchangeResult<OrderExecution> {
        let pair = self.markets.pair(&cmd.pair)?;
        validate_order(&cmd, &pair)?;

        let lock = self.pair_lock(&pair.symbol);
        let _guard = self.acquire_pair(&pair.symbol, &lock)?;

        if cmd.kind.is_conditional() {
            let order = self.accept_conditional(&cmd, &pair)?;
            return Ok(OrderExecution::accepted(order));
        }

        let mut order = self.build_order(&cmd);
        self.reserve(&mut order, &pair)?;
        self.accept(order.clone());

        let row = self.orders.row(&order.id)?;
        let mut taker = self.orders.acquire(&row)?;
        Ok(self.execute(&mut taker, &pair))
    }

    /// Place a limit leg and a pending stop leg that cancel each other
    ///
    /// The first fill of either leg cancels the other. A stop leg that
    /// triggers cancels the limit leg before reserving its own funds.
    pub fn create_oco_order(&self, cmd: CreateOcoCommand) -> ExchangeResult<OcoExecution> {
        let pair = self.markets.pair(&cmd.pair)?;

        let mut limit_cmd = CreateOrderCommand::limit(
            cmd.user_id.clone(),
            cmd.pair.clone(),
            cmd.side,
            cmd.quantity,
            cmd.limit_price,
        );
        limit_cmd.client_order_id = cmd.client_order_id.clone();
        let stop_cmd = match cmd.stop_limit_price {
            Some(stop_limit_price) => CreateOrderCommand::stop_limit(
                cmd.user_id.clone(),
                cmd.pair.clone(),
                cmd.side,
                cmd.quantity,
                cmd.stop_price,
                stop_limit_price,
            ),
            None => CreateOrderCommand::stop_loss(
                cmd.user_id.clone(),
                cmd.pair.clone(),
                cmd.side,
                cmd.quantity,
                cmd.stop_price,
            ),
        };
        validate_order(&limit_cmd, &pair)?;
        validate_order(&stop_cmd, &pair)?;

        let misordered = match cmd.side {
            Side::Sell => cmd.stop_price >= cmd.limit_price,
            Side::Buy => cmd.stop_price <= cmd.limit_price,
        };
        if misordered {
            return Err(ExchangeError::InvalidOrder(format!(
                "OCO {} needs the stop price on the far side of the limit price",
                cmd.side
            )));
        }

        let lock = self.pair_lock(&pair.symbol);
        let _guard = self.acquire_pair(&pair.symbol, &lock)?;

        let mut limit = self.build_order(&limit_cmd);
        let mut stop = self.build_order(&stop_cmd);
        limit.parent_order = Some(stop.id);
        stop.parent_order = Some(limit.id);

        self.reserve(&mut limit, &pair)?;
        self.accept(stop.clone());
        self.accept(limit.clone());
        info!(
            "OCO placed: limit_id={}, stop_id={}, user={}, pair={}",
            limit.id, stop.id, cmd.user_id, pair.symbol
        );

        let row = self.orders.row(&limit.id)?;
        let mut limit_row = self.orders.acquire(&row)?;
        let limit_execution = self.execute(&mut limit_row, &pair);
        drop(limit_row);

        Ok(OcoExecution {
            limit: limit_execution,
            stop: self.orders.get(&stop.id)?,
        })
    }

    /// Cancel an open or partially filled order and release its reserve
    pub fn cancel_order(&self, user_id: &str, order_id: &OrderId) -> ExchangeResult<Order> {
        let pair = self.owned_order_pair(user_id, order_id)?;
        let lock = self.pair_lock(&pair.symbol);
        let _guard = self.acquire_pair(&pair.symbol, &lock)?;

        let row = self.orders.row(order_id)?;
        let mut order = self.orders.acquire(&row)?;
        if !order.status.is_active() {
            return Err(ExchangeError::InvalidState(format!(
                "cannot cancel order {} in status {}",
                order_id, order.status
            )));
        }

        let sibling_rows = self.sibling_rows(&[&*order])?;
        let mut siblings = self.acquire_rows(&sibling_rows)?;

        self.cancel_active(&mut order, &pair, "user request")?;
        self.cancel_siblings(&mut siblings, &pair);
        self.book.invalidate(&pair.symbol);
        Ok(order.clone())
    }

    /// Cancel a conditional order that has not triggered yet
    pub fn cancel_conditional_order(
        &self,
        user_id: &str,
        order_id: &OrderId,
    ) -> ExchangeResult<Order> {
        let pair = self.owned_order_pair(user_id, order_id)?;
        let lock = self.pair_lock(&pair.symbol);
        let _guard = self.acquire_pair(&pair.symbol, &lock)?;

        let row = self.orders.row(order_id)?;
        let mut order = self.orders.acquire(&row)?;
        if order.status != OrderStatus::Pending {
            return Err(ExchangeError::InvalidState(format!(
                "cannot cancel conditional order {} in status {}",
                order_id, order.status
            )));
        }

        let sibling_rows = self.sibling_rows(&[&*order])?;
        let mut siblings = self.acquire_rows(&sibling_rows)?;

        order.mark_cancelled(self.clock.now());
        self.orders.refresh_index(&order);
        info!(
            "Conditional order cancelled: id={}, kind={}, user={}",
            order.id, order.kind, order.user_id
        );
        self.publisher
            .publish(ExchangeEvent::OrderCancelled((&*order).into()));

        self.cancel_siblings(&mut siblings, &pair);
        Ok(order.clone())
    }

    /// Run the trigger transition for a pending order under its row lock
    ///
    /// `rule` may update the order's running extremes (kept either way) and
    /// returns whether the order triggers at `price`.
    pub fn apply_trigger(
        &self,
        order_id: &OrderId,
        price: Price,
        rule: impl FnOnce(&mut Order, Price) -> bool,
    ) -> ExchangeResult<Option<Order>> {
        let triggered = self.orders.update(order_id, |order| {
            if order.status != OrderStatus::Pending || !rule(order, price) {
                return Ok(None);
            }
            order.trigger(self.clock.now());
            Ok(Some(order.clone()))
        })?;

        if let Some(order) = &triggered {
            info!(
                "Order triggered: id={}, pair={}, side={}, price={}, activated_kind={}",
                order.id, order.pair, order.side, price, order.kind
            );
            self.publisher
                .publish(ExchangeEvent::OrderTriggered(order.into()));
        }
        Ok(triggered)
    }

    /// Fund and match an order the monitor has triggered
    ///
    /// Returns `None` when the order no longer awaits activation (already
    /// activated, or cancelled in between).
    pub fn activate_triggered(&self, order_id: &OrderId) -> ExchangeResult<Option<OrderExecution>> {
        let snapshot = self.orders.get(order_id)?;
        let pair = self.markets.pair(&snapshot.pair)?;
        let lock = self.pair_lock(&pair.symbol);
        let _guard = self.acquire_pair(&pair.symbol, &lock)?;

        let row = self.orders.row(order_id)?;
        let mut order = self.orders.acquire(&row)?;
        if !order.awaiting_activation() {
            return Ok(None);
        }

        // A sibling that cannot be cancelled yet leaves the order for a retry
        self.cancel_sibling(&order, &pair)?;

        if let Err(e) = self.reserve(&mut order, &pair) {
            if e.is_retryable() {
                return Err(e);
            }
            warn!(
                "Triggered order could not be funded: id={}, user={}, error={}",
                order.id, order.user_id, e
            );
            order.mark_cancelled(self.clock.now());
            self.orders.refresh_index(&order);
            self.publisher
                .publish(ExchangeEvent::OrderCancelled((&*order).into()));
            return Ok(Some(OrderExecution {
                order: order.clone(),
                trades: Vec::new(),
                interrupted: Some(e),
            }));
        }

        info!(
            "Activating triggered order: id={}, kind={}, reserved={}",
            order.id, order.kind, order.reserved
        );
        Ok(Some(self.execute(&mut order, &pair)))
    }

    pub fn get_order(&self, order_id: &OrderId) -> ExchangeResult<Order> {
        self.orders.get(order_id)
    }

    /// A user's orders, newest first, optionally narrowed by pair and status
    pub fn get_user_orders(
        &self,
        user_id: &str,
        pair: Option<&str>,
        status: Option<OrderStatus>,
    ) -> ExchangeResult<Vec<Order>> {
        Ok(self
            .orders
            .for_user(user_id)?
            .into_iter()
            .filter(|o| pair.is_none_or(|p| o.pair == p))
            .filter(|o| status.is_none_or(|s| o.status == s))
            .collect())
    }

    /// A user's conditional orders still waiting for their trigger
    pub fn get_user_conditional_orders(&self, user_id: &str) -> ExchangeResult<Vec<Order>> {
        self.get_user_orders(user_id, None, Some(OrderStatus::Pending))
    }

    pub fn recent_trades(&self, pair: &str, limit: usize) -> Vec<Trade> {
        self.trades.recent(pair, limit)
    }

    /// Conditional orders on a pair that are pending or awaiting activation
    pub fn conditional_order_ids(&self, pair: &str) -> Vec<OrderId> {
        self.orders.conditional_ids(pair)
    }

    fn execute(&self, order: &mut Order, pair: &TradingPair) -> OrderExecution {
        let mut trades = Vec::new();
        let mut interrupted = None;

        if order.time_in_force == TimeInForce::FOK && !self.can_fill_completely(order, pair) {
            info!(
                "FOK order cannot be filled completely: id={}, quantity={}",
                order.id, order.quantity
            );
        } else if let Err(e) = self.match_order(order, pair, &mut trades) {
            interrupted = Some(e);
        }

        if let Err(e) = self.apply_time_in_force(order, pair) {
            error!(
                "Failed to finalize order: id={}, error={}",
                order.id, e
            );
            interrupted.get_or_insert(e);
        }

        self.orders.refresh_index(order);
        self.book.invalidate(&pair.symbol);

        OrderExecution {
            order: order.clone(),
            trades,
            interrupted,
        }
    }

    fn match_order(
        &self,
        order: &mut Order,
        pair: &TradingPair,
        trades: &mut Vec<Trade>,
    ) -> ExchangeResult<()> {
        let candidates = self.book.get_matching_orders(
            &pair.symbol,
            order.side,
            order.price,
            order.is_market(),
        );

        for maker in candidates {
            if order.is_filled() {
                break;
            }
            if maker.user_id == order.user_id {
                debug!("Skipping self-match: taker={}, maker={}", order.id, maker.id);
                continue;
            }
            let Some(price) = maker.price else {
                continue;
            };

            let mut quantity = order.remaining_quantity().min(maker.remaining_quantity());
            if order.is_market() && order.side == Side::Buy {
                quantity = quantity.min(affordable_quantity(order.reserved, price, pair));
            }
            if quantity <= Decimal::ZERO {
                break;
            }

            match self.execute_trade(order, &maker, quantity, price, pair) {
                Ok(trade) => trades.push(trade),
                Err(e) => {
                    error!(
                        "Settlement failed, stopping match: taker={}, maker={}, error={}",
                        order.id, maker.id, e
                    );
                    self.publisher
                        .publish(ExchangeEvent::SettlementFailed(SettlementFailedEvent {
                            order_id: order.id,
                            counter_order_id: maker.id,
                            pair: pair.symbol.clone(),
                            reason: e.to_string(),
                            timestamp: self.clock.now(),
                        }));
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Settle one match and record the trade
    ///
    /// The resting order is updated under its row lock, and only if the
    /// ledger transaction commits. OCO siblings of either side are locked
    /// first and cancelled with the trade; if one cannot be locked the match
    /// fails with `Contention` and nothing is settled.
    fn execute_trade(
        &self,
        taker: &mut Order,
        resting: &Order,
        quantity: Quantity,
        price: Price,
        pair: &TradingPair,
    ) -> ExchangeResult<Trade> {
        let now = self.clock.now();
        let trade_id = Uuid::new_v4();

        let sibling_rows = self.sibling_rows(&[resting, &*taker])?;
        let mut siblings = self.acquire_rows(&sibling_rows)?;

        let (trade, maker) = self.orders.update(&resting.id, |maker| {
            if !maker.status.is_active() {
                return Err(ExchangeError::InvalidState(format!(
                    "resting order {} is {}",
                    maker.id, maker.status
                )));
            }

            let quantity = quantity.min(maker.remaining_quantity());
            let quote_quantity = notional(quantity, price)?;
            let buyer_is_maker = maker.side == Side::Buy;
            let fees = pair.trade_fees(quantity, quote_quantity, buyer_is_maker);

            let (buy, sell) = if buyer_is_maker {
                (&mut *maker, &mut *taker)
            } else {
                (&mut *taker, &mut *maker)
            };

            if buy.reserved < quote_quantity {
                return Err(ExchangeError::InsufficientLocked {
                    currency: pair.quote.clone(),
                    required: quote_quantity,
                    locked: buy.reserved,
                });
            }
            if sell.reserved < quantity {
                return Err(ExchangeError::InsufficientLocked {
                    currency: pair.base.clone(),
                    required: quantity,
                    locked: sell.reserved,
                });
            }

            // A trade that completes an order frees whatever reserve it still holds
            let buyer_release = if buy.remaining_quantity() == quantity {
                buy.reserved - quote_quantity
            } else {
                Decimal::ZERO
            };
            let seller_release = if sell.remaining_quantity() == quantity {
                sell.reserved - quantity
            } else {
                Decimal::ZERO
            };

            settle(
                &self.ledger,
                &Settlement {
                    pair,
                    trade_id,
                    buyer: &buy.user_id,
                    seller: &sell.user_id,
                    buy_order_id: buy.id,
                    sell_order_id: sell.id,
                    quantity,
                    quote_quantity,
                    fees,
                    buyer_release,
                    seller_release,
                },
                self.config.fee_account.as_ref(),
            )?;

            buy.reserved -= quote_quantity + buyer_release;
            sell.reserved -= quantity + seller_release;
            buy.record_fill(quantity, now);
            sell.record_fill(quantity, now);

            let trade = Trade::new_with_id(
                trade_id,
                pair.symbol.clone(),
                buy.id,
                sell.id,
                buy.user_id.clone(),
                sell.user_id.clone(),
                price,
                quantity,
                fees,
                now,
            );
            Ok((trade, maker.clone()))
        })?;

        self.book.upsert(&maker);
        self.trades.record(trade.clone());
        self.markets.record_last_price(&pair.symbol, price);

        info!(
            "Trade executed: id={}, pair={}, price={}, quantity={}, buyer={}, seller={}, buyer_is_maker={}",
            trade.id,
            trade.pair,
            trade.price,
            trade.quantity,
            trade.buyer_id,
            trade.seller_id,
            trade.buyer_is_maker
        );
        self.publisher
            .publish(ExchangeEvent::TradeExecuted((&trade).into()));

        for order in [&maker, &*taker] {
            if order.status == OrderStatus::Filled {
                self.publisher
                    .publish(ExchangeEvent::OrderFilled(order.into()));
            }
        }

        self.cancel_siblings(&mut siblings, pair);

        Ok(trade)
    }

    /// Rest a GTC limit remainder, cancel any other unfilled remainder
    fn apply_time_in_force(&self, order: &mut Order, pair: &TradingPair) -> ExchangeResult<()> {
        if !order.status.is_active() {
            return Ok(());
        }

        if order.kind == OrderKind::Limit && order.time_in_force.may_rest() {
            self.book.upsert(order);
            debug!(
                "Order resting: id={}, price={:?}, remaining={}",
                order.id,
                order.price,
                order.remaining_quantity()
            );
            return Ok(());
        }

        let reason = match (order.kind, order.time_in_force) {
            (OrderKind::Market, _) => "market order remainder",
            (_, TimeInForce::FOK) => "FOK not completely filled",
            _ => "IOC remainder",
        };
        self.cancel_active(order, pair, reason)
    }

    /// Release the reserve, mark cancelled and pull the order from the book
    fn cancel_active(&self, order: &mut Order, pair: &TradingPair, reason: &str) -> ExchangeResult<()> {
        if order.reserved > Decimal::ZERO {
            self.ledger.unlock(
                &order.user_id,
                order.lock_currency(pair),
                order.reserved,
                Some(Reference::order(order.id)),
            )?;
            order.reserved = Decimal::ZERO;
        }

        order.mark_cancelled(self.clock.now());
        self.book.remove(&pair.symbol, &order.id);
        self.orders.refresh_index(order);

        info!(
            "Order cancelled: id={}, reason={}, filled={}/{}",
            order.id, reason, order.filled_quantity, order.quantity
        );
        self.publisher
            .publish(ExchangeEvent::OrderCancelled((&*order).into()));
        Ok(())
    }

    /// Rows of the OCO siblings linked to `orders`
    fn sibling_rows(&self, orders: &[&Order]) -> ExchangeResult<Vec<OrderRow>> {
        orders
            .iter()
            .filter_map(|order| order.parent_order)
            .map(|id| self.orders.row(&id))
            .collect()
    }

    fn acquire_rows<'a>(&self, rows: &'a [OrderRow]) -> ExchangeResult<Vec<MutexGuard<'a, Order>>> {
        rows.iter().map(|row| self.orders.acquire(row)).collect()
    }

    fn cancel_siblings(&self, siblings: &mut [MutexGuard<'_, Order>], pair: &TradingPair) {
        for sibling in siblings.iter_mut() {
            if let Err(e) = self.cancel_linked(sibling, pair) {
                error!(
                    "Failed to cancel OCO sibling: id={}, linked_to={:?}, error={}",
                    sibling.id, sibling.parent_order, e
                );
            }
        }
    }

    fn cancel_sibling(&self, order: &Order, pair: &TradingPair) -> ExchangeResult<()> {
        let Some(sibling_id) = order.parent_order else {
            return Ok(());
        };

        let row = self.orders.row(&sibling_id)?;
        let mut sibling = self.orders.acquire(&row)?;
        self.cancel_linked(&mut sibling, pair)
    }

    /// Cancel one leg of an OCO pair; a leg that already finished is left alone
    fn cancel_linked(&self, sibling: &mut Order, pair: &TradingPair) -> ExchangeResult<()> {
        match sibling.status {
            OrderStatus::Pending => {
                sibling.mark_cancelled(self.clock.now());
                self.orders.refresh_index(sibling);
                info!(
                    "OCO sibling cancelled: id={}, linked_to={:?}",
                    sibling.id, sibling.parent_order
                );
                self.publisher
                    .publish(ExchangeEvent::OrderCancelled((&*sibling).into()));
                Ok(())
            }
            OrderStatus::Open | OrderStatus::Partial => {
                self.cancel_active(sibling, pair, "OCO sibling executed")
            }
            _ => Ok(()),
        }
    }

    /// Dry run of `match_order` against the current book
    ///
    /// Same candidates, same self-match rule and, for a market buy, the same
    /// reserve cap, so an order that passes cannot stop short for lack of
    /// liquidity or funds.
    fn can_fill_completely(&self, order: &Order, pair: &TradingPair) -> bool {
        let market_buy = order.is_market() && order.side == Side::Buy;
        let mut remaining = order.remaining_quantity();
        let mut budget = order.reserved;

        let candidates = self.book.get_matching_orders(
            &pair.symbol,
            order.side,
            order.price,
            order.is_market(),
        );
        for maker in candidates {
            if remaining <= Decimal::ZERO {
                break;
            }
            if maker.user_id == order.user_id {
                continue;
            }
            let Some(price) = maker.price else {
                continue;
            };

            let mut quantity = remaining.min(maker.remaining_quantity());
            if market_buy {
                quantity = quantity.min(affordable_quantity(budget, price, pair));
                match notional(quantity, price) {
                    Ok(cost) => budget -= cost,
                    Err(_) => return false,
                }
            }
            if quantity <= Decimal::ZERO {
                return false;
            }
            remaining -= quantity;
        }

        remaining <= Decimal::ZERO
    }

    fn accept_conditional(&self, cmd: &CreateOrderCommand, pair: &TradingPair) -> ExchangeResult<Order> {
        let mut order = self.build_order(cmd);
        if cmd.kind == OrderKind::TrailingStop {
            let reference = pair.last_price().ok_or_else(|| {
                ExchangeError::NoLiquidity(format!(
                    "no last price on {} to anchor a trailing stop",
                    pair.symbol
                ))
            })?;
            order = order.with_trailing(cmd.trailing_percent, reference);
        }

        self.accept(order.clone());
        Ok(order)
    }

    /// Lock the funds backing an order's remainder
    fn reserve(&self, order: &mut Order, pair: &TradingPair) -> ExchangeResult<()> {
        let amount = match (order.side, order.price) {
            (Side::Sell, _) => order.remaining_quantity(),
            (Side::Buy, Some(price)) => notional(order.remaining_quantity(), price)?,
            (Side::Buy, None) => {
                let best_ask = self
                    .book
                    .get_best_ask(&pair.symbol)
                    .and_then(|o| o.price)
                    .ok_or_else(|| {
                        ExchangeError::NoLiquidity(format!(
                            "no sell orders available on {}",
                            pair.symbol
                        ))
                    })?;
                let estimate = notional(best_ask, Decimal::ONE + self.config.market_buy_buffer)?;
                notional(order.remaining_quantity(), estimate)?
            }
        };

        self.ledger.lock(
            &order.user_id,
            order.lock_currency(pair),
            amount,
            Some(Reference::order(order.id)),
        )?;
        order.reserved = amount;
        debug!(
            "Funds reserved: order={}, currency={}, amount={}",
            order.id,
            order.lock_currency(pair),
            amount
        );
        Ok(())
    }

    fn accept(&self, order: Order) {
        info!(
            "Order accepted: id={}, user={}, pair={}, side={}, kind={}, quantity={}, price={:?}, tif={:?}",
            order.id,
            order.user_id,
            order.pair,
            order.side,
            order.kind,
            order.quantity,
            order.price,
            order.time_in_force
        );
        self.publisher
            .publish(ExchangeEvent::OrderAccepted((&order).into()));
        self.orders.insert(order);
    }

    fn build_order(&self, cmd: &CreateOrderCommand) -> Order {
        Order::new_with_time(
            cmd.user_id.clone(),
            cmd.pair.clone(),
            cmd.side,
            cmd.kind,
            cmd.quantity,
            cmd.price,
            cmd.time_in_force,
            self.clock.now(),
        )
        .with_client_order_id(cmd.client_order_id.clone())
        .with_stop_price(cmd.stop_price)
        .with_take_profit_price(cmd.take_profit_price)
        .with_sequence(self.sequence.fetch_add(1, Ordering::SeqCst))
    }

    fn owned_order_pair(&self, user_id: &str, order_id: &OrderId) -> ExchangeResult<TradingPair> {
        let order = self.orders.get(order_id)?;
        if order.user_id != user_id {
            return Err(ExchangeError::NotFound(format!("order {}", order_id)));
        }
        self.markets.pair(&order.pair)
    }

    fn pair_lock(&self, pair: &str) -> Arc<Mutex<()>> {
        self.pair_locks
            .entry(pair.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    fn acquire_pair<'a>(
        &self,
        pair: &str,
        lock: &'a Arc<Mutex<()>>,
    ) -> ExchangeResult<MutexGuard<'a, ()>> {
        lock.try_lock_for(self.config.pair_lock_timeout)
            .ok_or_else(|| {
                ExchangeError::Contention(format!(
                    "matching lock for {} held for more than {:?}",
                    pair, self.config.pair_lock_timeout
                ))
            })
    }
}

/// Largest quantity a market buy can still pay for at `price`
fn affordable_quantity(reserved: Decimal, price: Price, pair: &TradingPair) -> Quantity {
    (reserved / price)
        .round_dp_with_strategy(pair.quantity_precision, RoundingStrategy::ToZero)
}
