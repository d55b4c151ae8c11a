use std::sync::Arc;
use std::time::Duration;

use bourse_core::{Order, OrderId, OrderStatus, Symbol, UserId};
use bourse_ports::{ExchangeError, ExchangeResult};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};

pub(crate) type OrderRow = Arc<Mutex<Order>>;

/// Order rows with per-row locks
///
/// Every mutation goes through a row lock acquired with the lock-wait timeout,
/// so a trigger evaluation and a concurrent cancel of the same order serialize.
pub struct OrderStore {
    orders: DashMap<OrderId, OrderRow>,
    by_user: DashMap<UserId, Vec<OrderId>>,
    /// Conditional orders still pending or triggered but not yet activated
    conditional: DashMap<OrderId, Symbol>,
    lock_timeout: Duration,
}

impl OrderStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            orders: DashMap::new(),
            by_user: DashMap::new(),
            conditional: DashMap::new(),
            lock_timeout,
        }
    }

    pub(crate) fn insert(&self, order: Order) {
        let id = order.id;
        self.by_user
            .entry(order.user_id.clone())
            .or_default()
            .push(id);
        self.refresh_index(&order);
        self.orders.insert(id, Arc::new(Mutex::new(order)));
    }

    pub(crate) fn row(&self, id: &OrderId) -> ExchangeResult<OrderRow> {
        self.orders
            .get(id)
            .map(|row| row.value().clone())
            .ok_or_else(|| ExchangeError::NotFound(format!("order {}", id)))
    }

    pub(crate) fn acquire<'a>(&self, row: &'a OrderRow) -> ExchangeResult<MutexGuard<'a, Order>> {
        row.try_lock_for(self.lock_timeout).ok_or_else(|| {
            ExchangeError::Contention(format!(
                "order row locked for more than {:?}",
                self.lock_timeout
            ))
        })
    }

    /// Snapshot of one order, read under its row lock
    pub fn get(&self, id: &OrderId) -> ExchangeResult<Order> {
        let row = self.row(id)?;
        let guard = self.acquire(&row)?;
        Ok(guard.clone())
    }

    /// Mutate one order under its row lock
    ///
    /// `f` works on a copy; the row is only overwritten when it returns `Ok`.
    pub(crate) fn update<T>(
        &self,
        id: &OrderId,
        f: impl FnOnce(&mut Order) -> ExchangeResult<T>,
    ) -> ExchangeResult<T> {
        let row = self.row(id)?;
        let mut guard = self.acquire(&row)?;
        let mut working = guard.clone();
        let result = f(&mut working)?;
        self.refresh_index(&working);
        *guard = working;
        Ok(result)
    }

    /// Keep the conditional index in step with an order's status
    pub(crate) fn refresh_index(&self, order: &Order) {
        if order.status == OrderStatus::Pending || order.awaiting_activation() {
            self.conditional.insert(order.id, order.pair.clone());
        } else {
            self.conditional.remove(&order.id);
        }
    }

    /// Ids of conditional orders on a pair that still need monitor attention
    pub fn conditional_ids(&self, pair: &str) -> Vec<OrderId> {
        self.conditional
            .iter()
            .filter(|entry| entry.value() == pair)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Every order a user has placed, newest first
    pub fn for_user(&self, user_id: &str) -> ExchangeResult<Vec<Order>> {
        let ids = self
            .by_user
            .get(user_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();

        let mut orders = ids
            .iter()
            .map(|id| self.get(id))
            .collect::<ExchangeResult<Vec<_>>>()?;
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.sequence.cmp(&a.sequence))
        });
        Ok(orders)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
