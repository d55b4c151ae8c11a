use std::time::{Duration, Instant};

use bourse_core::{Order, OrderId, Price, Side, Symbol};
use dashmap::DashMap;
use log::debug;
use parking_lot::RwLock;

use crate::book::OrderBook;
use crate::views::{OrderBookDepth, Spread};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    revision: u64,
    stored_at: Instant,
}

impl<T: Clone> Cached<T> {
    /// Served only while young and computed from the book's current revision
    fn fresh(&self, ttl: Duration, revision: u64) -> Option<T> {
        (self.revision == revision && self.stored_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

/// Per-pair order books plus a short-lived cache of depth and spread views
///
/// Cached views are invalidated, never patched, whenever a pair's resting
/// orders change. Each entry also carries the book revision it was read
/// at, so a snapshot stored after a concurrent write is never served.
pub struct OrderBookIndex {
    books: DashMap<Symbol, RwLock<OrderBook>>,
    depth_cache: DashMap<(Symbol, usize), Cached<OrderBookDepth>>,
    spread_cache: DashMap<Symbol, Cached<Spread>>,
    cache_ttl: Duration,
}

impl Default for OrderBookIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBookIndex {
    pub fn new() -> Self {
        Self::with_cache_ttl(DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(cache_ttl: Duration) -> Self {
        Self {
            books: DashMap::new(),
            depth_cache: DashMap::new(),
            spread_cache: DashMap::new(),
            cache_ttl,
        }
    }

    /// Create an empty book for a pair
    pub fn register_pair(&self, pair: &str) {
        self.books
            .entry(pair.to_string())
            .or_insert_with(|| RwLock::new(OrderBook::new(pair)));
    }

    /// Reflect the current state of an order owned by the matching engine
    pub fn upsert(&self, order: &Order) {
        self.books
            .entry(order.pair.clone())
            .or_insert_with(|| RwLock::new(OrderBook::new(order.pair.clone())))
            .write()
            .upsert(order);
        self.invalidate(&order.pair);
    }

    pub fn remove(&self, pair: &str, order_id: &OrderId) {
        if let Some(book) = self.books.get(pair) {
            book.write().remove(order_id);
        }
        self.invalidate(pair);
    }

    /// Opposite-side orders eligible to match, in price-time priority
    pub fn get_matching_orders(
        &self,
        pair: &str,
        incoming_side: Side,
        incoming_price: Option<Price>,
        is_market: bool,
    ) -> Vec<Order> {
        let limit = if is_market { None } else { incoming_price };
        self.books
            .get(pair)
            .map(|book| book.read().matching_orders(incoming_side, limit))
            .unwrap_or_default()
    }

    pub fn get_best_bid(&self, pair: &str) -> Option<Order> {
        self.books
            .get(pair)
            .and_then(|book| book.read().best_bid().cloned())
    }

    pub fn get_best_ask(&self, pair: &str) -> Option<Order> {
        self.books
            .get(pair)
            .and_then(|book| book.read().best_ask().cloned())
    }

    pub fn get_depth(&self, pair: &str, levels: usize) -> OrderBookDepth {
        let cache_key = (pair.to_string(), levels);
        let revision = self.revision(pair);
        if let Some(depth) = self
            .depth_cache
            .get(&cache_key)
            .and_then(|c| c.fresh(self.cache_ttl, revision))
        {
            debug!("Depth cache hit: pair={}, levels={}", pair, levels);
            return depth;
        }

        let (revision, depth) = self
            .snapshot(pair, |book| book.depth(levels))
            .unwrap_or_else(|| (0, OrderBookDepth::empty(pair)));
        self.depth_cache.insert(
            cache_key,
            Cached {
                value: depth.clone(),
                revision,
                stored_at: Instant::now(),
            },
        );
        depth
    }

    pub fn get_spread(&self, pair: &str) -> Spread {
        let revision = self.revision(pair);
        if let Some(spread) = self
            .spread_cache
            .get(pair)
            .and_then(|c| c.fresh(self.cache_ttl, revision))
        {
            debug!("Spread cache hit: pair={}", pair);
            return spread;
        }

        let (revision, spread) = self
            .snapshot(pair, OrderBook::spread)
            .unwrap_or_else(|| (0, Spread::new(pair, None, None)));
        self.spread_cache.insert(
            pair.to_string(),
            Cached {
                value: spread.clone(),
                revision,
                stored_at: Instant::now(),
            },
        );
        spread
    }

    /// A view of the book together with the revision it was taken at
    fn snapshot<T>(&self, pair: &str, view: impl FnOnce(&OrderBook) -> T) -> Option<(u64, T)> {
        self.books.get(pair).map(|book| {
            let book = book.read();
            (book.revision(), view(&*book))
        })
    }

    fn revision(&self, pair: &str) -> u64 {
        self.books
            .get(pair)
            .map(|book| book.read().revision())
            .unwrap_or(0)
    }

    /// Drop every cached view of a pair, for all depths
    pub fn invalidate(&self, pair: &str) {
        self.depth_cache.retain(|(cached_pair, _), _| cached_pair != pair);
        self.spread_cache.remove(pair);
    }

    pub fn resting_count(&self, pair: &str) -> usize {
        self.books.get(pair).map(|book| book.read().len()).unwrap_or(0)
    }
}
