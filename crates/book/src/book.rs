use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use bourse_core::{Order, OrderId, Price, Side, Symbol, Timestamp};
use rust_decimal::Decimal;

use crate::views::{DepthLevel, OrderBookDepth, Spread};

/// Position of a resting order in its side of the book
///
/// Bids sort highest price first, asks lowest price first; equal prices fall
/// back to creation time, then arrival sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BookKey {
    price: Price,
    is_bid: bool,
    created_at: Timestamp,
    sequence: u64,
}

impl BookKey {
    fn for_order(order: &Order, price: Price) -> Self {
        BookKey {
            price,
            is_bid: order.side.is_buy(),
            created_at: order.created_at,
            sequence: order.sequence,
        }
    }
}

impl Ord for BookKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_price = if self.is_bid {
            // Bids: higher price first (reverse order)
            other.price.cmp(&self.price)
        } else {
            // Asks: lower price first (natural order)
            self.price.cmp(&other.price)
        };

        by_price
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for BookKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Resting orders of one trading pair
#[derive(Debug, Clone)]
pub struct OrderBook {
    pair: Symbol,
    bids: BTreeMap<BookKey, Order>,
    asks: BTreeMap<BookKey, Order>,
    index: HashMap<OrderId, BookKey>,
    revision: u64,
}

impl OrderBook {
    pub fn new(pair: impl Into<Symbol>) -> Self {
        OrderBook {
            pair: pair.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
            revision: 0,
        }
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.index.contains_key(order_id)
    }

    /// Bumped on every write; snapshots taken at an older revision are stale
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Insert or refresh a resting order; anything that cannot rest is removed
    pub fn upsert(&mut self, order: &Order) {
        self.remove(&order.id);
        self.revision += 1;

        let price = match order.price {
            Some(price) if order.status.is_active() && !order.is_filled() => price,
            _ => return,
        };

        let key = BookKey::for_order(order, price);
        self.side_mut(order.side).insert(key, order.clone());
        self.index.insert(order.id, key);
    }

    pub fn remove(&mut self, order_id: &OrderId) -> Option<Order> {
        self.revision += 1;
        let key = self.index.remove(order_id)?;
        let side = if key.is_bid { Side::Buy } else { Side::Sell };
        self.side_mut(side).remove(&key)
    }

    /// Orders on the side opposite `incoming_side`, in matching priority
    ///
    /// With a limit, iteration stops at the first price the limit rejects:
    /// asks above a buy limit, bids below a sell limit.
    pub fn matching_orders(&self, incoming_side: Side, limit: Option<Price>) -> Vec<Order> {
        let book = self.side(incoming_side.opposite());
        book.iter()
            .take_while(|(key, _)| match (incoming_side, limit) {
                (_, None) => true,
                (Side::Buy, Some(limit)) => key.price <= limit,
                (Side::Sell, Some(limit)) => key.price >= limit,
            })
            .map(|(_, order)| order.clone())
            .collect()
    }

    pub fn best_bid(&self) -> Option<&Order> {
        self.bids.first_key_value().map(|(_, order)| order)
    }

    pub fn best_ask(&self) -> Option<&Order> {
        self.asks.first_key_value().map(|(_, order)| order)
    }

    pub fn spread(&self) -> Spread {
        Spread::new(
            self.pair.clone(),
            self.best_bid().and_then(|o| o.price),
            self.best_ask().and_then(|o| o.price),
        )
    }

    /// Aggregate remaining quantity per price level, top `levels` per side
    pub fn depth(&self, levels: usize) -> OrderBookDepth {
        OrderBookDepth {
            pair: self.pair.clone(),
            bids: aggregate(&self.bids, levels),
            asks: aggregate(&self.asks, levels),
        }
    }

    fn side(&self, side: Side) -> &BTreeMap<BookKey, Order> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<BookKey, Order> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }
}

fn aggregate(book: &BTreeMap<BookKey, Order>, levels: usize) -> Vec<DepthLevel> {
    let mut result: Vec<DepthLevel> = Vec::new();
    let mut cumulative = Decimal::ZERO;

    for (key, order) in book {
        let remaining = order.remaining_quantity();
        cumulative += remaining;

        match result.last_mut() {
            Some(level) if level.price == key.price => {
                level.quantity += remaining;
                level.cumulative_quantity = cumulative;
                level.order_count += 1;
            }
            _ => {
                if result.len() == levels {
                    break;
                }
                result.push(DepthLevel {
                    price: key.price,
                    quantity: remaining,
                    cumulative_quantity: cumulative,
                    order_count: 1,
                });
            }
        }
    }

    result
}
