use bourse_core::{OrderId, Trade};
use parking_lot::RwLock;

/// Append-only log of settled trades
#[derive(Debug, Default)]
pub struct TradeStore {
    trades: RwLock<Vec<Trade>>,
}

impl TradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, trade: Trade) {
        self.trades.write().push(trade);
    }

    /// Most recent trades on a pair, newest first
    pub fn recent(&self, pair: &str, limit: usize) -> Vec<Trade> {
        self.trades
            .read()
            .iter()
            .rev()
            .filter(|t| t.pair == pair)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn for_order(&self, order_id: &OrderId) -> Vec<Trade> {
        self.trades
            .read()
            .iter()
            .filter(|t| t.buy_order_id == *order_id || t.sell_order_id == *order_id)
            .cloned()
            .collect()
    }

    pub fn for_user(&self, user_id: &str) -> Vec<Trade> {
        self.trades
            .read()
            .iter()
            .filter(|t| t.involves_user(user_id))
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Trade> {
        self.trades.read().clone()
    }

    pub fn len(&self) -> usize {
        self.trades.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.read().is_empty()
    }
}
