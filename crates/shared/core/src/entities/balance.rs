use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::LedgerEntry;
use crate::values::{Amount, Symbol, Timestamp, UserId};

/// Identifies one balance row: a (user, currency) pair
///
/// Ordering is lexicographic so multi-row transactions can lock rows in a
/// canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    pub user_id: UserId,
    pub currency: Symbol,
}

impl BalanceKey {
    pub fn new(user_id: impl Into<UserId>, currency: impl Into<Symbol>) -> Self {
        Self {
            user_id: user_id.into(),
            currency: currency.into(),
        }
    }
}

/// Available/locked pair captured before and after a journal entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub available: Amount,
    pub locked: Amount,
}

impl BalanceSnapshot {
    pub fn total(&self) -> Amount {
        self.available + self.locked
    }
}

/// Per-user, per-currency balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: UserId,
    pub currency: Symbol,
    /// Free to spend, lock or withdraw
    pub available: Amount,
    /// Reserved against open orders
    pub locked: Amount,
    /// Incremented on every mutation
    pub version: u64,
    pub updated_at: Option<Timestamp>,
}

impl Balance {
    /// Zero-initialized balance for a new (user, currency) row
    pub fn zero(key: &BalanceKey) -> Self {
        Self {
            user_id: key.user_id.clone(),
            currency: key.currency.clone(),
            available: Decimal::ZERO,
            locked: Decimal::ZERO,
            version: 0,
            updated_at: None,
        }
    }

    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.user_id.clone(), self.currency.clone())
    }

    pub fn total(&self) -> Amount {
        self.available + self.locked
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            available: self.available,
            locked: self.locked,
        }
    }

    /// Apply one journal entry's deltas
    pub fn apply(&mut self, entry: &LedgerEntry) {
        self.available += entry.available_delta;
        self.locked += entry.locked_delta;
        self.version += 1;
        self.updated_at = Some(entry.created_at);
    }

    /// Rebuild a balance from zero by replaying its journal in order
    pub fn replay<'a>(
        key: &BalanceKey,
        entries: impl IntoIterator<Item = &'a LedgerEntry>,
    ) -> Self {
        let mut balance = Self::zero(key);
        for entry in entries {
            if entry.user_id == key.user_id && entry.currency == key.currency {
                balance.apply(entry);
            }
        }
        balance
    }
}
