use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{BalanceKey, BalanceSnapshot};
use crate::values::{Amount, Symbol, Timestamp, UserId};

/// Unique identifier for a journal entry
pub type LedgerEntryId = Uuid;

/// Why a balance changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Deposit,
    Withdrawal,
    TradeBuy,
    TradeSell,
    Fee,
    OrderLock,
    OrderUnlock,
    AdminCredit,
    AdminDebit,
    TransferIn,
    TransferOut,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryType::Deposit => "deposit",
            EntryType::Withdrawal => "withdrawal",
            EntryType::TradeBuy => "trade_buy",
            EntryType::TradeSell => "trade_sell",
            EntryType::Fee => "fee",
            EntryType::OrderLock => "order_lock",
            EntryType::OrderUnlock => "order_unlock",
            EntryType::AdminCredit => "admin_credit",
            EntryType::AdminDebit => "admin_debit",
            EntryType::TransferIn => "transfer_in",
            EntryType::TransferOut => "transfer_out",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Order,
    Trade,
    Deposit,
    Withdrawal,
    Adjustment,
    Transfer,
}

/// Pointer from a journal entry to the record that caused it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub id: String,
}

impl Reference {
    pub fn new(kind: ReferenceKind, id: impl ToString) -> Self {
        Self {
            kind,
            id: id.to_string(),
        }
    }

    pub fn order(id: impl ToString) -> Self {
        Self::new(ReferenceKind::Order, id)
    }

    pub fn trade(id: impl ToString) -> Self {
        Self::new(ReferenceKind::Trade, id)
    }
}

/// Immutable journal row
///
/// `amount` is the signed change to `available + locked`, so summing it over a
/// row's history reproduces the row's total. Lock and unlock move funds
/// between the two buckets and carry an amount of zero; the per-bucket deltas
/// make the history replayable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub user_id: UserId,
    pub currency: Symbol,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub available_delta: Amount,
    pub locked_delta: Amount,
    pub balance_before: BalanceSnapshot,
    pub balance_after: BalanceSnapshot,
    pub reference: Option<Reference>,
    /// Operator behind admin-initiated entries
    pub actor: Option<UserId>,
    pub description: Option<String>,
    pub created_at: Timestamp,
}

impl LedgerEntry {
    pub fn new(
        key: &BalanceKey,
        entry_type: EntryType,
        available_delta: Amount,
        locked_delta: Amount,
        balance_before: BalanceSnapshot,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: key.user_id.clone(),
            currency: key.currency.clone(),
            entry_type,
            amount: available_delta + locked_delta,
            available_delta,
            locked_delta,
            balance_before,
            balance_after: BalanceSnapshot {
                available: balance_before.available + available_delta,
                locked: balance_before.locked + locked_delta,
            },
            reference: None,
            actor: None,
            description: None,
            created_at: timestamp,
        }
    }

    pub fn with_reference(mut self, reference: Option<Reference>) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<UserId>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
