use std::sync::Arc;
use std::time::Duration;

use bourse_core::{
    Amount, Balance, BalanceKey, Currency, EntryType, LedgerEntry, Reference, ReferenceKind,
    UserId,
};
use bourse_ports::{Clock, ExchangeError, ExchangeResult};
use dashmap::DashMap;
use log::{info, warn};
use parking_lot::{Mutex, MutexGuard, RwLock};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::transaction::LedgerTransaction;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// Direction of an operator balance adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentDirection {
    Credit,
    Debit,
}

/// Result of checking one balance row against its journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub balance: Balance,
    /// Sum of signed entry amounts
    pub journal_total: Amount,
    pub replayed_available: Amount,
    pub replayed_locked: Amount,
    pub entry_count: usize,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.journal_total == self.balance.total()
            && self.replayed_available == self.balance.available
            && self.replayed_locked == self.balance.locked
    }
}

/// Both sides of a completed user-to-user transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub reference: Reference,
    /// Sender's `transfer_out` entry
    pub debit: LedgerEntry,
    /// Recipient's `transfer_in` entry
    pub credit: LedgerEntry,
}

type BalanceRow = Arc<Mutex<Balance>>;

/// Balances plus the append-only journal
pub struct Ledger {
    balances: DashMap<BalanceKey, BalanceRow>,
    journal: RwLock<Vec<LedgerEntry>>,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
}

impl Ledger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            balances: DashMap::new(),
            journal: RwLock::new(Vec::new()),
            clock,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Set how long an operation waits for a contended row before failing
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Run `f` with every listed row locked
    ///
    /// Rows are locked in sorted order so two transactions over overlapping
    /// keys cannot deadlock. If any lock is not acquired within the lock-wait
    /// timeout the call fails with `Contention` before `f` runs. Balances and
    /// journal entries are written only when `f` returns `Ok`.
    pub fn transaction<T>(
        &self,
        keys: &[BalanceKey],
        f: impl FnOnce(&mut LedgerTransaction) -> ExchangeResult<T>,
    ) -> ExchangeResult<T> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let rows: Vec<(BalanceKey, BalanceRow)> =
            keys.into_iter().map(|key| (key.clone(), self.row(&key))).collect();

        let mut guards: Vec<MutexGuard<'_, Balance>> = Vec::with_capacity(rows.len());
        for (key, row) in &rows {
            guards.push(self.acquire(key, row)?);
        }

        let mut tx = LedgerTransaction::new(guards.iter().map(|g| (**g).clone()), self.clock.now());
        let result = f(&mut tx)?;

        let (mut working, entries) = tx.into_parts();
        for ((key, _), guard) in rows.iter().zip(guards.iter_mut()) {
            if let Some(updated) = working.remove(key) {
                **guard = updated;
            }
        }
        // Appended while the rows are still held so readers that lock a row
        // never see its balance ahead of its journal.
        if !entries.is_empty() {
            self.journal.write().extend(entries);
        }

        Ok(result)
    }

    /// Existing balance, or a zero-initialized one for a new (user, currency)
    pub fn get_or_create_balance(&self, user_id: &str, currency: &str) -> ExchangeResult<Balance> {
        let key = BalanceKey::new(user_id, currency);
        let row = self.row(&key);
        let guard = self.acquire(&key, &row)?;
        Ok(guard.clone())
    }

    /// Read a balance without creating its row
    pub fn balance(&self, user_id: &str, currency: &str) -> ExchangeResult<Balance> {
        let key = BalanceKey::new(user_id, currency);
        let row = match self.balances.get(&key) {
            Some(row) => row.value().clone(),
            None => return Ok(Balance::zero(&key)),
        };
        let guard = self.acquire(&key, &row)?;
        Ok(guard.clone())
    }

    pub fn credit(
        &self,
        user_id: &str,
        currency: &str,
        amount: Amount,
        entry_type: EntryType,
        reference: Option<Reference>,
    ) -> ExchangeResult<(Balance, LedgerEntry)> {
        self.single(user_id, currency, |tx, key| {
            tx.credit(key, amount, entry_type, reference)
        })
    }

    pub fn debit(
        &self,
        user_id: &str,
        currency: &str,
        amount: Amount,
        entry_type: EntryType,
        reference: Option<Reference>,
    ) -> ExchangeResult<(Balance, LedgerEntry)> {
        self.single(user_id, currency, |tx, key| {
            tx.debit(key, amount, entry_type, reference)
        })
    }

    pub fn lock(
        &self,
        user_id: &str,
        currency: &str,
        amount: Amount,
        reference: Option<Reference>,
    ) -> ExchangeResult<(Balance, LedgerEntry)> {
        self.single(user_id, currency, |tx, key| tx.lock(key, amount, reference))
    }

    pub fn unlock(
        &self,
        user_id: &str,
        currency: &str,
        amount: Amount,
        reference: Option<Reference>,
    ) -> ExchangeResult<(Balance, LedgerEntry)> {
        self.single(user_id, currency, |tx, key| tx.unlock(key, amount, reference))
    }

    pub fn deduct_locked(
        &self,
        user_id: &str,
        currency: &str,
        amount: Amount,
        entry_type: EntryType,
        reference: Option<Reference>,
    ) -> ExchangeResult<(Balance, LedgerEntry)> {
        self.single(user_id, currency, |tx, key| {
            tx.deduct_locked(key, amount, entry_type, reference)
        })
    }

    /// Credit a confirmed deposit
    pub fn deposit(
        &self,
        user_id: &str,
        currency: &Currency,
        amount: Amount,
        reference: Option<Reference>,
    ) -> ExchangeResult<(Balance, LedgerEntry)> {
        if !currency.can_deposit() {
            return Err(ExchangeError::InvalidState(format!(
                "deposits are disabled for {}",
                currency.symbol
            )));
        }
        if amount < currency.min_deposit {
            return Err(ExchangeError::InvalidAmount(format!(
                "deposit of {} {} is below the minimum of {}",
                amount, currency.symbol, currency.min_deposit
            )));
        }

        let result = self.credit(user_id, &currency.symbol, amount, EntryType::Deposit, reference)?;
        info!(
            "Ledger deposit: user={}, currency={}, amount={}",
            user_id, currency.symbol, amount
        );
        Ok(result)
    }

    /// Debit a withdrawal plus the currency's flat withdrawal fee as one entry
    pub fn withdraw(
        &self,
        user_id: &str,
        currency: &Currency,
        amount: Amount,
        reference: Option<Reference>,
    ) -> ExchangeResult<(Balance, LedgerEntry)> {
        if !currency.can_withdraw() {
            return Err(ExchangeError::InvalidState(format!(
                "withdrawals are disabled for {}",
                currency.symbol
            )));
        }
        if amount <= Decimal::ZERO || amount < currency.min_withdrawal {
            return Err(ExchangeError::InvalidAmount(format!(
                "withdrawal of {} {} is below the minimum of {}",
                amount, currency.symbol, currency.min_withdrawal
            )));
        }

        let total = amount + currency.withdrawal_fee;
        let description = format!("withdrawal {} + fee {}", amount, currency.withdrawal_fee);
        let result = self.single(user_id, &currency.symbol, |tx, key| {
            tx.debit(key, total, EntryType::Withdrawal, reference)?;
            tx.annotate_last(|entry| entry.with_description(description))
        })?;

        info!(
            "Ledger withdrawal: user={}, currency={}, amount={}, fee={}",
            user_id, currency.symbol, amount, currency.withdrawal_fee
        );
        Ok(result)
    }

    /// Operator credit or debit, recorded with the acting operator and a reason
    pub fn admin_adjust(
        &self,
        actor: &str,
        user_id: &str,
        currency: &str,
        amount: Amount,
        direction: AdjustmentDirection,
        reason: &str,
    ) -> ExchangeResult<(Balance, LedgerEntry)> {
        let actor: UserId = actor.to_string();
        let reference = Some(Reference::new(
            ReferenceKind::Adjustment,
            format!("{}:{}", actor, self.clock.now().timestamp_millis()),
        ));

        let result = self.single(user_id, currency, |tx, key| {
            match direction {
                AdjustmentDirection::Credit => {
                    tx.credit(key, amount, EntryType::AdminCredit, reference)?
                }
                AdjustmentDirection::Debit => {
                    tx.debit(key, amount, EntryType::AdminDebit, reference)?
                }
            };
            tx.annotate_last(|entry| entry.with_actor(actor.clone()).with_description(reason))
        })?;

        warn!(
            "Ledger admin adjustment: actor={}, user={}, currency={}, direction={:?}, amount={}, reason={}",
            actor, user_id, currency, direction, amount, reason
        );
        Ok(result)
    }

    /// Move available funds from one user to another
    ///
    /// Both rows are updated in one transaction and the two journal entries
    /// share a transfer reference. Locked funds are never touched.
    pub fn transfer(
        &self,
        from: &str,
        to: &str,
        currency: &Currency,
        amount: Amount,
        note: Option<&str>,
    ) -> ExchangeResult<TransferReceipt> {
        if from == to {
            return Err(ExchangeError::InvalidState(format!(
                "cannot transfer {} from {} to itself",
                currency.symbol, from
            )));
        }
        if !currency.is_active {
            return Err(ExchangeError::InvalidState(format!(
                "currency {} is not active",
                currency.symbol
            )));
        }

        let reference = Reference::new(ReferenceKind::Transfer, Uuid::new_v4());
        let sender = BalanceKey::new(from, currency.symbol.clone());
        let recipient = BalanceKey::new(to, currency.symbol.clone());
        let describe = |entry: LedgerEntry| match note {
            Some(note) => entry.with_description(note),
            None => entry,
        };

        let receipt = self.transaction(&[sender.clone(), recipient.clone()], |tx| {
            tx.debit(&sender, amount, EntryType::TransferOut, Some(reference.clone()))?;
            let debit = tx.annotate_last(describe)?;
            tx.credit(&recipient, amount, EntryType::TransferIn, Some(reference.clone()))?;
            let credit = tx.annotate_last(describe)?;
            Ok(TransferReceipt {
                reference: reference.clone(),
                debit,
                credit,
            })
        })?;

        info!(
            "Ledger transfer: from={}, to={}, currency={}, amount={}, reference={}",
            from, to, currency.symbol, amount, receipt.reference.id
        );
        Ok(receipt)
    }

    /// Journal entries for one balance row, oldest first
    pub fn entries_for(&self, user_id: &str, currency: &str) -> Vec<LedgerEntry> {
        self.journal
            .read()
            .iter()
            .filter(|e| e.user_id == user_id && e.currency == currency)
            .cloned()
            .collect()
    }

    /// Full journal, oldest first
    pub fn journal(&self) -> Vec<LedgerEntry> {
        self.journal.read().clone()
    }

    pub fn journal_len(&self) -> usize {
        self.journal.read().len()
    }

    /// Every (user, currency) row that has been touched
    pub fn balance_keys(&self) -> Vec<BalanceKey> {
        self.balances.iter().map(|row| row.key().clone()).collect()
    }

    /// Check a balance against the sum and replay of its journal
    pub fn reconcile(&self, user_id: &str, currency: &str) -> ExchangeResult<Reconciliation> {
        let key = BalanceKey::new(user_id, currency);
        let row = self.row(&key);
        let guard = self.acquire(&key, &row)?;

        let entries = self.entries_for(user_id, currency);
        let journal_total: Amount = entries.iter().map(|e| e.amount).sum();
        let replayed = Balance::replay(&key, &entries);

        Ok(Reconciliation {
            balance: guard.clone(),
            journal_total,
            replayed_available: replayed.available,
            replayed_locked: replayed.locked,
            entry_count: entries.len(),
        })
    }

    fn single(
        &self,
        user_id: &str,
        currency: &str,
        op: impl FnOnce(&mut LedgerTransaction, &BalanceKey) -> ExchangeResult<LedgerEntry>,
    ) -> ExchangeResult<(Balance, LedgerEntry)> {
        let key = BalanceKey::new(user_id, currency);
        self.transaction(std::slice::from_ref(&key), |tx| {
            let entry = op(tx, &key)?;
            Ok((tx.balance(&key)?.clone(), entry))
        })
    }

    fn row(&self, key: &BalanceKey) -> BalanceRow {
        self.balances
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Balance::zero(key))))
            .value()
            .clone()
    }

    fn acquire<'a>(
        &self,
        key: &BalanceKey,
        row: &'a BalanceRow,
    ) -> ExchangeResult<MutexGuard<'a, Balance>> {
        row.try_lock_for(self.lock_timeout).ok_or_else(|| {
            ExchangeError::Contention(format!(
                "balance {}/{} locked for more than {:?}",
                key.user_id, key.currency, self.lock_timeout
            ))
        })
    }
}
