use std::collections::HashMap;

use bourse_core::{Amount, Balance, BalanceKey, EntryType, LedgerEntry, Reference, Timestamp};
use bourse_ports::{ExchangeError, ExchangeResult};
use log::debug;
use rust_decimal::Decimal;

/// Working set of one ledger transaction
///
/// Operations mutate private copies of the locked rows and stage journal
/// entries. `Ledger::transaction` writes both back only when the closure
/// returns `Ok`; on `Err` the copies are dropped and nothing is applied.
#[derive(Debug)]
pub struct LedgerTransaction {
    working: HashMap<BalanceKey, Balance>,
    entries: Vec<LedgerEntry>,
    now: Timestamp,
}

impl LedgerTransaction {
    pub(crate) fn new(rows: impl IntoIterator<Item = Balance>, now: Timestamp) -> Self {
        Self {
            working: rows.into_iter().map(|b| (b.key(), b)).collect(),
            entries: Vec::new(),
            now,
        }
    }

    pub(crate) fn into_parts(self) -> (HashMap<BalanceKey, Balance>, Vec<LedgerEntry>) {
        (self.working, self.entries)
    }

    /// Current state of a row locked by this transaction
    pub fn balance(&self, key: &BalanceKey) -> ExchangeResult<&Balance> {
        self.working.get(key).ok_or_else(|| not_locked(key))
    }

    /// available += amount
    pub fn credit(
        &mut self,
        key: &BalanceKey,
        amount: Amount,
        entry_type: EntryType,
        reference: Option<Reference>,
    ) -> ExchangeResult<LedgerEntry> {
        require_positive(amount, "credit")?;
        self.record(key, entry_type, amount, Decimal::ZERO, reference)
    }

    /// available -= amount
    pub fn debit(
        &mut self,
        key: &BalanceKey,
        amount: Amount,
        entry_type: EntryType,
        reference: Option<Reference>,
    ) -> ExchangeResult<LedgerEntry> {
        require_positive(amount, "debit")?;
        self.require_available(key, amount)?;
        self.record(key, entry_type, -amount, Decimal::ZERO, reference)
    }

    /// Move amount from available to locked
    pub fn lock(
        &mut self,
        key: &BalanceKey,
        amount: Amount,
        reference: Option<Reference>,
    ) -> ExchangeResult<LedgerEntry> {
        require_positive(amount, "lock")?;
        self.require_available(key, amount)?;
        self.record(key, EntryType::OrderLock, -amount, amount, reference)
    }

    /// Move amount from locked back to available
    pub fn unlock(
        &mut self,
        key: &BalanceKey,
        amount: Amount,
        reference: Option<Reference>,
    ) -> ExchangeResult<LedgerEntry> {
        require_positive(amount, "unlock")?;
        self.require_locked(key, amount)?;
        self.record(key, EntryType::OrderUnlock, amount, -amount, reference)
    }

    /// Consume locked funds without crediting available
    pub fn deduct_locked(
        &mut self,
        key: &BalanceKey,
        amount: Amount,
        entry_type: EntryType,
        reference: Option<Reference>,
    ) -> ExchangeResult<LedgerEntry> {
        require_positive(amount, "deduct")?;
        self.require_locked(key, amount)?;
        self.record(key, entry_type, Decimal::ZERO, -amount, reference)
    }

    /// Rewrite the most recently staged entry and return the result
    pub(crate) fn annotate_last(
        &mut self,
        annotate: impl FnOnce(LedgerEntry) -> LedgerEntry,
    ) -> ExchangeResult<LedgerEntry> {
        let entry = self
            .entries
            .pop()
            .ok_or_else(|| ExchangeError::Internal("no journal entry staged".to_string()))?;
        let entry = annotate(entry);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    fn require_available(&self, key: &BalanceKey, amount: Amount) -> ExchangeResult<()> {
        let balance = self.balance(key)?;
        if balance.available < amount {
            return Err(ExchangeError::InsufficientBalance {
                currency: key.currency.clone(),
                required: amount,
                available: balance.available,
            });
        }
        Ok(())
    }

    fn require_locked(&self, key: &BalanceKey, amount: Amount) -> ExchangeResult<()> {
        let balance = self.balance(key)?;
        if balance.locked < amount {
            return Err(ExchangeError::InsufficientLocked {
                currency: key.currency.clone(),
                required: amount,
                locked: balance.locked,
            });
        }
        Ok(())
    }

    fn record(
        &mut self,
        key: &BalanceKey,
        entry_type: EntryType,
        available_delta: Amount,
        locked_delta: Amount,
        reference: Option<Reference>,
    ) -> ExchangeResult<LedgerEntry> {
        let now = self.now;
        let balance = self.working.get_mut(key).ok_or_else(|| not_locked(key))?;

        let entry = LedgerEntry::new(
            key,
            entry_type,
            available_delta,
            locked_delta,
            balance.snapshot(),
            now,
        )
        .with_reference(reference);
        balance.apply(&entry);

        debug!(
            "Ledger {}: user={}, currency={}, available={}, locked={}, version={}",
            entry_type,
            key.user_id,
            key.currency,
            balance.available,
            balance.locked,
            balance.version
        );

        self.entries.push(entry.clone());
        Ok(entry)
    }
}

fn require_positive(amount: Amount, operation: &str) -> ExchangeResult<()> {
    if amount <= Decimal::ZERO {
        return Err(ExchangeError::InvalidAmount(format!(
            "{} amount must be positive, got {}",
            operation, amount
        )));
    }
    Ok(())
}

fn not_locked(key: &BalanceKey) -> ExchangeError {
    ExchangeError::Internal(format!(
        "balance {}/{} is not part of this transaction",
        key.user_id, key.currency
    ))
}
