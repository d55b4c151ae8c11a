//! Bourse Ledger
//!
//! Sole mutator of per-user, per-currency balances. Every balance change is
//! paired with an immutable journal entry written in the same transaction,
//! and concurrent mutations of one balance row are serialized by a row lock
//! acquired with a lock-wait timeout.
//!
//! ```ignore
//! let ledger = Ledger::new(Arc::new(SystemClock::new()));
//! ledger.credit("alice", "USDT", dec!(1000), EntryType::Deposit, None)?;
//! ledger.lock("alice", "USDT", dec!(550), Some(Reference::order(order_id)))?;
//! ```

mod ledger;
mod transaction;

pub use ledger::{AdjustmentDirection, Ledger, Reconciliation, TransferReceipt};
pub use transaction::LedgerTransaction;
