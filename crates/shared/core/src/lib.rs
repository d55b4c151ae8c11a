//! Bourse Core Domain
//!
//! Pure domain types for the Bourse exchange core: reference data, orders,
//! trades, balances and the journal entries that explain them.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod events;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    // Ledger types
    Balance,
    BalanceKey,
    BalanceSnapshot,
    // Reference data
    Currency,
    EntryType,
    LedgerEntry,
    LedgerEntryId,
    MarketStats,
    // Trading entities
    Order,
    OrderId,
    OrderKind,
    OrderStatus,
    Reference,
    ReferenceKind,
    Side,
    TimeInForce,
    Trade,
    TradeFees,
    TradeId,
    TradingPair,
};
pub use events::{ExchangeEvent, OrderEvent, SettlementFailedEvent, TradeExecutedEvent};
pub use values::{Amount, Price, Quantity, Symbol, Timestamp, UserId};
