mod balance;
mod currency;
mod fee;
mod ledger_entry;
mod order;
mod order_kind;
mod order_status;
mod side;
mod time_in_force;
mod trade;
mod trading_pair;

pub use balance::{Balance, BalanceKey, BalanceSnapshot};
pub use currency::Currency;
pub use fee::TradeFees;
pub use ledger_entry::{EntryType, LedgerEntry, LedgerEntryId, Reference, ReferenceKind};
pub use order::{Order, OrderId};
pub use order_kind::OrderKind;
pub use order_status::OrderStatus;
pub use side::Side;
pub use time_in_force::TimeInForce;
pub use trade::{Trade, TradeId};
pub use trading_pair::{MarketStats, TradingPair};
