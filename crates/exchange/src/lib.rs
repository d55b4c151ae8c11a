//! Bourse Exchange Core
//!
//! Wires the ledger, order book index, matching engine and conditional order
//! monitor together from an [`ExchangeConfig`] and exposes the request-layer
//! API.
//!
//! ```ignore
//! let exchange = Exchange::new(ExchangeConfig::from_file("bourse.json")?)?;
//! exchange.start();
//! let execution = exchange.create_order(CreateOrderCommand::limit(
//!     "alice", "BTC_USDT", Side::Buy, dec!(1), dec!(50000),
//! ))?;
//! ```

mod config;
mod exchange;

pub use config::{
    AccountConfig, BookSettings, ConfigError, CurrencyConfig, DepositConfig, EngineSettings,
    ExchangeConfig, MonitorSettings, PairConfig,
};
pub use exchange::{DEFAULT_BOOK_DEPTH, Exchange, MAX_BOOK_DEPTH, SetupError};

// Re-export the request-layer types for convenience
pub use bourse_book::{DepthLevel, OrderBookDepth, Spread};
pub use bourse_core::{ExchangeEvent, Order, OrderKind, OrderStatus, Side, TimeInForce, Trade};
pub use bourse_ledger::{AdjustmentDirection, TransferReceipt};
pub use bourse_matching::{CreateOcoCommand, CreateOrderCommand, OcoExecution, OrderExecution};
pub use bourse_ports::{ExchangeError, ExchangeResult};
