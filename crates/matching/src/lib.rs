//! Bourse Matching Engine
//!
//! Owns orders and trades. Validates and funds incoming orders, matches them
//! against the book in price-time priority at the resting order's price,
//! settles every match in one ledger transaction and applies GTC/IOC/FOK.

mod command;
mod engine;
mod markets;
mod publisher;
mod settlement;
mod store;
mod trades;
mod validation;

pub use command::{CreateOcoCommand, CreateOrderCommand, OcoExecution, OrderExecution};
pub use engine::{EngineConfig, MatchingEngine};
pub use markets::MarketRegistry;
pub use publisher::BroadcastEventPublisher;
pub use store::OrderStore;
pub use trades::TradeStore;

// Re-export the error types from ports for convenience
pub use bourse_ports::{ExchangeError, ExchangeResult};
