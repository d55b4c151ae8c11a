//! Bourse Order Book Index
//!
//! Read/query projection over resting orders. The matching engine owns the
//! orders and pushes every change of a resting order here; this crate only
//! answers matching, depth and spread queries.

mod book;
mod index;
mod views;

pub use book::OrderBook;
pub use index::OrderBookIndex;
pub use views::{DepthLevel, OrderBookDepth, Spread};
