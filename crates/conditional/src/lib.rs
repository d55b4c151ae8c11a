//! Bourse Conditional Order Monitor
//!
//! Watches pending stop, take-profit and trailing-stop orders and promotes
//! them into the matching engine once their trigger price is crossed.
//! Evaluation runs on every trade (event-driven) and on a fixed interval
//! (poller); both go through the order's row lock, so an order triggers at
//! most once and never after it has been cancelled.

mod monitor;
pub mod trigger;

pub use monitor::{ConditionalOrderMonitor, EvaluationReport, MonitorConfig};
