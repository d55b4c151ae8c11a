use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Conditional order waiting for its trigger price
    Pending,
    /// Active with nothing filled yet
    Open,
    /// Active and partially filled
    Partial,
    /// Completely filled
    Filled,
    /// Cancelled by the user, by time-in-force or by an OCO sibling
    Cancelled,
    /// Expired before it could execute
    Expired,
    /// Trigger condition met
    Triggered,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Expired
        )
    }

    /// Returns true if the order can still trade
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Partial)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Open => "open",
            OrderStatus::Partial => "partial",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
            OrderStatus::Triggered => "triggered",
        };
        write!(f, "{}", name)
    }
}
