use serde::{Deserialize, Serialize};
use std::fmt;

/// Order types supported by the exchange
///
/// Conditional kinds stay `pending` until their trigger condition is met,
/// then are rewritten to the base kind returned by [`OrderKind::activated_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Execute against whatever rests on the opposite side
    Market,
    /// Execute at specified price or better, rest the remainder
    Limit,
    /// Market order once price crosses the stop price against the position
    StopLoss,
    /// Limit order once price crosses the stop price against the position
    StopLimit,
    /// Market order once price reaches the take-profit price
    TakeProfit,
    /// Limit order once price reaches the take-profit price
    TakeProfitLimit,
    /// Market order once price retraces a percentage from its best level
    TrailingStop,
}

impl OrderKind {
    pub fn is_conditional(&self) -> bool {
        !matches!(self, OrderKind::Market | OrderKind::Limit)
    }

    /// The non-conditional kind an order becomes once triggered
    pub fn activated_kind(&self) -> OrderKind {
        match self {
            OrderKind::Market | OrderKind::StopLoss | OrderKind::TakeProfit => OrderKind::Market,
            OrderKind::TrailingStop => OrderKind::Market,
            OrderKind::Limit | OrderKind::StopLimit | OrderKind::TakeProfitLimit => {
                OrderKind::Limit
            }
        }
    }

    /// Whether the order carries a limit price (now or after activation)
    pub fn requires_limit_price(&self) -> bool {
        matches!(self.activated_kind(), OrderKind::Limit)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderKind::Market => "market",
            OrderKind::Limit => "limit",
            OrderKind::StopLoss => "stop_loss",
            OrderKind::StopLimit => "stop_limit",
            OrderKind::TakeProfit => "take_profit",
            OrderKind::TakeProfitLimit => "take_profit_limit",
            OrderKind::TrailingStop => "trailing_stop",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activated_kinds() {
        assert_eq!(OrderKind::StopLoss.activated_kind(), OrderKind::Market);
        assert_eq!(OrderKind::StopLimit.activated_kind(), OrderKind::Limit);
        assert_eq!(OrderKind::TakeProfit.activated_kind(), OrderKind::Market);
        assert_eq!(OrderKind::TakeProfitLimit.activated_kind(), OrderKind::Limit);
        assert_eq!(OrderKind::TrailingStop.activated_kind(), OrderKind::Market);
    }

    #[test]
    fn test_conditional_kinds() {
        assert!(!OrderKind::Market.is_conditional());
        assert!(!OrderKind::Limit.is_conditional());
        assert!(OrderKind::TrailingStop.is_conditional());
        assert!(OrderKind::StopLimit.requires_limit_price());
        assert!(!OrderKind::StopLoss.requires_limit_price());
    }
}
