use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Quantity value in base currency units
pub type Quantity = Decimal;

/// Monetary amount in whatever currency the context names
pub type Amount = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Currency or trading pair symbol (e.g. "BTC", "BTC_USDT")
pub type Symbol = String;

/// Opaque user reference supplied by the request layer
pub type UserId = String;
