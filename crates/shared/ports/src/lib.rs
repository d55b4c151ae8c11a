//! Bourse Ports
//!
//! Port definitions (traits) for the Bourse exchange core.
//! These define the boundaries between domain logic and infrastructure.

mod clock;
mod error;
mod events;

pub use clock::Clock;
pub use error::{ExchangeError, ExchangeResult};
pub use events::{EventPublisher, NullEventPublisher};
