//! Bourse Clock Infrastructure
//!
//! Implementations of the [`Clock`] port:
//!
//! - [`SystemClock`]: wall-clock time for running exchanges
//! - [`ManualClock`]: frozen time that only moves when told to, for tests
//!
//! ## Usage
//!
//! ```ignore
//! use bourse_clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::starting_at_epoch();
//! let t0 = clock.now();
//! clock.advance(Duration::seconds(5));
//! assert_eq!(clock.now() - t0, Duration::seconds(5));
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use bourse_ports::Clock;
