use bourse_core::Timestamp;

/// Source of every timestamp the exchange core writes
///
/// Orders, trades and journal entries are stamped through this port so tests
/// can run against a deterministic clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    /// Identifier used in log lines
    fn name(&self) -> &str {
        "Clock"
    }
}
