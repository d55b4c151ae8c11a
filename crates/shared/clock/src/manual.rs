use bourse_core::Timestamp;
use bourse_ports::Clock;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Deterministic clock for tests
///
/// Time stands still unless `advance`/`set` is called, or a tick is
/// configured, in which case every `now()` moves time forward by the tick.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
    tick: Duration,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Mutex::new(start),
            tick: Duration::zero(),
        }
    }

    pub fn starting_at_epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Advance by `tick` after every reading
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += by;
    }

    pub fn set(&self, to: Timestamp) {
        *self.current.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let mut current = self.current.lock();
        let now = *current;
        *current += self.tick;
        now
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
