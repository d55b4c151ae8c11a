use bourse_core::Timestamp;
use bourse_ports::Clock;
use chrono::Utc;

/// Wall clock backed by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}
