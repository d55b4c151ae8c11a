use bourse_core::ExchangeEvent;

/// Publisher for exchange events
///
/// Publishing is fire-and-forget: implementations must not block and must
/// swallow delivery failures, so a missing subscriber never affects a trade.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ExchangeEvent);
}

/// Publisher that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventPublisher;

impl EventPublisher for NullEventPublisher {
    fn publish(&self, _event: ExchangeEvent) {}
}
