use bourse_core::ExchangeEvent;
use bourse_ports::EventPublisher;
use tokio::sync::broadcast;

/// Broadcast-based event publisher
///
/// Uses a tokio broadcast channel so notification consumers and the
/// conditional order monitor can each hold their own receiver. Sending never
/// blocks; with no subscribers the event is dropped.
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    tx: broadcast::Sender<ExchangeEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<ExchangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastEventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventPublisher for BroadcastEventPublisher {
    fn publish(&self, event: ExchangeEvent) {
        // Non-blocking send, ignore errors (no subscribers)
        let _ = self.tx.send(event);
    }
}
