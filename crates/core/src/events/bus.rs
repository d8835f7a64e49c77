//! In-process event fan-out.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::error::EventError;
use super::types::LedgerEvent;

/// Reacts to published events.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Handles one event.
    ///
    /// # Errors
    ///
    /// Returns an `EventError` when the event could not be handled. The bus
    /// logs it and moves on.
    async fn handle(&self, event: &LedgerEvent) -> Result<(), EventError>;
}

/// Fans events out to registered subscribers.
///
/// Clones share the same subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Arc<dyn EventSubscriber>>>>,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber.
    pub async fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        info!(subscriber = %subscriber.name(), "Registered event subscriber");
        self.subscribers.write().await.push(subscriber);
    }

    /// Delivers an event to every subscriber.
    ///
    /// Never fails: the event describes something already committed.
    pub async fn publish(&self, event: LedgerEvent) {
        // Snapshot under the read lock, then release before awaiting handlers
        let subscribers: Vec<_> = self.subscribers.read().await.iter().cloned().collect();

        debug!(event = event.name(), subscribers = subscribers.len(), "Publishing event");

        for subscriber in subscribers {
            if let Err(err) = subscriber.handle(&event).await {
                warn!(
                    subscriber = %subscriber.name(),
                    event = event.name(),
                    error = %err,
                    "Event subscriber failed"
                );
            }
        }
    }

    /// Number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscalhost_shared::types::{AccountId, OrderId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    #[async_trait]
    impl EventSubscriber for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn handle(&self, _event: &LedgerEvent) -> Result<(), EventError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventSubscriber for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn handle(&self, _event: &LedgerEvent) -> Result<(), EventError> {
            Err(EventError::Subscriber {
                subscriber: "failing".into(),
                message: "boom".into(),
            })
        }
    }

    fn cancelled() -> LedgerEvent {
        LedgerEvent::OrderCancelled {
            order_id: OrderId::new(),
            contributor: AccountId::new(),
            reason: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_stop_delivery() {
        let bus = EventBus::new();
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        bus.subscribe(Arc::new(Failing)).await;
        bus.subscribe(counting.clone()).await;

        bus.publish(cancelled()).await;
        bus.publish(cancelled()).await;

        assert_eq!(counting.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clones_share_subscribers() {
        let bus = EventBus::new();
        let clone = bus.clone();
        bus.subscribe(Arc::new(Failing)).await;
        assert_eq!(clone.subscriber_count().await, 1);
    }
}
