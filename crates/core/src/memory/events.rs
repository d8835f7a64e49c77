//! Event subscriber that records what it receives.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::events::{EventError, EventSubscriber, LedgerEvent};

/// Subscriber that keeps every event, optionally failing after recording it.
#[derive(Default)]
pub struct RecordingSubscriber {
    events: RwLock<Vec<LedgerEvent>>,
    fail: bool,
}

impl RecordingSubscriber {
    /// Creates a subscriber that accepts every event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a subscriber that records events, then reports a failure.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            events: RwLock::default(),
            fail: true,
        }
    }

    /// Returns the events received so far.
    pub async fn events(&self) -> Vec<LedgerEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl EventSubscriber for RecordingSubscriber {
    fn name(&self) -> &str {
        "recording"
    }

    async fn handle(&self, event: &LedgerEvent) -> Result<(), EventError> {
        self.events.write().await.push(event.clone());
        if self.fail {
            return Err(EventError::Subscriber {
                subscriber: self.name().to_string(),
                message: format!("rejected {}", event.name()),
            });
        }
        Ok(())
    }
}
