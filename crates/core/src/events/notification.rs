//! Notification subscriber.
//!
//! Maps events to template keys of an external notification channel.

use std::sync::Arc;

use async_trait::async_trait;
use fiscalhost_shared::types::AccountId;
use serde_json::json;

use super::bus::EventSubscriber;
use super::error::EventError;
use super::types::LedgerEvent;

/// External notification channel (email, webhooks).
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends a templated message to an account.
    ///
    /// # Errors
    ///
    /// Returns `EventError::Notification` if the channel rejects the message.
    async fn send(
        &self,
        template: &str,
        recipient: AccountId,
        data: serde_json::Value,
    ) -> Result<(), EventError>;
}

/// Forwards user-facing events to a `NotificationService`.
pub struct NotificationSubscriber {
    service: Arc<dyn NotificationService>,
}

impl NotificationSubscriber {
    /// Creates a subscriber sending through `service`.
    #[must_use]
    pub fn new(service: Arc<dyn NotificationService>) -> Self {
        Self { service }
    }

    /// Template key and recipient for an event, if it is user-facing.
    #[must_use]
    pub fn route(event: &LedgerEvent) -> Option<(&'static str, AccountId)> {
        match event {
            LedgerEvent::OrderProcessed { contributor, .. } => Some(("order.processed", *contributor)),
            LedgerEvent::OrderPaymentFailed { contributor, .. } => {
                Some(("payment.failed", *contributor))
            }
            LedgerEvent::OrderCancelled { contributor, .. } => {
                Some(("subscription.canceled", *contributor))
            }
            LedgerEvent::RefundCreated { recipient, .. } => Some(("order.refunded", *recipient)),
            LedgerEvent::ExpensePaid { payee, .. } => Some(("expense.paid", *payee)),
            LedgerEvent::TransactionGroupCreated { .. } | LedgerEvent::SettlementChanged { .. } => {
                None
            }
        }
    }
}

#[async_trait]
impl EventSubscriber for NotificationSubscriber {
    fn name(&self) -> &str {
        "notifications"
    }

    async fn handle(&self, event: &LedgerEvent) -> Result<(), EventError> {
        let Some((template, recipient)) = Self::route(event) else {
            return Ok(());
        };
        let data = serde_json::to_value(event).unwrap_or_else(|_| json!({}));
        self.service.send(template, recipient, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscalhost_shared::types::{Currency, Money, OrderId};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, AccountId, serde_json::Value)>>);

    #[async_trait]
    impl NotificationService for Outbox {
        async fn send(
            &self,
            template: &str,
            recipient: AccountId,
            data: serde_json::Value,
        ) -> Result<(), EventError> {
            self.0.lock().await.push((template.to_string(), recipient, data));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_payment_failed_carries_retry_framing() {
        let outbox = Arc::new(Outbox::default());
        let subscriber = NotificationSubscriber::new(outbox.clone());
        let contributor = AccountId::new();

        subscriber
            .handle(&LedgerEvent::OrderPaymentFailed {
                order_id: OrderId::new(),
                contributor,
                amount: Money::new(1000, Currency::Usd),
                will_retry: true,
                last_attempt: true,
                reason: "card declined".into(),
            })
            .await
            .unwrap();

        let sent = outbox.0.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "payment.failed");
        assert_eq!(sent[0].1, contributor);
        assert_eq!(sent[0].2["will_retry"], true);
        assert_eq!(sent[0].2["last_attempt"], true);
    }

    #[tokio::test]
    async fn test_internal_events_are_not_sent() {
        let outbox = Arc::new(Outbox::default());
        let subscriber = NotificationSubscriber::new(outbox.clone());

        subscriber
            .handle(&LedgerEvent::TransactionGroupCreated {
                group: fiscalhost_shared::types::TransactionGroupId::new(),
                linkage: crate::ledger::Linkage::Order(OrderId::new()),
                kinds: vec![],
            })
            .await
            .unwrap();

        assert!(outbox.0.lock().await.is_empty());
    }
}
