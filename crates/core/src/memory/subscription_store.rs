//! In-memory subscription store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fiscalhost_shared::types::{OrderId, SubscriptionId};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::billing::{BillingError, ClaimGuard, Subscription, SubscriptionClaim, SubscriptionStore};
use crate::orders::{Order, OrderStatus};

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

/// Subscription store holding orders and subscriptions in memory.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    state: RwLock<State>,
}

impl InMemorySubscriptionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an order and its subscription.
    pub async fn insert(&self, order: Order, subscription: Subscription) {
        let mut state = self.state.write().await;
        state.orders.insert(order.id, order);
        state.subscriptions.insert(subscription.id, subscription);
    }

    /// Stores an order without a subscription.
    pub async fn insert_order(&self, order: Order) {
        self.state.write().await.orders.insert(order.id, order);
    }

    /// Stores a subscription whose order is missing.
    pub async fn insert_subscription(&self, subscription: Subscription) {
        self.state
            .write()
            .await
            .subscriptions
            .insert(subscription.id, subscription);
    }

    /// Returns the subscription of an order.
    pub async fn subscription(&self, order_id: OrderId) -> Option<Subscription> {
        let state = self.state.read().await;
        state
            .subscriptions
            .values()
            .find(|s| s.order_id == order_id)
            .cloned()
    }

    /// Returns an order's status.
    pub async fn order_status(&self, order_id: OrderId) -> Option<OrderStatus> {
        self.state.read().await.orders.get(&order_id).map(|o| o.status)
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Subscription>, BillingError> {
        let state = self.state.read().await;
        let mut due: Vec<Subscription> = state
            .subscriptions
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|s| s.next_charge_date);
        due.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(due)
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Subscription>, BillingError> {
        Ok(self.subscription(order_id).await)
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, BillingError> {
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn claim(
        &self,
        id: SubscriptionId,
        guard: &ClaimGuard,
        claim: SubscriptionClaim,
        now: DateTime<Utc>,
    ) -> Result<bool, BillingError> {
        let mut state = self.state.write().await;
        match state.subscriptions.get_mut(&id) {
            Some(subscription) if subscription.claimable(guard, now) => {
                subscription.claim = Some(claim);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn save(&self, subscription: &Subscription, token: Uuid) -> Result<(), BillingError> {
        let mut state = self.state.write().await;
        let stored = state
            .subscriptions
            .get_mut(&subscription.id)
            .filter(|stored| stored.claim.is_some_and(|claim| claim.token == token))
            .ok_or(BillingError::ClaimLost(subscription.id))?;
        *stored = Subscription {
            claim: None,
            ..subscription.clone()
        };
        Ok(())
    }

    async fn release(&self, id: SubscriptionId, token: Uuid) -> Result<(), BillingError> {
        let mut state = self.state.write().await;
        if let Some(stored) = state.subscriptions.get_mut(&id) {
            if stored.claim.is_some_and(|claim| claim.token == token) {
                stored.claim = None;
            }
        }
        Ok(())
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), BillingError> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(BillingError::OrderNotFound(order_id))?;
        order.status = status;
        Ok(())
    }
}
