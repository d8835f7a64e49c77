//! Subscription persistence boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fiscalhost_shared::types::{OrderId, SubscriptionId};
use uuid::Uuid;

use super::error::BillingError;
use super::types::{ClaimGuard, Subscription, SubscriptionClaim};
use crate::orders::{Order, OrderStatus};

/// Storage for subscriptions and the status of their orders.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Lists active subscriptions due at `now`, oldest due date first.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Store` on storage failure.
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Subscription>, BillingError>;

    /// Finds the subscription of an order.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Store` on storage failure.
    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Subscription>, BillingError>;

    /// Finds an order.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Store` on storage failure.
    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, BillingError>;

    /// Claims a subscription if it still matches `guard` and no live claim holds it.
    ///
    /// Returns false when another holder won.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Store` on storage failure.
    async fn claim(
        &self,
        id: SubscriptionId,
        guard: &ClaimGuard,
        claim: SubscriptionClaim,
        now: DateTime<Utc>,
    ) -> Result<bool, BillingError>;

    /// Saves a claimed subscription and drops the claim.
    ///
    /// # Errors
    ///
    /// - `BillingError::ClaimLost` if `token` no longer holds the claim
    /// - `BillingError::Store` on storage failure
    async fn save(&self, subscription: &Subscription, token: Uuid) -> Result<(), BillingError>;

    /// Drops a claim without changing the subscription.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Store` on storage failure.
    async fn release(&self, id: SubscriptionId, token: Uuid) -> Result<(), BillingError>;

    /// Sets an order's status.
    ///
    /// # Errors
    ///
    /// - `BillingError::OrderNotFound` if the order does not exist
    /// - `BillingError::Store` on storage failure
    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), BillingError>;
}
