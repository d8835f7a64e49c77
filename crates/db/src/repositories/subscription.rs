//! Subscription repository for recurring billing state.
//!
//! Claims are conditional `UPDATE`s: a sweep only wins the row when the
//! charge number and due date it read are still current and no unexpired
//! claim is held. Saves are fenced by the claim token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fiscalhost_core::billing::{BillingError, ClaimGuard, Subscription, SubscriptionClaim, SubscriptionStore};
use fiscalhost_core::orders::{Order, OrderStatus};
use fiscalhost_shared::types::{OrderId, SubscriptionId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use tracing::debug;
use uuid::Uuid;

use super::error::RepositoryError;
use super::mapping::{
    count_to_row, order_active_model, order_from_model, subscription_active_model,
    subscription_from_model,
};
use crate::entities::{orders, subscriptions};

fn store_error(err: DbErr) -> BillingError {
    RepositoryError::from(err).into()
}

/// Subscription repository implementing `SubscriptionStore`.
#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    db: DatabaseConnection,
}

impl SubscriptionRepository {
    /// Creates a new subscription repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be encoded or inserted.
    pub async fn insert_order(&self, order: &Order) -> Result<(), BillingError> {
        let model = order_active_model(order, Utc::now())?;
        orders::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    /// Inserts a subscription. Its order must already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be encoded or inserted.
    pub async fn insert_subscription(&self, subscription: &Subscription) -> Result<(), BillingError> {
        let model = subscription_active_model(subscription, Utc::now())?;
        subscriptions::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for SubscriptionRepository {
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Subscription>, BillingError> {
        let rows = subscriptions::Entity::find()
            .filter(subscriptions::Column::IsActive.eq(true))
            .filter(subscriptions::Column::NextChargeDate.lte(now))
            .order_by_asc(subscriptions::Column::NextChargeDate)
            .order_by_asc(subscriptions::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(store_error)?;

        rows.into_iter()
            .map(|row| subscription_from_model(row).map_err(BillingError::from))
            .collect()
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Subscription>, BillingError> {
        let row = subscriptions::Entity::find()
            .filter(subscriptions::Column::OrderId.eq(order_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(store_error)?;
        Ok(row.map(subscription_from_model).transpose()?)
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>, BillingError> {
        let row = orders::Entity::find_by_id(order_id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_error)?;
        Ok(row.map(order_from_model).transpose()?)
    }

    async fn claim(
        &self,
        id: SubscriptionId,
        guard: &ClaimGuard,
        claim: SubscriptionClaim,
        now: DateTime<Utc>,
    ) -> Result<bool, BillingError> {
        let charge_number = count_to_row("charge_number", guard.charge_number)?;
        let due = match guard.next_charge_date {
            Some(date) => subscriptions::Column::NextChargeDate.eq(date),
            None => subscriptions::Column::NextChargeDate.is_null(),
        };

        let result = subscriptions::Entity::update_many()
            .col_expr(subscriptions::Column::ClaimToken, Expr::value(claim.token))
            .col_expr(subscriptions::Column::ClaimExpiresAt, Expr::value(claim.expires_at))
            .col_expr(subscriptions::Column::ClaimCharging, Expr::value(claim.charging))
            .col_expr(subscriptions::Column::UpdatedAt, Expr::value(now))
            .filter(subscriptions::Column::Id.eq(id.into_inner()))
            .filter(subscriptions::Column::IsActive.eq(true))
            .filter(subscriptions::Column::ChargeNumber.eq(charge_number))
            .filter(due)
            .filter(
                Condition::any()
                    .add(subscriptions::Column::ClaimToken.is_null())
                    .add(
                        Condition::all()
                            .add(subscriptions::Column::ClaimExpiresAt.lte(now))
                            .add(subscriptions::Column::ClaimCharging.eq(false)),
                    ),
            )
            .exec(&self.db)
            .await
            .map_err(store_error)?;

        let won = result.rows_affected == 1;
        debug!(subscription_id = %id, won, "Subscription claim attempted");
        Ok(won)
    }

    async fn save(&self, subscription: &Subscription, token: Uuid) -> Result<(), BillingError> {
        let mut released = subscription.clone();
        released.claim = None;
        let model = subscription_active_model(&released, Utc::now())?;

        let result = subscriptions::Entity::update_many()
            .set(model)
            .filter(subscriptions::Column::Id.eq(subscription.id.into_inner()))
            .filter(subscriptions::Column::ClaimToken.eq(token))
            .exec(&self.db)
            .await
            .map_err(store_error)?;

        if result.rows_affected == 0 {
            return Err(BillingError::ClaimLost(subscription.id));
        }
        Ok(())
    }

    async fn release(&self, id: SubscriptionId, token: Uuid) -> Result<(), BillingError> {
        subscriptions::Entity::update_many()
            .col_expr(subscriptions::Column::ClaimToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                subscriptions::Column::ClaimExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(subscriptions::Column::ClaimCharging, Expr::value(false))
            .filter(subscriptions::Column::Id.eq(id.into_inner()))
            .filter(subscriptions::Column::ClaimToken.eq(token))
            .exec(&self.db)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), BillingError> {
        let result = orders::Entity::update_many()
            .col_expr(orders::Column::Status, Expr::value(status.as_str()))
            .col_expr(orders::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(orders::Column::Id.eq(order_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(store_error)?;

        if result.rows_affected == 0 {
            return Err(BillingError::OrderNotFound(order_id));
        }
        Ok(())
    }
}
