//! Recurring billing scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fiscalhost_shared::config::BillingSettings;
use fiscalhost_shared::types::{Money, OrderId, TransactionGroupId};
use futures::stream::{self, StreamExt};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::dates::{NextDates, charge_retry_count, next_charge_and_period_start};
use super::error::BillingError;
use super::report::{SweepReport, group_processed_orders};
use super::store::SubscriptionStore;
use super::types::{
    ChargeOutcome, ProcessedOrder, Subscription, SubscriptionClaim, SweepStatus,
};
use crate::events::{EventBus, LedgerEvent};
use crate::ledger::LedgerError;
use crate::orders::{Order, OrderStatus};

/// A recorded recurring charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeReceipt {
    /// Ledger group of the contribution.
    pub group: TransactionGroupId,
    /// Processor charge reference.
    pub processor_ref: String,
    /// Amount charged.
    pub amount: Money,
}

/// Charges an order and records the contribution.
#[async_trait]
pub trait OrderCharger: Send + Sync {
    /// Charges one period of a recurring order.
    ///
    /// # Errors
    ///
    /// `LedgerError::Processor` means the charge was declined or failed.
    /// Any other error leaves the charge unconfirmed: the processor may have
    /// taken the money before the failure.
    async fn charge_recurring(&self, order: &Order) -> Result<ChargeReceipt, LedgerError>;
}

/// Scheduler limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingConfig {
    /// Consecutive failures after which a subscription is cancelled.
    pub max_retries: u32,
    /// Orders charged concurrently within one sweep.
    pub sweep_concurrency: usize,
    /// Maximum due subscriptions loaded per sweep.
    pub sweep_limit: u64,
    /// How long a claim holds a subscription.
    pub claim_lease: Duration,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self::from(&BillingSettings::default())
    }
}

impl From<&BillingSettings> for BillingConfig {
    fn from(settings: &BillingSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            sweep_concurrency: settings.sweep_concurrency.max(1),
            sweep_limit: settings.sweep_limit,
            claim_lease: Duration::seconds(i64::try_from(settings.claim_lease_secs).unwrap_or(i64::MAX / 1000)),
        }
    }
}

/// Options of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOptions {
    /// Report what would be charged without charging or mutating anything.
    pub dry_run: bool,
    /// Overrides the configured batch limit.
    pub limit: Option<u64>,
}

/// Charges due subscriptions and maintains their schedule.
#[derive(Clone)]
pub struct BillingScheduler {
    store: Arc<dyn SubscriptionStore>,
    charger: Arc<dyn OrderCharger>,
    events: EventBus,
    config: BillingConfig,
}

impl BillingScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        charger: Arc<dyn OrderCharger>,
        events: EventBus,
        config: BillingConfig,
    ) -> Self {
        Self {
            store,
            charger,
            events,
            config,
        }
    }

    /// Returns the scheduler limits.
    #[must_use]
    pub const fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// Charges every subscription due at `now`.
    ///
    /// Orders are processed with bounded concurrency; a failure on one order
    /// never aborts the others and ends up in the report.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::Store` only if the due subscriptions cannot be loaded.
    #[instrument(skip(self))]
    pub async fn run_sweep(
        &self,
        now: DateTime<Utc>,
        options: SweepOptions,
    ) -> Result<SweepReport, BillingError> {
        let limit = options.limit.unwrap_or(self.config.sweep_limit);
        let due = self.store.find_due(now, limit).await?;
        info!(due = due.len(), dry_run = options.dry_run, "Starting billing sweep");

        let results: Vec<ProcessedOrder> = stream::iter(due)
            .map(|subscription| self.process_due(subscription, options.dry_run, now))
            .buffer_unordered(self.config.sweep_concurrency)
            .collect()
            .await;

        let report = group_processed_orders(results, self.config.max_retries);
        info!(
            charged = report.charged.len(),
            past_due = report.past_due.len(),
            canceled = report.canceled.len(),
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            "Billing sweep finished"
        );
        Ok(report)
    }

    async fn process_due(
        &self,
        subscription: Subscription,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> ProcessedOrder {
        let order_id = subscription.order_id;
        let amount = subscription.amount;
        let retries = subscription.charge_retry_count;

        let result = match self.store.find_order(order_id).await {
            Ok(Some(order)) => {
                self.process_order_with_subscription(&order, subscription, dry_run, now)
                    .await
            }
            Ok(None) => Err(BillingError::OrderNotFound(order_id)),
            Err(err) => Err(err),
        };

        result.unwrap_or_else(|err| {
            error!(%order_id, error = %err, "Could not process order");
            ProcessedOrder {
                error: Some(err.to_string()),
                ..ProcessedOrder::new(order_id, SweepStatus::Error, amount, retries)
            }
        })
    }

    /// Charges one recurring order.
    ///
    /// Fixed-count subscriptions that made all their charges are deactivated
    /// without a charge attempt. A declined charge is an outcome, not an
    /// error: the schedule moves to the retry date and the order is cancelled
    /// once `max_retries` consecutive attempts failed.
    ///
    /// The subscription is held by a charging claim for the whole attempt.
    /// When the charge may have gone through but the new schedule could not
    /// be saved, the claim is kept and the order comes back as
    /// `SweepStatus::Unconfirmed` until `resolve_unconfirmed_charge` settles it.
    ///
    /// # Errors
    ///
    /// - `BillingError::ClaimLost` if the claim was released before saving
    /// - `BillingError::Store` on storage failure before the charge
    #[instrument(skip(self, order, subscription), fields(order_id = %order.id))]
    pub async fn process_order_with_subscription(
        &self,
        order: &Order,
        subscription: Subscription,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Result<ProcessedOrder, BillingError> {
        if dry_run {
            return Ok(ProcessedOrder::new(
                order.id,
                SweepStatus::DryRun,
                subscription.amount,
                subscription.charge_retry_count,
            ));
        }

        if let Some(held) = subscription.claim.filter(|claim| claim.is_unconfirmed(now)) {
            return Ok(unconfirmed(
                order.id,
                subscription.amount,
                subscription.charge_retry_count,
                &format!("Charge started before {} was never confirmed", held.expires_at),
            ));
        }

        let claim = SubscriptionClaim {
            token: Uuid::new_v4(),
            expires_at: now + self.config.claim_lease,
            charging: true,
        };
        if !self
            .store
            .claim(subscription.id, &subscription.guard(), claim, now)
            .await?
        {
            info!("Subscription held by another sweep, skipping");
            return Ok(ProcessedOrder::new(
                order.id,
                SweepStatus::Skipped,
                subscription.amount,
                subscription.charge_retry_count,
            ));
        }

        let subscription_id = subscription.id;
        let result = self.process_claimed(order, subscription, claim.token, now).await;
        if result.is_err() {
            if let Err(err) = self.store.release(subscription_id, claim.token).await {
                warn!(error = %err, "Could not release subscription claim");
            }
        }
        result
    }

    async fn process_claimed(
        &self,
        order: &Order,
        mut subscription: Subscription,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ProcessedOrder, BillingError> {
        let amount = subscription.amount;

        if subscription.quantity_reached() {
            subscription.deactivate(now);
            self.store.save(&subscription, token).await?;
            self.store
                .update_order_status(order.id, OrderStatus::Cancelled)
                .await?;
            info!(charges = subscription.charge_number, "All charges made, subscription deactivated");
            self.events
                .publish(LedgerEvent::OrderCancelled {
                    order_id: order.id,
                    contributor: order.contributor_account_id,
                    reason: "All scheduled charges were made".into(),
                })
                .await;
            return Ok(ProcessedOrder::new(order.id, SweepStatus::Deactivated, amount, 0));
        }

        let next = next_charge_and_period_start(ChargeOutcome::Success, &subscription, now)?;
        match self.charger.charge_recurring(order).await {
            Ok(receipt) => {
                record_success(&mut subscription, next);
                if let Err(err) = self.store.save(&subscription, token).await {
                    return Ok(unconfirmed(
                        order.id,
                        receipt.amount,
                        subscription.charge_retry_count,
                        &err,
                    ));
                }
                if let Err(err) = self
                    .store
                    .update_order_status(order.id, OrderStatus::Active)
                    .await
                {
                    warn!(error = %err, "Charge saved but order status not updated");
                }

                info!(
                    group = %receipt.group,
                    charge_number = subscription.charge_number,
                    next_charge = %next.next_charge_date,
                    "Recurring charge succeeded"
                );
                self.events
                    .publish(LedgerEvent::OrderProcessed {
                        order_id: order.id,
                        contributor: order.contributor_account_id,
                        amount: receipt.amount,
                        charge_number: subscription.charge_number,
                    })
                    .await;
                Ok(ProcessedOrder::new(order.id, SweepStatus::Success, receipt.amount, 0))
            }
            Err(LedgerError::Processor(err)) => {
                let reason = err.message().to_string();
                let next = next_charge_and_period_start(ChargeOutcome::Failure, &subscription, now)?;
                let retries = charge_retry_count(ChargeOutcome::Failure, &subscription);
                subscription.charge_retry_count = retries;
                subscription.next_charge_date = Some(next.next_charge_date);
                subscription.next_period_start = Some(next.next_period_start);

                let exhausted = retries >= self.config.max_retries;
                if exhausted {
                    subscription.deactivate(now);
                }
                self.store.save(&subscription, token).await?;
                let status = if exhausted {
                    OrderStatus::Cancelled
                } else {
                    OrderStatus::Error
                };
                self.store.update_order_status(order.id, status).await?;

                warn!(
                    retries,
                    max_retries = self.config.max_retries,
                    code = ?err.code(),
                    error = %err,
                    "Recurring charge failed"
                );
                self.events
                    .publish(LedgerEvent::OrderPaymentFailed {
                        order_id: order.id,
                        contributor: order.contributor_account_id,
                        amount,
                        will_retry: !exhausted,
                        last_attempt: !exhausted && retries + 1 >= self.config.max_retries,
                        reason: reason.clone(),
                    })
                    .await;
                if exhausted {
                    self.events
                        .publish(LedgerEvent::OrderCancelled {
                            order_id: order.id,
                            contributor: order.contributor_account_id,
                            reason,
                        })
                        .await;
                }

                Ok(ProcessedOrder {
                    error: Some(err.message().to_string()),
                    ..ProcessedOrder::new(order.id, SweepStatus::Failure, amount, retries)
                })
            }
            Err(err) => Ok(unconfirmed(order.id, amount, subscription.charge_retry_count, &err)),
        }
    }

    /// Settles a charge a sweep left unconfirmed.
    ///
    /// With `charged` the schedule moves on as after a successful charge.
    /// Otherwise the claim is dropped and the next sweep charges the period.
    ///
    /// # Errors
    ///
    /// - `BillingError::SubscriptionNotFound` if the order has no subscription
    /// - `BillingError::NoUnconfirmedCharge` unless a charging claim outlived its lease
    /// - `BillingError::ClaimLost` if the charge was resolved concurrently
    #[instrument(skip(self))]
    pub async fn resolve_unconfirmed_charge(
        &self,
        order_id: OrderId,
        charged: bool,
        now: DateTime<Utc>,
    ) -> Result<Subscription, BillingError> {
        let mut subscription = self
            .store
            .find_by_order(order_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound(order_id))?;
        let held = subscription
            .claim
            .filter(|claim| claim.is_unconfirmed(now))
            .ok_or(BillingError::NoUnconfirmedCharge(order_id))?;
        subscription.claim = None;

        if !charged {
            self.store.release(subscription.id, held.token).await?;
            info!("Unconfirmed charge dropped, period is due again");
            return Ok(subscription);
        }

        let next = next_charge_and_period_start(ChargeOutcome::Success, &subscription, now)?;
        record_success(&mut subscription, next);
        self.store.save(&subscription, held.token).await?;
        self.store
            .update_order_status(order_id, OrderStatus::Active)
            .await?;
        info!(
            charge_number = subscription.charge_number,
            next_charge = %next.next_charge_date,
            "Unconfirmed charge recorded"
        );
        Ok(subscription)
    }

    /// Stops an active subscription and cancels its order.
    ///
    /// # Errors
    ///
    /// - `BillingError::SubscriptionNotFound` if the order has no subscription
    /// - `BillingError::InactiveSubscription` if it is already inactive
    /// - `BillingError::ClaimLost` if a sweep holds it right now
    #[instrument(skip(self))]
    pub async fn cancel_subscription(
        &self,
        order_id: OrderId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Subscription, BillingError> {
        let (order, mut subscription, token) = self.claim_for_update(order_id, now).await?;

        subscription.deactivate(now);
        self.store.save(&subscription, token).await?;
        self.store
            .update_order_status(order_id, OrderStatus::Cancelled)
            .await?;

        info!(reason, "Subscription cancelled");
        self.events
            .publish(LedgerEvent::OrderCancelled {
                order_id,
                contributor: order.contributor_account_id,
                reason: reason.to_string(),
            })
            .await;
        Ok(subscription)
    }

    /// Schedules an immediate charge after a payment method change.
    ///
    /// # Errors
    ///
    /// - `BillingError::SubscriptionNotFound` if the order has no subscription
    /// - `BillingError::InactiveSubscription` if it is inactive
    /// - `BillingError::ClaimLost` if a sweep holds it right now
    #[instrument(skip(self))]
    pub async fn update_payment_method(
        &self,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Subscription, BillingError> {
        let (_, mut subscription, token) = self.claim_for_update(order_id, now).await?;

        let next = next_charge_and_period_start(ChargeOutcome::Updated, &subscription, now)?;
        subscription.charge_retry_count = charge_retry_count(ChargeOutcome::Updated, &subscription);
        subscription.next_charge_date = Some(next.next_charge_date);
        subscription.next_period_start = Some(next.next_period_start);
        self.store.save(&subscription, token).await?;
        self.store
            .update_order_status(order_id, OrderStatus::Active)
            .await?;

        info!(next_charge = %next.next_charge_date, "Payment method updated");
        Ok(subscription)
    }

    async fn claim_for_update(
        &self,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<(Order, Subscription, Uuid), BillingError> {
        let subscription = self
            .store
            .find_by_order(order_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound(order_id))?;
        if !subscription.is_active {
            return Err(BillingError::InactiveSubscription(order_id));
        }
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or(BillingError::OrderNotFound(order_id))?;

        let claim = SubscriptionClaim {
            token: Uuid::new_v4(),
            expires_at: now + self.config.claim_lease,
            charging: false,
        };
        if !self
            .store
            .claim(subscription.id, &subscription.guard(), claim, now)
            .await?
        {
            return Err(BillingError::ClaimLost(subscription.id));
        }
        Ok((order, subscription, claim.token))
    }
}

fn record_success(subscription: &mut Subscription, next: NextDates) {
    subscription.charge_number = subscription.charge_number.saturating_add(1);
    subscription.charge_retry_count = charge_retry_count(ChargeOutcome::Success, subscription);
    subscription.next_charge_date = Some(next.next_charge_date);
    subscription.next_period_start = Some(next.next_period_start);
}

fn unconfirmed(
    order_id: OrderId,
    amount: Money,
    retries: u32,
    reason: &dyn std::fmt::Display,
) -> ProcessedOrder {
    error!(%order_id, error = %reason, "Charge not confirmed, subscription held until resolved");
    ProcessedOrder {
        error: Some(reason.to_string()),
        ..ProcessedOrder::new(order_id, SweepStatus::Unconfirmed, amount, retries)
    }
}
