//! Contribution charging.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, instrument};

use super::types::{Order, OrderStatus};
use crate::billing::{ChargeReceipt, OrderCharger};
use crate::events::LedgerEvent;
use crate::ledger::{ContributionPayload, LedgerError, LedgerService, RecordedGroup};
use crate::payment::{ChargeResult, PaymentMethodRef, PaymentProcessor, ProcessorError};

/// An order after its first charge.
#[derive(Debug, Clone)]
pub struct ExecutedOrder {
    /// The order with its new status.
    pub order: Order,
    /// Ledger entries of the charge.
    pub recorded: RecordedGroup,
}

/// Charges orders and records the resulting contributions.
#[derive(Clone)]
pub struct OrderService {
    ledger: LedgerService,
    processor: Arc<dyn PaymentProcessor>,
}

impl OrderService {
    /// Creates an order service.
    #[must_use]
    pub fn new(ledger: LedgerService, processor: Arc<dyn PaymentProcessor>) -> Self {
        Self { ledger, processor }
    }

    /// Charges an order for the first time and records the contribution.
    ///
    /// One-off orders end up PAID, recurring ones ACTIVE.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidState` if the order was already paid or closed
    /// - `LedgerError::Processor` if the processor declines; nothing is recorded
    /// - any error of `create_from_contribution_payload`
    #[instrument(skip(self, order, method), fields(order_id = %order.id))]
    pub async fn execute_order(
        &self,
        mut order: Order,
        method: &PaymentMethodRef,
    ) -> Result<ExecutedOrder, LedgerError> {
        if !matches!(
            order.status,
            OrderStatus::New | OrderStatus::Pending | OrderStatus::Error
        ) {
            return Err(LedgerError::InvalidState {
                entity: "order",
                status: order.status.to_string(),
                operation: "execute",
            });
        }

        let (recorded, _) = self.charge_and_record(&order, method).await?;
        order.status = if order.is_recurring() {
            OrderStatus::Active
        } else {
            OrderStatus::Paid
        };
        order.payment_method = Some(method.clone());

        info!(group = %recorded.group, status = %order.status, "Order executed");
        self.ledger
            .events()
            .publish(LedgerEvent::OrderProcessed {
                order_id: order.id,
                contributor: order.contributor_account_id,
                amount: order.total_amount,
                charge_number: 1,
            })
            .await;

        Ok(ExecutedOrder { order, recorded })
    }

    async fn charge_and_record(
        &self,
        order: &Order,
        method: &PaymentMethodRef,
    ) -> Result<(RecordedGroup, ChargeResult), LedgerError> {
        let charge = self.processor.charge(order.total_amount, method).await?;

        let payload = ContributionPayload {
            expected_amount: order.expected_amount,
            platform_tip: order.platform_tip,
            processor_fee: Some(charge.fee),
            tier_host_fee_percent: order.tier_host_fee_percent,
            tax: order.tax.clone(),
            platform_is_direct_recipient: method.platform_is_direct_recipient,
            processor_ref: Some(charge.processor_ref.clone()),
            cleared_at: Some(Utc::now()),
            ..ContributionPayload::new(
                order.id,
                order.contributor_account_id,
                order.collective_account_id,
                order.host.clone(),
                order.total_amount,
            )
        };

        let recorded = self
            .ledger
            .create_from_contribution_payload(payload)
            .await
            .inspect_err(|err| {
                // The money moved but the ledger does not show it
                error!(
                    processor_ref = %charge.processor_ref,
                    error = %err,
                    "Charge succeeded but recording failed"
                );
            })?;
        Ok((recorded, charge))
    }
}

#[async_trait]
impl OrderCharger for OrderService {
    async fn charge_recurring(&self, order: &Order) -> Result<ChargeReceipt, LedgerError> {
        let method = order.payment_method.as_ref().ok_or_else(|| {
            ProcessorError::new("No payment method on file").with_code("missing_payment_method")
        })?;

        let (recorded, charge) = self.charge_and_record(order, method).await?;
        Ok(ChargeReceipt {
            group: recorded.group,
            processor_ref: charge.processor_ref,
            amount: order.total_amount,
        })
    }
}
