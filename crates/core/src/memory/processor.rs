//! Payment processor stand-in.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use fiscalhost_shared::types::{AccountId, Money};
use tokio::sync::RwLock;

use crate::payment::{
    ChargeResult, PaymentMethodRef, PaymentProcessor, ProcessorError, ProcessorRefund,
};

/// Processor that approves every operation with a fixed fee, or declines all of them.
#[derive(Debug, Default)]
pub struct StubProcessor {
    fee: i64,
    fee_returned: i64,
    decline: Option<String>,
    counter: AtomicUsize,
    charges: RwLock<Vec<Money>>,
    refunds: RwLock<Vec<(String, Money)>>,
}

impl StubProcessor {
    /// Creates a processor charging no fee.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Withholds `fee` minor units on every charge and quote.
    #[must_use]
    pub const fn with_fee(mut self, fee: i64) -> Self {
        self.fee = fee;
        self
    }

    /// Gives back `fee` minor units of processor fee on every refund.
    #[must_use]
    pub const fn with_fee_returned(mut self, fee: i64) -> Self {
        self.fee_returned = fee;
        self
    }

    /// Declines every operation with `message`.
    #[must_use]
    pub fn declining(mut self, message: impl Into<String>) -> Self {
        self.decline = Some(message.into());
        self
    }

    /// Amounts charged so far.
    pub async fn charges(&self) -> Vec<Money> {
        self.charges.read().await.clone()
    }

    /// Refunds issued so far, with the charge they refer to.
    pub async fn refunds(&self) -> Vec<(String, Money)> {
        self.refunds.read().await.clone()
    }

    fn check(&self) -> Result<(), ProcessorError> {
        match &self.decline {
            Some(message) => Err(ProcessorError::new(message.clone())
                .with_code("card_declined")
                .with_payload(serde_json::json!({"decline_code": "generic_decline"}))),
            None => Ok(()),
        }
    }

    fn next_ref(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl PaymentProcessor for StubProcessor {
    async fn charge(
        &self,
        amount: Money,
        _method: &PaymentMethodRef,
    ) -> Result<ChargeResult, ProcessorError> {
        self.check()?;
        self.charges.write().await.push(amount);
        Ok(ChargeResult {
            processor_ref: self.next_ref("ch"),
            fee: Money::new(self.fee, amount.currency),
        })
    }

    async fn refund(
        &self,
        processor_ref: &str,
        amount: Money,
    ) -> Result<ProcessorRefund, ProcessorError> {
        self.check()?;
        self.refunds
            .write()
            .await
            .push((processor_ref.to_string(), amount));
        Ok(ProcessorRefund {
            refund_ref: self.next_ref("re"),
            fee_returned: Money::new(self.fee_returned, amount.currency),
        })
    }

    async fn quote_fee(&self, amount: Money) -> Result<Money, ProcessorError> {
        self.check()?;
        Ok(Money::new(self.fee, amount.currency))
    }

    async fn payout(&self, _payee: AccountId, _amount: Money) -> Result<String, ProcessorError> {
        self.check()?;
        Ok(self.next_ref("po"))
    }
}
