//! Payment processor boundary.
//!
//! The processor itself lives outside this crate. Charges, refunds and fee
//! quotes go through `PaymentProcessor`; failures come back as
//! `ProcessorError`, whose display text is safe to show to users while the
//! raw processor payload is kept for diagnostics.

mod error;

pub use error::ProcessorError;

use async_trait::async_trait;
use fiscalhost_shared::types::{AccountId, Money};
use serde::{Deserialize, Serialize};

/// Reference to a stored payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodRef {
    /// Processor-side identifier (card token, mandate id).
    pub id: String,
    /// Processor name, e.g. `stripe`.
    pub service: String,
    /// True when funds land in a platform-owned processor account.
    ///
    /// When false the host collects everything and owes platform tips back.
    #[serde(default)]
    pub platform_is_direct_recipient: bool,
}

/// A successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeResult {
    /// Processor-side charge identifier.
    pub processor_ref: String,
    /// Fee withheld by the processor.
    pub fee: Money,
}

/// A successful processor refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorRefund {
    /// Processor-side refund identifier.
    pub refund_ref: String,
    /// Portion of the original processor fee given back.
    pub fee_returned: Money,
}

/// External payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Charges a payment method.
    ///
    /// # Errors
    ///
    /// Returns `ProcessorError` when the processor declines or fails.
    async fn charge(
        &self,
        amount: Money,
        method: &PaymentMethodRef,
    ) -> Result<ChargeResult, ProcessorError>;

    /// Refunds a previous charge.
    ///
    /// # Errors
    ///
    /// Returns `ProcessorError` when the processor rejects the refund.
    async fn refund(
        &self,
        processor_ref: &str,
        amount: Money,
    ) -> Result<ProcessorRefund, ProcessorError>;

    /// Quotes the fee the processor would withhold on `amount`.
    ///
    /// # Errors
    ///
    /// Returns `ProcessorError` when the processor cannot quote.
    async fn quote_fee(&self, amount: Money) -> Result<Money, ProcessorError>;

    /// Sends a payout to a payee. Settles asynchronously; returns the payout reference.
    ///
    /// # Errors
    ///
    /// Returns `ProcessorError` when the processor rejects the payout.
    async fn payout(&self, payee: AccountId, amount: Money) -> Result<String, ProcessorError>;
}
