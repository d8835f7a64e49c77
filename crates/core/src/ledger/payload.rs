//! Inputs for the composite ledger writes.

use chrono::{DateTime, Utc};
use fiscalhost_shared::types::{AccountId, ExpenseId, Money, OrderId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::fees::{FeesPayer, TaxInput};
use crate::orders::Host;

/// A successful contribution payment to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionPayload {
    /// Order being paid.
    pub order_id: OrderId,
    /// Paying account.
    pub contributor: AccountId,
    /// Receiving collective.
    pub collective: AccountId,
    /// Host of the collective.
    pub host: Host,
    /// Amount charged, tip and tax included.
    pub gross: Money,
    /// Tier amount before tax and tip, when fixed.
    pub expected_amount: Option<i64>,
    /// Platform tip included in `gross`.
    pub platform_tip: i64,
    /// Fee the processor withheld.
    pub processor_fee: Option<Money>,
    /// Host fee percent forced for this payment.
    pub host_fee_percent: Option<Decimal>,
    /// Host fee percent set on the tier.
    pub tier_host_fee_percent: Option<Decimal>,
    /// Tax settings.
    pub tax: Option<TaxInput>,
    /// Funds landed in a platform-owned processor account.
    pub platform_is_direct_recipient: bool,
    /// Processor charge reference.
    pub processor_ref: Option<String>,
    /// When the charge cleared.
    pub cleared_at: Option<DateTime<Utc>>,
    /// Extra metadata merged into every leg.
    pub data: serde_json::Value,
}

impl ContributionPayload {
    /// A payload with no tip, tax, fee or overrides.
    #[must_use]
    pub fn new(
        order_id: OrderId,
        contributor: AccountId,
        collective: AccountId,
        host: Host,
        gross: Money,
    ) -> Self {
        Self {
            order_id,
            contributor,
            collective,
            host,
            gross,
            expected_amount: None,
            platform_tip: 0,
            processor_fee: None,
            host_fee_percent: None,
            tier_host_fee_percent: None,
            tax: None,
            platform_is_direct_recipient: true,
            processor_ref: None,
            cleared_at: None,
            data: serde_json::Value::Null,
        }
    }
}

/// A paid expense to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpensePayment {
    /// Paid expense.
    pub expense_id: ExpenseId,
    /// Paying collective.
    pub collective: AccountId,
    /// Receiving payee.
    pub payee: AccountId,
    /// Host of the collective.
    pub host: Host,
    /// Amount paid out.
    pub amount: Money,
    /// Fee charged by the payout processor.
    pub processor_fee: Option<Money>,
    /// Who absorbs the fee.
    pub fees_payer: FeesPayer,
    /// Processor payout reference.
    pub payout_ref: Option<String>,
}

/// Funds added to a collective outside of a contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedFunds {
    /// Order the funds are attributed to.
    pub order_id: OrderId,
    /// Account the funds come from (often the host itself).
    pub source: AccountId,
    /// Receiving collective.
    pub collective: AccountId,
    /// Host of the collective.
    pub host: Host,
    /// Amount added.
    pub amount: Money,
    /// Host fee percent forced for these funds.
    pub host_fee_percent: Option<Decimal>,
    /// Free-text description.
    pub description: Option<String>,
}
