//! Order, expense and host types.

use chrono::{DateTime, Utc};
use fiscalhost_shared::types::{
    AccountId, Currency, ExpenseId, Money, OrderId, SubscriptionId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::fees::{FeesPayer, TaxInput};
use crate::payment::PaymentMethodRef;

/// A fiscal host: the entity legally holding a collective's funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Host ledger account.
    pub account_id: AccountId,
    /// Accounting currency.
    pub currency: Currency,
    /// ISO country code, used as tax origin when the collective has none.
    pub country: Option<String>,
    /// Default host fee percent.
    pub host_fee_percent: Option<Decimal>,
}

impl Host {
    /// Creates a host with no country or fee default.
    #[must_use]
    pub const fn new(account_id: AccountId, currency: Currency) -> Self {
        Self {
            account_id,
            currency,
            country: None,
            host_fee_percent: None,
        }
    }
}

/// Lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, not yet charged.
    New,
    /// Charge in flight.
    Pending,
    /// Recurring and charging normally.
    Active,
    /// Last recurring charge failed.
    Error,
    /// One-off order paid.
    Paid,
    /// Stopped; no further charges.
    Cancelled,
    /// Payment method expired.
    Expired,
    /// Refunded.
    Refunded,
}

impl OrderStatus {
    /// Returns the storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Error => "ERROR",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
            Self::Refunded => "REFUNDED",
        }
    }

    /// True when the order can still be charged.
    #[must_use]
    pub const fn is_chargeable(self) -> bool {
        matches!(self, Self::New | Self::Pending | Self::Active | Self::Error)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PENDING" => Ok(Self::Pending),
            "ACTIVE" => Ok(Self::Active),
            "ERROR" => Ok(Self::Error),
            "PAID" => Ok(Self::Paid),
            "CANCELLED" => Ok(Self::Cancelled),
            "EXPIRED" => Ok(Self::Expired),
            "REFUNDED" => Ok(Self::Refunded),
            _ => Err(format!("Unknown order status: {s}")),
        }
    }
}

/// Intent to pay a collective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier.
    pub id: OrderId,
    /// Paying account.
    pub contributor_account_id: AccountId,
    /// Receiving collective.
    pub collective_account_id: AccountId,
    /// Host of the collective.
    pub host: Host,
    /// Amount charged per payment, tip and tax included.
    pub total_amount: Money,
    /// Platform tip included in `total_amount`.
    pub platform_tip: i64,
    /// Tier amount before tax and tip, when fixed.
    pub expected_amount: Option<i64>,
    /// Tax settings.
    pub tax: Option<TaxInput>,
    /// Host fee percent set on the tier.
    pub tier_host_fee_percent: Option<Decimal>,
    /// Stored payment method.
    pub payment_method: Option<PaymentMethodRef>,
    /// Current status.
    pub status: OrderStatus,
    /// Recurring schedule, if any.
    pub subscription_id: Option<SubscriptionId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// True for orders charged on a schedule.
    #[must_use]
    pub const fn is_recurring(&self) -> bool {
        self.subscription_id.is_some()
    }
}

/// Lifecycle of an expense payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    /// Approved and waiting for payment.
    Approved,
    /// Payout sent, waiting for the processor to confirm.
    Processing,
    /// Paid and recorded.
    Paid,
    /// Payout failed.
    Error,
}

impl ExpenseStatus {
    /// Returns the storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Processing => "PROCESSING",
            Self::Paid => "PAID",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payout request from a collective to a payee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    /// Expense identifier.
    pub id: ExpenseId,
    /// Paying collective.
    pub collective_account_id: AccountId,
    /// Receiving payee.
    pub payee_account_id: AccountId,
    /// Amount requested.
    pub amount: Money,
    /// Current status.
    pub status: ExpenseStatus,
    /// Who absorbs the processor fee.
    #[serde(default)]
    pub fees_payer: FeesPayer,
}
