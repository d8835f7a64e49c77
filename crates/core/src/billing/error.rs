//! Billing error types.

use chrono::{DateTime, Utc};
use fiscalhost_shared::types::{OrderId, SubscriptionId};
use fiscalhost_shared::{AppError, ErrorCategory};
use thiserror::Error;

use crate::ledger::LedgerError;

/// Errors raised by the billing scheduler.
#[derive(Debug, Error)]
pub enum BillingError {
    /// The order has no subscription.
    #[error("Order {0} has no subscription")]
    SubscriptionNotFound(OrderId),

    /// A due subscription points at a missing order.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The subscription is not active.
    #[error("Subscription of order {0} is not active")]
    InactiveSubscription(OrderId),

    /// Another holder claimed the subscription, or the claim lapsed.
    #[error("Claim on subscription {0} was lost")]
    ClaimLost(SubscriptionId),

    /// No charge of the order is waiting to be confirmed.
    #[error("Order {0} has no unconfirmed charge")]
    NoUnconfirmedCharge(OrderId),

    /// The next period falls outside the supported calendar.
    #[error("No billing period follows {0}")]
    DateOutOfRange(DateTime<Utc>),

    /// Recording the charge failed for a reason other than the processor.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Storage failure.
    #[error("Storage error: {0}")]
    Store(String),
}

impl BillingError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::SubscriptionNotFound(_) => "SUBSCRIPTION_NOT_FOUND",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::InactiveSubscription(_) => "INACTIVE_SUBSCRIPTION",
            Self::ClaimLost(_) => "CLAIM_LOST",
            Self::NoUnconfirmedCharge(_) => "NO_UNCONFIRMED_CHARGE",
            Self::DateOutOfRange(_) => "DATE_OUT_OF_RANGE",
            Self::Ledger(err) => err.error_code(),
            Self::Store(_) => "STORAGE_ERROR",
        }
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::SubscriptionNotFound(_) | Self::OrderNotFound(_) => 404,
            Self::InactiveSubscription(_) | Self::ClaimLost(_) | Self::NoUnconfirmedCharge(_) => {
                409
            }
            Self::Ledger(err) => err.http_status_code(),
            Self::DateOutOfRange(_) | Self::Store(_) => 500,
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::SubscriptionNotFound(_) | Self::OrderNotFound(_) => ErrorCategory::NotFound,
            Self::InactiveSubscription(_) | Self::ClaimLost(_) | Self::NoUnconfirmedCharge(_) => {
                ErrorCategory::Consistency
            }
            Self::Ledger(err) => err.category(),
            Self::DateOutOfRange(_) | Self::Store(_) => ErrorCategory::Infrastructure,
        }
    }

    /// True when retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ClaimLost(_) | Self::Store(_) => true,
            Self::Ledger(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Ledger(inner) => inner.into(),
            BillingError::SubscriptionNotFound(_) | BillingError::OrderNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            BillingError::InactiveSubscription(_)
            | BillingError::ClaimLost(_)
            | BillingError::NoUnconfirmedCharge(_) => Self::Conflict(err.to_string()),
            BillingError::Store(_) => Self::Database(err.to_string()),
            BillingError::DateOutOfRange(_) => Self::Internal(err.to_string()),
        }
    }
}
