//! Currency error types.

use chrono::NaiveDate;
use fiscalhost_shared::{AppError, ErrorCategory};
use fiscalhost_shared::types::Currency;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while looking up rates or converting amounts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CurrencyError {
    /// No rate is known for the pair on or before the date.
    #[error("No exchange rate found for {from} to {to} on {date}")]
    RateNotFound {
        /// Source currency.
        from: Currency,
        /// Target currency.
        to: Currency,
        /// Requested date.
        date: NaiveDate,
    },

    /// The provider returned a zero or negative rate.
    #[error("Invalid exchange rate {rate} for {from} to {to}")]
    InvalidRate {
        /// Source currency.
        from: Currency,
        /// Target currency.
        to: Currency,
        /// Offending rate.
        rate: Decimal,
    },

    /// The converted amount does not fit in minor units.
    #[error("Amount overflow while converting {amount} at rate {rate}")]
    Overflow {
        /// Amount being converted.
        amount: i64,
        /// Rate applied.
        rate: Decimal,
    },

    /// The rate provider failed.
    #[error("Exchange rate provider error: {0}")]
    Provider(String),
}

impl CurrencyError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::RateNotFound { .. } => "EXCHANGE_RATE_NOT_FOUND",
            Self::InvalidRate { .. } => "INVALID_EXCHANGE_RATE",
            Self::Overflow { .. } => "AMOUNT_OVERFLOW",
            Self::Provider(_) => "EXCHANGE_RATE_PROVIDER_ERROR",
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::RateNotFound { .. } | Self::InvalidRate { .. } | Self::Overflow { .. } => {
                ErrorCategory::Validation
            }
            Self::Provider(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::RateNotFound { .. } | Self::InvalidRate { .. } | Self::Overflow { .. } => 400,
            Self::Provider(_) => 503,
        }
    }

    /// Returns true if retrying later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

impl From<CurrencyError> for AppError {
    fn from(err: CurrencyError) -> Self {
        match err {
            CurrencyError::RateNotFound { .. }
            | CurrencyError::InvalidRate { .. }
            | CurrencyError::Overflow { .. } => Self::Validation(err.to_string()),
            CurrencyError::Provider(msg) => Self::Internal(msg),
        }
    }
}
