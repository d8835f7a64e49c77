//! Fee and tax error types.
//!
//! Every variant is a validation failure: the caller has to correct the
//! input and nothing has been written.

use fiscalhost_shared::types::Currency;
use fiscalhost_shared::{AppError, ErrorCategory};
use rust_decimal::Decimal;
use thiserror::Error;

use super::tax::TaxType;
use crate::currency::CurrencyError;

/// Errors raised while decomposing a payment into fees and tax.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeeError {
    // ========== Amount Errors ==========
    /// Gross amount must be positive.
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    /// Platform tip is negative or larger than the gross amount.
    #[error("Platform tip {tip} is invalid for a gross amount of {gross}")]
    InvalidPlatformTip {
        /// Tip requested.
        tip: i64,
        /// Gross amount charged.
        gross: i64,
    },

    /// Gross amount does not match base + tax + tip.
    #[error("Amount mismatch: expected {expected} {currency}, got {actual} {currency}")]
    AmountMismatch {
        /// Base + tax + tip.
        expected: i64,
        /// Amount actually charged.
        actual: i64,
        /// Payment currency.
        currency: Currency,
    },

    /// Declared tax differs from the computed tax.
    #[error("Tax amount mismatch: expected {expected}, got {actual}")]
    TaxMismatch {
        /// Computed tax.
        expected: i64,
        /// Tax declared by the caller.
        actual: i64,
    },

    /// Fees and tax add up to more than the gross amount.
    #[error("Fees of {fees} exceed the gross amount of {gross}")]
    FeesExceedGross {
        /// Sum of tax, tip and fees borne by the recipient.
        fees: i64,
        /// Gross amount.
        gross: i64,
    },

    /// An intermediate sum left the `i64` range.
    #[error("Amount overflow while computing {0}")]
    Overflow(&'static str),

    /// Percentage outside 0..=100.
    #[error("Invalid fee percent: {0}")]
    InvalidPercent(Decimal),

    /// Processor fee reported in a currency that is neither the payment nor the host currency.
    #[error("Processor fee currency {actual} matches neither {payment} nor {host}")]
    CurrencyMismatch {
        /// Currency of the fee.
        actual: Currency,
        /// Payment currency.
        payment: Currency,
        /// Host currency.
        host: Currency,
    },

    // ========== Tax Errors ==========
    /// Tax id does not have the expected format.
    #[error("Invalid {tax_type} number {tax_id}: {reason}")]
    InvalidTaxId {
        /// Tax regime.
        tax_type: TaxType,
        /// Tax id as given.
        tax_id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A country needed to pick a tax rate is missing.
    #[error("Missing {party} country required for {tax_type}")]
    MissingCountry {
        /// Which party's country is missing (`payer`, `origin`).
        party: &'static str,
        /// Tax regime.
        tax_type: TaxType,
    },

    /// Country code is not two ASCII letters.
    #[error("Invalid country code: {0}")]
    InvalidCountry(String),

    /// The tax regime does not apply to the origin country.
    #[error("{tax_type} cannot be applied from {country}")]
    UnsupportedTaxOrigin {
        /// Tax regime.
        tax_type: TaxType,
        /// Origin country.
        country: String,
    },

    // ========== Conversion Errors ==========
    /// Host currency conversion failed.
    #[error(transparent)]
    Currency(#[from] CurrencyError),
}

impl FeeError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::InvalidPlatformTip { .. } => "INVALID_PLATFORM_TIP",
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::TaxMismatch { .. } => "TAX_MISMATCH",
            Self::FeesExceedGross { .. } => "FEES_EXCEED_GROSS",
            Self::Overflow(_) => "AMOUNT_OVERFLOW",
            Self::InvalidPercent(_) => "INVALID_FEE_PERCENT",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::InvalidTaxId { .. } => "INVALID_TAX_ID",
            Self::MissingCountry { .. } => "MISSING_COUNTRY",
            Self::InvalidCountry(_) => "INVALID_COUNTRY",
            Self::UnsupportedTaxOrigin { .. } => "UNSUPPORTED_TAX_ORIGIN",
            Self::Currency(err) => err.error_code(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Currency(err) => err.http_status_code(),
            _ => 400,
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Currency(err) => err.category(),
            _ => ErrorCategory::Validation,
        }
    }

    /// Returns true if retrying may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Currency(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<FeeError> for AppError {
    fn from(err: FeeError) -> Self {
        match err {
            FeeError::Currency(inner) => inner.into(),
            other => Self::Validation(other.to_string()),
        }
    }
}
