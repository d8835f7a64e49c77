//! Ledger error types for validation, consistency and storage errors.
//!
//! This module defines the errors raised while writing or reversing
//! transaction groups, including the fee, currency and processor failures
//! that abort a write before anything is persisted.

use fiscalhost_shared::types::{AccountId, Currency, TransactionGroupId, TransactionId};
use fiscalhost_shared::{AppError, ErrorCategory};
use thiserror::Error;

use super::types::TransactionKind;
use crate::currency::CurrencyError;
use crate::fees::FeeError;
use crate::payment::ProcessorError;
use crate::settlement::SettlementStatus;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Pair amount must be positive.
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(i64),

    /// The two legs of a pair do not sum to zero.
    #[error("Unbalanced {kind} pair in group {group}: credit {credit}, debit {debit}")]
    UnbalancedPair {
        /// Transaction group.
        group: TransactionGroupId,
        /// Pair kind.
        kind: TransactionKind,
        /// Credit leg amount.
        credit: i64,
        /// Debit leg amount.
        debit: i64,
    },

    /// A leg has no counterpart, or more than one.
    #[error("Transaction {transaction} has {found} counterparts, expected exactly 1")]
    CounterpartMismatch {
        /// Offending leg.
        transaction: TransactionId,
        /// Counterparts found.
        found: usize,
    },

    /// A leg's sign does not match its entry type.
    #[error("Transaction {0} has an amount sign inconsistent with its type")]
    SignMismatch(TransactionId),

    /// Refund request is malformed.
    #[error("Invalid refund: {0}")]
    InvalidRefund(String),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Fee or tax decomposition failed.
    #[error(transparent)]
    Fee(#[from] FeeError),

    /// Currency conversion failed.
    #[error(transparent)]
    Currency(#[from] CurrencyError),

    // ========== Funds Errors ==========
    /// The paying account cannot cover the amount.
    #[error("Insufficient funds in {account}: available {available} {currency}, required {required} {currency}")]
    InsufficientFunds {
        /// Paying account.
        account: AccountId,
        /// Derived balance.
        available: i64,
        /// Amount needed.
        required: i64,
        /// Currency of both figures.
        currency: Currency,
    },

    // ========== Not Found Errors ==========
    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Transaction group not found.
    #[error("Transaction group not found: {0}")]
    GroupNotFound(TransactionGroupId),

    // ========== Consistency Errors ==========
    /// The leg already has a refund.
    #[error("Transaction {0} has already been refunded")]
    AlreadyRefunded(TransactionId),

    /// Refund legs cannot themselves be refunded.
    #[error("Transaction {0} is a refund and cannot be refunded")]
    RefundOfRefund(TransactionId),

    /// Entity is not in a state that allows the operation.
    #[error("Cannot {operation} {entity} in status {status}")]
    InvalidState {
        /// Entity type (`order`, `expense`).
        entity: &'static str,
        /// Current status.
        status: String,
        /// Attempted operation.
        operation: &'static str,
    },

    /// A settlement changed status concurrently or the transition is not allowed.
    #[error("Settlement status conflict: expected {expected}, found {actual}")]
    SettlementConflict {
        /// Status required by the transition.
        expected: SettlementStatus,
        /// Status found.
        actual: SettlementStatus,
    },

    // ========== External Errors ==========
    /// The payment processor failed.
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    /// Storage failure.
    #[error("Storage error: {0}")]
    Store(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::UnbalancedPair { .. } => "UNBALANCED_PAIR",
            Self::CounterpartMismatch { .. } => "COUNTERPART_MISMATCH",
            Self::SignMismatch(_) => "SIGN_MISMATCH",
            Self::InvalidRefund(_) => "INVALID_REFUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Fee(err) => err.error_code(),
            Self::Currency(err) => err.error_code(),
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::GroupNotFound(_) => "TRANSACTION_GROUP_NOT_FOUND",
            Self::AlreadyRefunded(_) => "ALREADY_REFUNDED",
            Self::RefundOfRefund(_) => "REFUND_OF_REFUND",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::SettlementConflict { .. } => "SETTLEMENT_CONFLICT",
            Self::Processor(err) => err.error_code(),
            Self::Store(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::InvalidAmount(_)
            | Self::UnbalancedPair { .. }
            | Self::CounterpartMismatch { .. }
            | Self::SignMismatch(_)
            | Self::InvalidRefund(_)
            | Self::Validation(_) => 400,
            Self::Fee(err) => err.http_status_code(),
            Self::Currency(err) => err.http_status_code(),

            // 402 Payment Required
            Self::InsufficientFunds { .. } => 402,

            // 404 Not Found
            Self::TransactionNotFound(_) | Self::GroupNotFound(_) => 404,

            // 409 Conflict - consistency errors
            Self::AlreadyRefunded(_)
            | Self::RefundOfRefund(_)
            | Self::InvalidState { .. }
            | Self::SettlementConflict { .. } => 409,

            // 502 Bad Gateway
            Self::Processor(_) => 502,

            // 500 Internal Server Error
            Self::Store(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAmount(_)
            | Self::UnbalancedPair { .. }
            | Self::CounterpartMismatch { .. }
            | Self::SignMismatch(_)
            | Self::InvalidRefund(_)
            | Self::Validation(_) => ErrorCategory::Validation,
            Self::Fee(err) => err.category(),
            Self::Currency(err) => err.category(),
            Self::InsufficientFunds { .. } => ErrorCategory::InsufficientFunds,
            Self::TransactionNotFound(_) | Self::GroupNotFound(_) => ErrorCategory::NotFound,
            Self::AlreadyRefunded(_)
            | Self::RefundOfRefund(_)
            | Self::InvalidState { .. }
            | Self::SettlementConflict { .. } => ErrorCategory::Consistency,
            Self::Processor(_) => ErrorCategory::Processor,
            Self::Store(_) | Self::Internal(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Returns true if the operation may succeed when retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Processor(err) => err.is_retryable(),
            Self::Currency(err) => err.is_retryable(),
            Self::Store(_) => true,
            _ => false,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Fee(inner) => inner.into(),
            LedgerError::Currency(inner) => inner.into(),
            LedgerError::Processor(inner) => inner.into(),
            LedgerError::Store(msg) => Self::Database(msg),
            LedgerError::Internal(msg) => Self::Internal(msg),
            other => match other.category() {
                ErrorCategory::InsufficientFunds => Self::InsufficientFunds(other.to_string()),
                ErrorCategory::NotFound => Self::NotFound(other.to_string()),
                ErrorCategory::Consistency => Self::Conflict(other.to_string()),
                _ => Self::Validation(other.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let id = TransactionId::new();
        assert_eq!(LedgerError::AlreadyRefunded(id).error_code(), "ALREADY_REFUNDED");
        assert_eq!(LedgerError::InvalidAmount(0).error_code(), "INVALID_AMOUNT");
        assert_eq!(
            LedgerError::Fee(FeeError::NonPositiveAmount(0)).error_code(),
            "NON_POSITIVE_AMOUNT"
        );
    }

    #[test]
    fn test_http_status_codes() {
        let id = TransactionId::new();
        assert_eq!(LedgerError::InvalidAmount(-5).http_status_code(), 400);
        assert_eq!(LedgerError::TransactionNotFound(id).http_status_code(), 404);
        assert_eq!(LedgerError::AlreadyRefunded(id).http_status_code(), 409);
        assert_eq!(
            LedgerError::Processor(ProcessorError::new("declined")).http_status_code(),
            502
        );
        assert_eq!(LedgerError::Store("down".into()).http_status_code(), 500);
    }

    #[test]
    fn test_categories() {
        let id = TransactionId::new();
        assert_eq!(LedgerError::AlreadyRefunded(id).category(), ErrorCategory::Consistency);
        assert_eq!(
            LedgerError::InsufficientFunds {
                account: AccountId::new(),
                available: 100,
                required: 200,
                currency: Currency::Usd,
            }
            .category(),
            ErrorCategory::InsufficientFunds
        );
        assert_eq!(
            LedgerError::Fee(FeeError::NonPositiveAmount(0)).category(),
            ErrorCategory::Validation
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(LedgerError::Store("timeout".into()).is_retryable());
        assert!(!LedgerError::AlreadyRefunded(TransactionId::new()).is_retryable());
        assert!(LedgerError::Processor(ProcessorError::new("timeout").retryable()).is_retryable());
    }

    #[test]
    fn test_into_app_error() {
        let app: AppError = LedgerError::AlreadyRefunded(TransactionId::new()).into();
        assert_eq!(app.status_code(), 409);

        let app: AppError = LedgerError::InsufficientFunds {
            account: AccountId::new(),
            available: 0,
            required: 1,
            currency: Currency::Eur,
        }
        .into();
        assert_eq!(app.error_code(), "INSUFFICIENT_FUNDS");
    }
}
