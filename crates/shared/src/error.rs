//! Application-wide error types.
//!
//! Module errors (ledger, fees, refunds, billing) convert into `AppError`
//! so the surrounding API layer has one taxonomy to render.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Broad classes of failure shared by every module error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Caller must correct the input; nothing was persisted.
    Validation,
    /// The paying account cannot cover the amount.
    InsufficientFunds,
    /// A referenced record does not exist.
    NotFound,
    /// The operation contradicts current state (double refund, inactive subscription).
    Consistency,
    /// The payment processor failed.
    Processor,
    /// Storage or another internal dependency failed.
    Infrastructure,
}

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Input failed validation; nothing was persisted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The paying account cannot cover the requested amount.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation conflicts with current state (e.g., already refunded).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payment processor failure. The message is already sanitized.
    #[error("Payment processor error: {0}")]
    Processor(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::InsufficientFunds(_) => 402,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Processor(_) => 502,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InsufficientFunds(_) => "INSUFFICIENT_FUNDS",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Processor(_) => "PROCESSOR_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::InsufficientFunds(_) => ErrorCategory::InsufficientFunds,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Conflict(_) => ErrorCategory::Consistency,
            Self::Processor(_) => ErrorCategory::Processor,
            Self::Database(_) | Self::Internal(_) => ErrorCategory::Infrastructure,
        }
    }
}
