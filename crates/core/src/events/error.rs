//! Event delivery errors.

use fiscalhost_shared::{AppError, ErrorCategory};
use thiserror::Error;

/// Failure of a subscriber or notification channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    /// A subscriber could not handle an event.
    #[error("Subscriber {subscriber} failed: {message}")]
    Subscriber {
        /// Subscriber name.
        subscriber: String,
        /// Failure detail.
        message: String,
    },

    /// The notification channel rejected a message.
    #[error("Notification {template} failed: {message}")]
    Notification {
        /// Template key.
        template: String,
        /// Failure detail.
        message: String,
    },
}

impl EventError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Subscriber { .. } => "SUBSCRIBER_FAILED",
            Self::Notification { .. } => "NOTIFICATION_FAILED",
        }
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        500
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        ErrorCategory::Infrastructure
    }

    /// Delivery failures are worth retrying by whoever owns the channel.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        true
    }
}

impl From<EventError> for AppError {
    fn from(err: EventError) -> Self {
        Self::Internal(err.to_string())
    }
}
