//! Processor error type.

use fiscalhost_shared::{AppError, ErrorCategory};
use thiserror::Error;

/// Failure reported by the payment processor.
///
/// `Display` only shows the sanitized message. The raw payload never leaves
/// the process through error text.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProcessorError {
    message: String,
    code: Option<String>,
    payload: serde_json::Value,
    retryable: bool,
}

impl ProcessorError {
    /// Creates an error with a user-safe message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            payload: serde_json::Value::Null,
            retryable: false,
        }
    }

    /// Attaches the processor's error code (e.g. `card_declined`).
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attaches the raw processor response.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Marks the failure as transient.
    #[must_use]
    pub const fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// Returns the sanitized message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the processor's error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Returns the raw processor payload.
    #[must_use]
    pub const fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Returns true if the charge may succeed when retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        "PROCESSOR_ERROR"
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        502
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        ErrorCategory::Processor
    }
}

impl From<ProcessorError> for AppError {
    fn from(err: ProcessorError) -> Self {
        Self::Processor(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_hides_payload() {
        let err = ProcessorError::new("Your card was declined.")
            .with_code("card_declined")
            .with_payload(json!({"secret": "sk_live_123", "decline_code": "insufficient_funds"}));

        assert_eq!(err.to_string(), "Your card was declined.");
        assert!(!err.to_string().contains("sk_live"));
        assert_eq!(err.code(), Some("card_declined"));
        assert_eq!(err.payload()["decline_code"], "insufficient_funds");
    }

    #[test]
    fn test_retryable_flag() {
        assert!(!ProcessorError::new("declined").is_retryable());
        assert!(ProcessorError::new("timeout").retryable().is_retryable());
    }

    #[test]
    fn test_into_app_error() {
        let app: AppError = ProcessorError::new("declined").with_payload(json!({"raw": 1})).into();
        assert_eq!(app.status_code(), 502);
        assert_eq!(app.to_string(), "Payment processor error: declined");
    }
}
