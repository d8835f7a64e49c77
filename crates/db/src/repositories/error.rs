//! Repository error type and its conversions into the core store errors.

use fiscalhost_core::billing::BillingError;
use fiscalhost_core::currency::CurrencyError;
use fiscalhost_core::ledger::LedgerError;
use sea_orm::DbErr;

/// Errors raised while reading or writing rows.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// A stored value does not map onto the domain type.
    #[error("Invalid {column} in {table}: {message}")]
    InvalidColumn {
        /// Table name.
        table: &'static str,
        /// Column name.
        column: &'static str,
        /// What was wrong with the value.
        message: String,
    },

    /// A JSON column could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepositoryError {
    pub(crate) fn invalid(table: &'static str, column: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidColumn {
            table,
            column,
            message: message.into(),
        }
    }
}

impl From<RepositoryError> for LedgerError {
    fn from(err: RepositoryError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<RepositoryError> for BillingError {
    fn from(err: RepositoryError) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<RepositoryError> for CurrencyError {
    fn from(err: RepositoryError) -> Self {
        Self::Provider(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_keep_the_message() {
        let err = RepositoryError::invalid("transactions", "kind", "Unknown transaction kind: FEE");
        let ledger = LedgerError::from(err);
        assert_eq!(
            ledger.to_string(),
            "Storage error: Invalid kind in transactions: Unknown transaction kind: FEE"
        );
        assert!(ledger.is_retryable());
    }

    #[test]
    fn test_provider_error_is_retryable() {
        let err = CurrencyError::from(RepositoryError::Database(DbErr::Custom("timeout".into())));
        assert!(err.is_retryable());
    }
}
