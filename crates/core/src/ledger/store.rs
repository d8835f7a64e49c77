//! Ledger persistence boundary.

use async_trait::async_trait;
use fiscalhost_shared::types::{
    AccountId, PageRequest, PageResponse, SettlementId, TransactionGroupId, TransactionId,
};

use super::error::LedgerError;
use super::types::{Linkage, Transaction, TransactionKind};
use crate::settlement::{Settlement, SettlementStatus, SettlementTransition};

/// Everything written for one monetary event, applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct LedgerCommit {
    /// New legs.
    pub transactions: Vec<Transaction>,
    /// New settlement rows.
    pub new_settlements: Vec<Settlement>,
    /// Settlement status changes, each conditional on the current status.
    pub settlement_transitions: Vec<SettlementTransition>,
    /// Legs that must not have been refunded yet when the commit applies.
    pub refund_guard: Vec<TransactionId>,
}

impl LedgerCommit {
    /// A commit that only writes legs.
    #[must_use]
    pub fn transactions(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            ..Self::default()
        }
    }
}

/// Storage for transaction legs and settlements.
///
/// `commit` is the unit of work: either every leg, settlement row and
/// transition in the commit is persisted, or none is.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persists a commit atomically.
    ///
    /// # Errors
    ///
    /// - `LedgerError::AlreadyRefunded` if a guarded leg gained a refund
    /// - `LedgerError::SettlementConflict` if a transition's `from` no longer matches
    /// - `LedgerError::Store` on storage failure; nothing is written
    async fn commit(&self, commit: LedgerCommit) -> Result<(), LedgerError>;

    /// Finds a leg by id.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    async fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError>;

    /// Lists the legs of a group.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    async fn find_by_group(&self, group: TransactionGroupId) -> Result<Vec<Transaction>, LedgerError>;

    /// Lists the legs linked to an order or expense.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    async fn find_by_linkage(&self, linkage: Linkage) -> Result<Vec<Transaction>, LedgerError>;

    /// Lists the legs owned by an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    async fn find_by_account(
        &self,
        account: AccountId,
        page: PageRequest,
    ) -> Result<PageResponse<Transaction>, LedgerError>;

    /// Lists refund legs pointing at any of the given legs.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    async fn find_refunds_of(&self, ids: &[TransactionId]) -> Result<Vec<Transaction>, LedgerError>;

    /// Sums `amount_in_host_currency` over the legs owned by an account.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    async fn sum_for_account(&self, account: AccountId) -> Result<i64, LedgerError>;

    /// Finds the settlement of a group's debt pair.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    async fn find_settlement(
        &self,
        group: TransactionGroupId,
        kind: TransactionKind,
    ) -> Result<Option<Settlement>, LedgerError>;

    /// Finds a settlement by id.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    async fn find_settlement_by_id(&self, id: SettlementId) -> Result<Option<Settlement>, LedgerError>;

    /// Inserts a settlement unless one exists for its (group, kind); returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    async fn insert_settlement(&self, settlement: Settlement) -> Result<Settlement, LedgerError>;

    /// Lists a host's settlements in a status.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    async fn list_settlements(
        &self,
        host: AccountId,
        status: SettlementStatus,
    ) -> Result<Vec<Settlement>, LedgerError>;
}
