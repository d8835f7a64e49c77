//! Settlement tracker.

use std::sync::Arc;

use chrono::Utc;
use fiscalhost_shared::types::{AccountId, ExpenseId, TransactionGroupId};
use tracing::info;

use super::types::{Settlement, SettlementStatus, SettlementTransition};
use crate::events::{EventBus, LedgerEvent};
use crate::ledger::{LedgerCommit, LedgerError, LedgerStore, Transaction, TransactionKind};

/// Looks up and advances settlements.
#[derive(Clone)]
pub struct SettlementTracker {
    store: Arc<dyn LedgerStore>,
    events: EventBus,
}

impl SettlementTracker {
    /// Creates a tracker over the ledger store.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Returns the settlement of a debt leg, creating an OWED one if missing.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` if the leg is not a PLATFORM_TIP_DEBT leg
    /// - `LedgerError::Store` on storage failure
    pub async fn get_by_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Settlement, LedgerError> {
        if transaction.kind != TransactionKind::PlatformTipDebt {
            return Err(LedgerError::Validation(format!(
                "Transaction {} is {}, only PLATFORM_TIP_DEBT is settled",
                transaction.id, transaction.kind
            )));
        }

        if let Some(existing) = self
            .store
            .find_settlement(transaction.transaction_group, transaction.kind)
            .await?
        {
            return Ok(existing);
        }

        let candidate = Settlement::owed(
            transaction.transaction_group,
            transaction.kind,
            transaction.host_account_id,
            Utc::now(),
        );
        let candidate_id = candidate.id;
        let stored = self.store.insert_settlement(candidate).await?;

        // Another caller may have inserted first; only announce our own row
        if stored.id == candidate_id {
            info!(group = %stored.transaction_group, "Opened settlement");
            self.events
                .publish(LedgerEvent::SettlementChanged {
                    settlement_id: stored.id,
                    transaction_group: stored.transaction_group,
                    from: None,
                    to: stored.status,
                })
                .await;
        }

        Ok(stored)
    }

    /// Marks the debts of `groups` as invoiced by `expense`.
    ///
    /// All groups change together or none does.
    ///
    /// # Errors
    ///
    /// - `LedgerError::GroupNotFound` if a group has no settlement
    /// - `LedgerError::SettlementConflict` if a settlement is not OWED
    pub async fn mark_invoiced(
        &self,
        groups: &[TransactionGroupId],
        expense: ExpenseId,
    ) -> Result<Vec<Settlement>, LedgerError> {
        self.transition(groups, SettlementStatus::Invoiced, Some(expense))
            .await
    }

    /// Marks the debts of `groups` as settled.
    ///
    /// # Errors
    ///
    /// - `LedgerError::GroupNotFound` if a group has no settlement
    /// - `LedgerError::SettlementConflict` if a settlement is not INVOICED
    pub async fn mark_settled(
        &self,
        groups: &[TransactionGroupId],
    ) -> Result<Vec<Settlement>, LedgerError> {
        self.transition(groups, SettlementStatus::Settled, None).await
    }

    /// Lists the debts a host still owes.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` on storage failure.
    pub async fn list_owed(&self, host: AccountId) -> Result<Vec<Settlement>, LedgerError> {
        self.store.list_settlements(host, SettlementStatus::Owed).await
    }

    async fn transition(
        &self,
        groups: &[TransactionGroupId],
        to: SettlementStatus,
        expense_id: Option<ExpenseId>,
    ) -> Result<Vec<Settlement>, LedgerError> {
        let mut settlements = Vec::with_capacity(groups.len());
        for &group in groups {
            let settlement = self
                .store
                .find_settlement(group, TransactionKind::PlatformTipDebt)
                .await?
                .ok_or(LedgerError::GroupNotFound(group))?;
            if !settlement.status.can_transition_to(to) {
                return Err(LedgerError::SettlementConflict {
                    expected: expected_before(to),
                    actual: settlement.status,
                });
            }
            settlements.push(settlement);
        }

        let transitions = settlements
            .iter()
            .map(|s| SettlementTransition {
                settlement_id: s.id,
                from: s.status,
                to,
                expense_id: expense_id.or(s.expense_id),
            })
            .collect();
        self.store
            .commit(LedgerCommit {
                settlement_transitions: transitions,
                ..LedgerCommit::default()
            })
            .await?;

        let now = Utc::now();
        let mut updated = Vec::with_capacity(settlements.len());
        for mut settlement in settlements {
            let from = settlement.status;
            settlement.status = to;
            settlement.expense_id = expense_id.or(settlement.expense_id);
            settlement.updated_at = now;

            info!(group = %settlement.transaction_group, %from, %to, "Settlement changed");
            self.events
                .publish(LedgerEvent::SettlementChanged {
                    settlement_id: settlement.id,
                    transaction_group: settlement.transaction_group,
                    from: Some(from),
                    to,
                })
                .await;
            updated.push(settlement);
        }

        Ok(updated)
    }
}

const fn expected_before(to: SettlementStatus) -> SettlementStatus {
    match to {
        SettlementStatus::Owed | SettlementStatus::Invoiced => SettlementStatus::Owed,
        SettlementStatus::Settled => SettlementStatus::Invoiced,
    }
}
