//! In-memory ledger store.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use fiscalhost_shared::types::{
    AccountId, PageRequest, PageResponse, SettlementId, TransactionGroupId, TransactionId,
};
use tokio::sync::RwLock;

use crate::ledger::{LedgerCommit, LedgerError, LedgerStore, Linkage, Transaction, TransactionKind};
use crate::settlement::{Settlement, SettlementStatus};

#[derive(Default)]
struct State {
    transactions: Vec<Transaction>,
    settlements: Vec<Settlement>,
}

/// Ledger store holding legs and settlements in memory.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
    failing_on: Option<TransactionKind>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every commit containing a leg of `kind` fail without writing.
    #[must_use]
    pub const fn failing_on(mut self, kind: TransactionKind) -> Self {
        self.failing_on = Some(kind);
        self
    }

    /// Returns every stored leg in insertion order.
    pub async fn transactions(&self) -> Vec<Transaction> {
        self.state.read().await.transactions.clone()
    }

    /// Returns every stored settlement.
    pub async fn settlements(&self) -> Vec<Settlement> {
        self.state.read().await.settlements.clone()
    }
}

impl State {
    fn refunded(&self, id: TransactionId) -> bool {
        self.transactions
            .iter()
            .any(|leg| leg.refund_transaction_id == Some(id))
    }

    fn check(&self, commit: &LedgerCommit) -> Result<(), LedgerError> {
        for id in &commit.refund_guard {
            if self.refunded(*id) {
                return Err(LedgerError::AlreadyRefunded(*id));
            }
        }

        let mut back_refs = HashSet::new();
        for leg in &commit.transactions {
            if let Some(original) = leg.refund_transaction_id {
                if self.refunded(original) || !back_refs.insert(original) {
                    return Err(LedgerError::AlreadyRefunded(original));
                }
            }
        }

        for transition in &commit.settlement_transitions {
            let current = self
                .settlements
                .iter()
                .find(|s| s.id == transition.settlement_id)
                .ok_or_else(|| {
                    LedgerError::Store(format!("Settlement {} not found", transition.settlement_id))
                })?;
            if current.status != transition.from {
                return Err(LedgerError::SettlementConflict {
                    expected: transition.from,
                    actual: current.status,
                });
            }
        }

        for settlement in &commit.new_settlements {
            if self.settlement_for(settlement.transaction_group, settlement.kind).is_some() {
                return Err(LedgerError::Store(format!(
                    "Duplicate settlement for group {}",
                    settlement.transaction_group
                )));
            }
        }
        Ok(())
    }

    fn settlement_for(&self, group: TransactionGroupId, kind: TransactionKind) -> Option<&Settlement> {
        self.settlements
            .iter()
            .find(|s| s.transaction_group == group && s.kind == kind)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn commit(&self, commit: LedgerCommit) -> Result<(), LedgerError> {
        if let Some(kind) = self.failing_on {
            if commit.transactions.iter().any(|leg| leg.kind == kind) {
                return Err(LedgerError::Store(format!(
                    "Failed to insert {} leg",
                    kind.as_str()
                )));
            }
        }

        let mut state = self.state.write().await;
        state.check(&commit)?;

        let now = Utc::now();
        for transition in commit.settlement_transitions {
            if let Some(settlement) = state
                .settlements
                .iter_mut()
                .find(|s| s.id == transition.settlement_id)
            {
                settlement.status = transition.to;
                if transition.expense_id.is_some() {
                    settlement.expense_id = transition.expense_id;
                }
                settlement.updated_at = now;
            }
        }
        state.settlements.extend(commit.new_settlements);
        state.transactions.extend(commit.transactions);
        Ok(())
    }

    async fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.transactions.iter().find(|leg| leg.id == id).cloned())
    }

    async fn find_by_group(&self, group: TransactionGroupId) -> Result<Vec<Transaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .filter(|leg| leg.transaction_group == group)
            .cloned()
            .collect())
    }

    async fn find_by_linkage(&self, linkage: Linkage) -> Result<Vec<Transaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .filter(|leg| leg.linkage == linkage)
            .cloned()
            .collect())
    }

    async fn find_by_account(
        &self,
        account: AccountId,
        page: PageRequest,
    ) -> Result<PageResponse<Transaction>, LedgerError> {
        let state = self.state.read().await;
        // Insertion order breaks ties between legs created in the same instant
        let mut owned: Vec<(usize, &Transaction)> = state
            .transactions
            .iter()
            .enumerate()
            .filter(|(_, leg)| leg.to_account_id == account)
            .collect();
        owned.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));

        let total = owned.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        let data = owned
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, leg)| leg.clone())
            .collect();
        Ok(PageResponse::new(data, page, total))
    }

    async fn find_refunds_of(&self, ids: &[TransactionId]) -> Result<Vec<Transaction>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .filter(|leg| leg.refund_transaction_id.is_some_and(|id| ids.contains(&id)))
            .cloned()
            .collect())
    }

    async fn sum_for_account(&self, account: AccountId) -> Result<i64, LedgerError> {
        let state = self.state.read().await;
        state
            .transactions
            .iter()
            .filter(|leg| leg.to_account_id == account)
            .try_fold(0_i64, |sum, leg| sum.checked_add(leg.amount_in_host_currency))
            .ok_or_else(|| LedgerError::Internal(format!("Balance overflow for account {account}")))
    }

    async fn find_settlement(
        &self,
        group: TransactionGroupId,
        kind: TransactionKind,
    ) -> Result<Option<Settlement>, LedgerError> {
        Ok(self.state.read().await.settlement_for(group, kind).cloned())
    }

    async fn find_settlement_by_id(&self, id: SettlementId) -> Result<Option<Settlement>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.settlements.iter().find(|s| s.id == id).cloned())
    }

    async fn insert_settlement(&self, settlement: Settlement) -> Result<Settlement, LedgerError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.settlement_for(settlement.transaction_group, settlement.kind) {
            return Ok(existing.clone());
        }
        state.settlements.push(settlement.clone());
        Ok(settlement)
    }

    async fn list_settlements(
        &self,
        host: AccountId,
        status: SettlementStatus,
    ) -> Result<Vec<Settlement>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .settlements
            .iter()
            .filter(|s| s.host_account_id == host && s.status == status)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{DoubleEntry, PairSpec, TransactionPair};
    use crate::settlement::SettlementTransition;
    use chrono::Duration;
    use fiscalhost_shared::types::{Currency, OrderId};
    use rust_decimal::Decimal;

    fn pair(payer: AccountId, recipient: AccountId, amount: i64, minutes_ago: i64) -> TransactionPair {
        DoubleEntry::from_spec(
            PairSpec {
                kind: TransactionKind::Contribution,
                amount,
                amount_in_host_currency: amount,
                net_amount: amount,
                tax_amount: 0,
                currency: Currency::Usd,
                host_currency: Currency::Usd,
                fx_rate: Decimal::ONE,
                payer,
                recipient,
                host_account_id: AccountId::new(),
                linkage: Linkage::Order(OrderId::new()),
                transaction_group: TransactionGroupId::new(),
                is_refund: false,
                is_debt: false,
                cleared_at: None,
                data: serde_json::Value::Null,
            },
            Utc::now() - Duration::minutes(minutes_ago),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_conflicting_transition_writes_nothing() {
        let store = InMemoryLedgerStore::new();
        let settlement = store
            .insert_settlement(Settlement::owed(
                TransactionGroupId::new(),
                TransactionKind::PlatformTipDebt,
                AccountId::new(),
                Utc::now(),
            ))
            .await
            .unwrap();

        let result = store
            .commit(LedgerCommit {
                transactions: pair(AccountId::new(), AccountId::new(), 100, 0).into_legs().to_vec(),
                settlement_transitions: vec![SettlementTransition {
                    settlement_id: settlement.id,
                    from: SettlementStatus::Invoiced,
                    to: SettlementStatus::Settled,
                    expense_id: None,
                }],
                ..LedgerCommit::default()
            })
            .await;

        assert!(matches!(
            result,
            Err(LedgerError::SettlementConflict {
                expected: SettlementStatus::Invoiced,
                actual: SettlementStatus::Owed,
            })
        ));
        assert!(store.transactions().await.is_empty());
        assert_eq!(store.settlements().await[0].status, SettlementStatus::Owed);
    }

    #[tokio::test]
    async fn test_insert_settlement_keeps_first_row() {
        let store = InMemoryLedgerStore::new();
        let group = TransactionGroupId::new();
        let first = Settlement::owed(group, TransactionKind::PlatformTipDebt, AccountId::new(), Utc::now());
        let second = Settlement::owed(group, TransactionKind::PlatformTipDebt, AccountId::new(), Utc::now());

        store.insert_settlement(first.clone()).await.unwrap();
        let stored = store.insert_settlement(second).await.unwrap();

        assert_eq!(stored.id, first.id);
        assert_eq!(store.settlements().await.len(), 1);
    }

    #[tokio::test]
    async fn test_account_legs_are_paginated_newest_first() {
        let store = InMemoryLedgerStore::new();
        let collective = AccountId::new();
        let payer = AccountId::new();
        for (amount, minutes_ago) in [(100, 30), (200, 20), (300, 10)] {
            store
                .commit(LedgerCommit::transactions(
                    pair(payer, collective, amount, minutes_ago).into_legs().to_vec(),
                ))
                .await
                .unwrap();
        }

        let page = store
            .find_by_account(collective, PageRequest::new(1, 2))
            .await
            .unwrap();

        let amounts: Vec<_> = page.data.iter().map(|leg| leg.amount).collect();
        assert_eq!(amounts, vec![300, 200]);
        assert_eq!(page.meta.total, 3);
        assert_eq!(page.meta.total_pages, 2);
        assert_eq!(store.sum_for_account(collective).await.unwrap(), 600);
        assert_eq!(store.sum_for_account(payer).await.unwrap(), -600);
    }
}
