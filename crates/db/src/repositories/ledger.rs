//! Ledger repository: transaction legs and settlements on PostgreSQL.
//!
//! A `LedgerCommit` runs inside one database transaction. Settlement
//! transitions are conditional updates on the expected status, and the
//! partial unique index on `refund_transaction_id` backs the refund guard
//! against concurrent refunds of the same leg.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fiscalhost_core::ledger::{LedgerCommit, LedgerError, LedgerStore, Linkage, Transaction, TransactionKind};
use fiscalhost_core::settlement::{Settlement, SettlementStatus, SettlementTransition};
use fiscalhost_shared::types::{
    AccountId, PageRequest, PageResponse, SettlementId, TransactionGroupId, TransactionId,
};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::RepositoryError;
use super::mapping::{
    parse, settlement_active_model, settlement_from_model, transaction_active_model,
    transaction_from_model,
};
use crate::entities::{transaction_settlements, transactions};

const REFUND_INDEX: &str = "uq_transactions_refund_transaction_id";
const SETTLEMENT_INDEX: &str = "uq_settlements_group_kind";

fn store_error(err: DbErr) -> LedgerError {
    RepositoryError::from(err).into()
}

/// Ledger repository implementing `LedgerStore`.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn check_refund_guard(
        txn: &DatabaseTransaction,
        guard: &[TransactionId],
    ) -> Result<(), LedgerError> {
        if guard.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = guard.iter().map(|id| id.into_inner()).collect();
        let existing = transactions::Entity::find()
            .filter(transactions::Column::RefundTransactionId.is_in(ids))
            .one(txn)
            .await
            .map_err(store_error)?;

        match existing.and_then(|leg| leg.refund_transaction_id) {
            Some(original) => Err(LedgerError::AlreadyRefunded(TransactionId::from_uuid(original))),
            None => Ok(()),
        }
    }

    async fn apply_transition(
        txn: &DatabaseTransaction,
        transition: &SettlementTransition,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let id = transition.settlement_id.into_inner();

        let mut update = transaction_settlements::Entity::update_many()
            .col_expr(
                transaction_settlements::Column::Status,
                Expr::value(transition.to.as_str()),
            )
            .col_expr(transaction_settlements::Column::UpdatedAt, Expr::value(now))
            .filter(transaction_settlements::Column::Id.eq(id))
            .filter(transaction_settlements::Column::Status.eq(transition.from.as_str()));
        if let Some(expense) = transition.expense_id {
            update = update.col_expr(
                transaction_settlements::Column::ExpenseId,
                Expr::value(expense.into_inner()),
            );
        }

        let result = update.exec(txn).await.map_err(store_error)?;
        if result.rows_affected > 0 {
            return Ok(());
        }

        // Nothing matched: either the row is gone or its status moved on
        let current = transaction_settlements::Entity::find_by_id(id)
            .one(txn)
            .await
            .map_err(store_error)?
            .ok_or_else(|| {
                LedgerError::Store(format!("Settlement {} not found", transition.settlement_id))
            })?;
        let actual: SettlementStatus =
            parse("transaction_settlements", "status", &current.status)?;
        Err(LedgerError::SettlementConflict {
            expected: transition.from,
            actual,
        })
    }

    fn insert_error(err: DbErr, commit: &LedgerCommit) -> LedgerError {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            if detail.contains(REFUND_INDEX) {
                if let Some(original) = commit
                    .transactions
                    .iter()
                    .find_map(|leg| leg.refund_transaction_id)
                {
                    warn!(
                        refunded = %original,
                        "Concurrent refund lost the race on the refund index"
                    );
                    return LedgerError::AlreadyRefunded(original);
                }
            }
            if detail.contains(SETTLEMENT_INDEX) {
                return LedgerError::Store(format!("Duplicate settlement: {detail}"));
            }
        }
        store_error(err)
    }

    async fn find_legs(
        &self,
        filter: Condition,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let rows = transactions::Entity::find()
            .filter(filter)
            .order_by_asc(transactions::Column::CreatedAt)
            .order_by_asc(transactions::Column::Id)
            .all(&self.db)
            .await
            .map_err(store_error)?;

        rows.into_iter()
            .map(|row| transaction_from_model(row).map_err(LedgerError::from))
            .collect()
    }
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    async fn commit(&self, commit: LedgerCommit) -> Result<(), LedgerError> {
        let txn = self.db.begin().await.map_err(store_error)?;

        Self::check_refund_guard(&txn, &commit.refund_guard).await?;

        let now = Utc::now();
        for transition in &commit.settlement_transitions {
            Self::apply_transition(&txn, transition, now).await?;
        }

        if !commit.new_settlements.is_empty() {
            let rows: Vec<_> = commit.new_settlements.iter().map(settlement_active_model).collect();
            transaction_settlements::Entity::insert_many(rows)
                .exec_without_returning(&txn)
                .await
                .map_err(|err| Self::insert_error(err, &commit))?;
        }

        if !commit.transactions.is_empty() {
            let rows: Vec<_> = commit.transactions.iter().map(transaction_active_model).collect();
            transactions::Entity::insert_many(rows)
                .exec_without_returning(&txn)
                .await
                .map_err(|err| Self::insert_error(err, &commit))?;
        }

        // Deferred pair-balance checks run here
        txn.commit().await.map_err(store_error)?;

        debug!(
            legs = commit.transactions.len(),
            settlements = commit.new_settlements.len(),
            transitions = commit.settlement_transitions.len(),
            "Ledger commit applied"
        );
        Ok(())
    }

    async fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        let row = transactions::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_error)?;
        Ok(row.map(transaction_from_model).transpose()?)
    }

    async fn find_by_group(&self, group: TransactionGroupId) -> Result<Vec<Transaction>, LedgerError> {
        self.find_legs(
            Condition::all()
                .add(transactions::Column::TransactionGroup.eq(group.into_inner())),
        )
        .await
    }

    async fn find_by_linkage(&self, linkage: Linkage) -> Result<Vec<Transaction>, LedgerError> {
        let condition = match linkage {
            Linkage::Order(order) => transactions::Column::OrderId.eq(order.into_inner()),
            Linkage::Expense(expense) => transactions::Column::ExpenseId.eq(expense.into_inner()),
        };
        self.find_legs(Condition::all().add(condition)).await
    }

    async fn find_by_account(
        &self,
        account: AccountId,
        page: PageRequest,
    ) -> Result<PageResponse<Transaction>, LedgerError> {
        let query = transactions::Entity::find()
            .filter(transactions::Column::ToAccountId.eq(account.into_inner()));

        let total = query.clone().count(&self.db).await.map_err(store_error)?;
        let rows = query
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_desc(transactions::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(store_error)?;

        let data = rows
            .into_iter()
            .map(transaction_from_model)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PageResponse::new(data, page, total))
    }

    async fn find_refunds_of(&self, ids: &[TransactionId]) -> Result<Vec<Transaction>, LedgerError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| id.into_inner()).collect();
        self.find_legs(
            Condition::all().add(transactions::Column::RefundTransactionId.is_in(ids)),
        )
        .await
    }

    async fn sum_for_account(&self, account: AccountId) -> Result<i64, LedgerError> {
        // SUM(BIGINT) is NUMERIC in PostgreSQL; cast back so it decodes as i64
        let total = transactions::Entity::find()
            .select_only()
            .column_as(
                Expr::cust("COALESCE(SUM(amount_in_host_currency), 0)::BIGINT"),
                "total",
            )
            .filter(transactions::Column::ToAccountId.eq(account.into_inner()))
            .into_tuple::<i64>()
            .one(&self.db)
            .await
            .map_err(store_error)?;
        Ok(total.unwrap_or(0))
    }

    async fn find_settlement(
        &self,
        group: TransactionGroupId,
        kind: TransactionKind,
    ) -> Result<Option<Settlement>, LedgerError> {
        let row = transaction_settlements::Entity::find()
            .filter(transaction_settlements::Column::TransactionGroup.eq(group.into_inner()))
            .filter(transaction_settlements::Column::Kind.eq(kind.as_str()))
            .one(&self.db)
            .await
            .map_err(store_error)?;
        Ok(row.map(settlement_from_model).transpose()?)
    }

    async fn find_settlement_by_id(&self, id: SettlementId) -> Result<Option<Settlement>, LedgerError> {
        let row = transaction_settlements::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_error)?;
        Ok(row.map(settlement_from_model).transpose()?)
    }

    async fn insert_settlement(&self, settlement: Settlement) -> Result<Settlement, LedgerError> {
        transaction_settlements::Entity::insert(settlement_active_model(&settlement))
            .on_conflict(
                OnConflict::columns([
                    transaction_settlements::Column::TransactionGroup,
                    transaction_settlements::Column::Kind,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(store_error)?;

        self.find_settlement(settlement.transaction_group, settlement.kind)
            .await?
            .ok_or_else(|| {
                LedgerError::Store(format!(
                    "Settlement for group {} vanished after insert",
                    settlement.transaction_group
                ))
            })
    }

    async fn list_settlements(
        &self,
        host: AccountId,
        status: SettlementStatus,
    ) -> Result<Vec<Settlement>, LedgerError> {
        let rows = transaction_settlements::Entity::find()
            .filter(transaction_settlements::Column::HostAccountId.eq(host.into_inner()))
            .filter(transaction_settlements::Column::Status.eq(status.as_str()))
            .order_by_asc(transaction_settlements::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(store_error)?;

        rows.into_iter()
            .map(|row| settlement_from_model(row).map_err(LedgerError::from))
            .collect()
    }
}
