//! Event payloads.

use fiscalhost_shared::types::{
    AccountId, ExpenseId, Money, OrderId, SettlementId, TransactionGroupId,
};
use serde::Serialize;

use crate::ledger::{Linkage, TransactionKind};
use crate::settlement::SettlementStatus;

/// Something that happened to the ledger, published after commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A group of pairs was written for one monetary event.
    TransactionGroupCreated {
        /// New group.
        group: TransactionGroupId,
        /// Linked order or expense.
        linkage: Linkage,
        /// Kinds of the pairs written, in write order.
        kinds: Vec<TransactionKind>,
    },
    /// A refund group was written.
    RefundCreated {
        /// Refund group.
        group: TransactionGroupId,
        /// Group that was refunded.
        refunded_group: TransactionGroupId,
        /// Linked order or expense.
        linkage: Linkage,
        /// Account that gets its money back.
        recipient: AccountId,
        /// Amount returned.
        amount: Money,
    },
    /// An expense payout was recorded.
    ExpensePaid {
        /// Paid expense.
        expense_id: ExpenseId,
        /// Payee.
        payee: AccountId,
        /// Ledger group.
        group: TransactionGroupId,
        /// Amount paid.
        amount: Money,
    },
    /// A recurring charge succeeded.
    OrderProcessed {
        /// Charged order.
        order_id: OrderId,
        /// Paying contributor.
        contributor: AccountId,
        /// Amount charged.
        amount: Money,
        /// Charges made so far, this one included.
        charge_number: u32,
    },
    /// A recurring charge failed.
    OrderPaymentFailed {
        /// Order that failed.
        order_id: OrderId,
        /// Paying contributor.
        contributor: AccountId,
        /// Amount attempted.
        amount: Money,
        /// Another attempt is scheduled.
        will_retry: bool,
        /// The next attempt is the last one.
        last_attempt: bool,
        /// Sanitized failure message.
        reason: String,
    },
    /// An order stopped charging.
    OrderCancelled {
        /// Cancelled order.
        order_id: OrderId,
        /// Paying contributor.
        contributor: AccountId,
        /// Why it stopped.
        reason: String,
    },
    /// A settlement changed status or was opened.
    SettlementChanged {
        /// Settlement.
        settlement_id: SettlementId,
        /// Debt group.
        transaction_group: TransactionGroupId,
        /// Previous status; `None` for a new settlement.
        from: Option<SettlementStatus>,
        /// New status.
        to: SettlementStatus,
    },
}

impl LedgerEvent {
    /// Returns the event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TransactionGroupCreated { .. } => "transaction_group_created",
            Self::RefundCreated { .. } => "refund_created",
            Self::ExpensePaid { .. } => "expense_paid",
            Self::OrderProcessed { .. } => "order_processed",
            Self::OrderPaymentFailed { .. } => "order_payment_failed",
            Self::OrderCancelled { .. } => "order_cancelled",
            Self::SettlementChanged { .. } => "settlement_changed",
        }
    }
}
