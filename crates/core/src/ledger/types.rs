//! Ledger types: transaction legs, kinds and pairing keys.
//!
//! Every monetary movement is written as a pair of legs. The CREDIT leg is
//! owned by the recipient (positive amount) and the DEBIT leg by the payer
//! (negative amount); both carry the same group, linkage, kind and refund
//! flag.

use chrono::{DateTime, Utc};
use fiscalhost_shared::types::{
    AccountId, Currency, ExpenseId, Money, OrderId, TransactionGroupId, TransactionId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of a transaction leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Money received by the leg owner.
    Credit,
    /// Money paid by the leg owner.
    Debit,
}

impl EntryType {
    /// Returns the other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Credit => Self::Debit,
            Self::Debit => Self::Credit,
        }
    }

    /// Returns the storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "CREDIT",
            Self::Debit => "DEBIT",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT" => Ok(Self::Credit),
            "DEBIT" => Ok(Self::Debit),
            _ => Err(format!("Unknown entry type: {s}")),
        }
    }
}

/// What a transaction pair represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Contributor to collective.
    Contribution,
    /// Collective to expense payee.
    Expense,
    /// Funds added by a host or outside source.
    AddedFunds,
    /// Collective to host.
    HostFee,
    /// Collective to platform.
    PlatformFee,
    /// Fee bearer to payment processor.
    PaymentProcessorFee,
    /// Coverage of a processor fee by someone other than the bearer.
    PaymentProcessorCover,
    /// Voluntary tip to the platform.
    PlatformTip,
    /// Tip owed by the host to the platform.
    PlatformTipDebt,
    /// Tax collected on behalf of the host.
    Tax,
}

impl TransactionKind {
    /// Every kind, in the order a group's pairs are written.
    pub const ALL: [Self; 10] = [
        Self::Contribution,
        Self::Expense,
        Self::AddedFunds,
        Self::HostFee,
        Self::PlatformFee,
        Self::Tax,
        Self::PlatformTip,
        Self::PlatformTipDebt,
        Self::PaymentProcessorFee,
        Self::PaymentProcessorCover,
    ];

    /// Returns the storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contribution => "CONTRIBUTION",
            Self::Expense => "EXPENSE",
            Self::AddedFunds => "ADDED_FUNDS",
            Self::HostFee => "HOST_FEE",
            Self::PlatformFee => "PLATFORM_FEE",
            Self::PaymentProcessorFee => "PAYMENT_PROCESSOR_FEE",
            Self::PaymentProcessorCover => "PAYMENT_PROCESSOR_COVER",
            Self::PlatformTip => "PLATFORM_TIP",
            Self::PlatformTipDebt => "PLATFORM_TIP_DEBT",
            Self::Tax => "TAX",
        }
    }

    /// True for the movement a group is created for.
    ///
    /// Refunding a primary pair cascades to the rest of its group.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        matches!(self, Self::Contribution | Self::Expense | Self::AddedFunds)
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown transaction kind: {s}"))
    }
}

/// The business object a transaction is linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Linkage {
    /// A contribution order.
    Order(OrderId),
    /// An expense payout.
    Expense(ExpenseId),
}

impl Linkage {
    /// Returns the order id when linked to an order.
    #[must_use]
    pub const fn order_id(self) -> Option<OrderId> {
        match self {
            Self::Order(id) => Some(id),
            Self::Expense(_) => None,
        }
    }

    /// Returns the expense id when linked to an expense.
    #[must_use]
    pub const fn expense_id(self) -> Option<ExpenseId> {
        match self {
            Self::Expense(id) => Some(id),
            Self::Order(_) => None,
        }
    }
}

/// One leg of a transaction pair. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Leg identifier.
    pub id: TransactionId,
    /// Group shared by every leg of one monetary event.
    pub transaction_group: TransactionGroupId,
    /// CREDIT (owner receives) or DEBIT (owner pays).
    pub entry_type: EntryType,
    /// What the pair represents.
    pub kind: TransactionKind,
    /// Signed amount in `currency` minor units.
    pub amount: i64,
    /// Currency of the payment.
    pub currency: Currency,
    /// Signed amount in the host's currency.
    pub amount_in_host_currency: i64,
    /// The host's accounting currency.
    pub host_currency: Currency,
    /// Rate used to derive `amount_in_host_currency`.
    pub host_currency_fx_rate: Decimal,
    /// Signed net amount for the collective side of the movement.
    pub net_amount_in_collective_currency: i64,
    /// Tax included in the amount, signed like `amount`.
    pub tax_amount: i64,
    /// Counterparty account.
    pub from_account_id: AccountId,
    /// Owning account.
    pub to_account_id: AccountId,
    /// Fiscal host accountable for the money.
    pub host_account_id: AccountId,
    /// Order or expense this leg belongs to.
    pub linkage: Linkage,
    /// True for legs written by a refund.
    pub is_refund: bool,
    /// True for legs recording money owed rather than moved.
    pub is_debt: bool,
    /// For refund legs, the original leg being reversed.
    pub refund_transaction_id: Option<TransactionId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the money cleared.
    pub cleared_at: Option<DateTime<Utc>>,
    /// Free-form metadata (processor references, tax details).
    pub data: serde_json::Value,
}

impl Transaction {
    /// Returns the signed amount as `Money`.
    #[must_use]
    pub const fn money(&self) -> Money {
        Money::new(self.amount, self.currency)
    }

    /// Returns the signed host-currency amount as `Money`.
    #[must_use]
    pub const fn host_money(&self) -> Money {
        Money::new(self.amount_in_host_currency, self.host_currency)
    }

    /// Returns the key shared with the counterpart leg.
    #[must_use]
    pub const fn pair_key(&self) -> PairKey {
        PairKey {
            transaction_group: self.transaction_group,
            linkage: self.linkage,
            kind: self.kind,
            is_refund: self.is_refund,
        }
    }

    /// True when `other` is the opposite leg of the same pair.
    #[must_use]
    pub fn is_counterpart_of(&self, other: &Self) -> bool {
        self.id != other.id
            && self.pair_key() == other.pair_key()
            && self.entry_type == other.entry_type.opposite()
            && self.from_account_id == other.to_account_id
            && self.to_account_id == other.from_account_id
    }
}

/// Fields a CREDIT leg shares with its DEBIT counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    /// Transaction group.
    pub transaction_group: TransactionGroupId,
    /// Linked business object.
    pub linkage: Linkage,
    /// Pair kind.
    pub kind: TransactionKind,
    /// Refund flag.
    pub is_refund: bool,
}

/// A CREDIT leg together with its DEBIT counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPair {
    /// Leg owned by the recipient.
    pub credit: Transaction,
    /// Leg owned by the payer.
    pub debit: Transaction,
}

impl TransactionPair {
    /// Returns the pair kind.
    #[must_use]
    pub const fn kind(&self) -> TransactionKind {
        self.credit.kind
    }

    /// Returns the recipient account.
    #[must_use]
    pub const fn recipient(&self) -> AccountId {
        self.credit.to_account_id
    }

    /// Returns the payer account.
    #[must_use]
    pub const fn payer(&self) -> AccountId {
        self.debit.to_account_id
    }

    /// Returns both legs, CREDIT first.
    #[must_use]
    pub fn into_legs(self) -> [Transaction; 2] {
        [self.credit, self.debit]
    }
}

/// Input for writing a single pair.
#[derive(Debug, Clone)]
pub struct DoubleEntryInput {
    /// Pair kind.
    pub kind: TransactionKind,
    /// Side of the leg owned by `to_account_id`; the counterpart is derived.
    pub entry_type: EntryType,
    /// Positive amount in `currency` minor units.
    pub amount: i64,
    /// Payment currency.
    pub currency: Currency,
    /// Counterparty of the primary leg.
    pub from_account_id: AccountId,
    /// Owner of the primary leg.
    pub to_account_id: AccountId,
    /// Fiscal host.
    pub host_account_id: AccountId,
    /// Host accounting currency.
    pub host_currency: Currency,
    /// Linked order or expense.
    pub linkage: Linkage,
    /// Group to write into; a new group is started when `None`.
    pub transaction_group: Option<TransactionGroupId>,
    /// Refund flag.
    pub is_refund: bool,
    /// Debt flag.
    pub is_debt: bool,
    /// Net amount for the recipient, defaulting to `amount`.
    pub net_amount: Option<i64>,
    /// Tax included in the amount.
    pub tax_amount: i64,
    /// Clearing timestamp.
    pub cleared_at: Option<DateTime<Utc>>,
    /// Metadata copied onto both legs.
    pub data: serde_json::Value,
}

impl DoubleEntryInput {
    /// Creates an input with defaults for the optional fields.
    #[must_use]
    pub fn new(
        kind: TransactionKind,
        amount: Money,
        from_account_id: AccountId,
        to_account_id: AccountId,
        host_account_id: AccountId,
        host_currency: Currency,
        linkage: Linkage,
    ) -> Self {
        Self {
            kind,
            entry_type: EntryType::Credit,
            amount: amount.amount,
            currency: amount.currency,
            from_account_id,
            to_account_id,
            host_account_id,
            host_currency,
            linkage,
            transaction_group: None,
            is_refund: false,
            is_debt: false,
            net_amount: None,
            tax_amount: 0,
            cleared_at: None,
            data: serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_entry_type_opposite() {
        assert_eq!(EntryType::Credit.opposite(), EntryType::Debit);
        assert_eq!(EntryType::Debit.opposite(), EntryType::Credit);
    }

    #[test]
    fn test_kind_round_trip_names() {
        for kind in TransactionKind::ALL {
            assert_eq!(TransactionKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(TransactionKind::from_str("FEE").is_err());
    }

    #[test]
    fn test_kind_serde_matches_storage_name() {
        let json = serde_json::to_string(&TransactionKind::PlatformTipDebt).unwrap();
        assert_eq!(json, "\"PLATFORM_TIP_DEBT\"");
    }

    #[test]
    fn test_primary_kinds() {
        assert!(TransactionKind::Contribution.is_primary());
        assert!(TransactionKind::Expense.is_primary());
        assert!(TransactionKind::AddedFunds.is_primary());
        assert!(!TransactionKind::HostFee.is_primary());
        assert!(!TransactionKind::PaymentProcessorCover.is_primary());
    }

    #[test]
    fn test_linkage_accessors() {
        let order = OrderId::new();
        let linkage = Linkage::Order(order);
        assert_eq!(linkage.order_id(), Some(order));
        assert_eq!(linkage.expense_id(), None);
    }
}
