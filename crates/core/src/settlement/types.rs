//! Settlement types.

use chrono::{DateTime, Utc};
use fiscalhost_shared::types::{AccountId, ExpenseId, SettlementId, TransactionGroupId};
use serde::{Deserialize, Serialize};

use crate::ledger::TransactionKind;

/// Where a host-to-platform debt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    /// The host owes the amount.
    Owed,
    /// The amount is on an invoice to the host.
    Invoiced,
    /// Paid or extinguished. Terminal.
    Settled,
}

impl SettlementStatus {
    /// Returns the storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owed => "OWED",
            Self::Invoiced => "INVOICED",
            Self::Settled => "SETTLED",
        }
    }

    /// Checks if a transition is allowed.
    ///
    /// Status only moves forward, one step at a time. The refund engine
    /// closes an OWED debt directly and does not go through this table.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Owed, Self::Invoiced) | (Self::Invoiced, Self::Settled)
        )
    }
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SettlementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OWED" => Ok(Self::Owed),
            "INVOICED" => Ok(Self::Invoiced),
            "SETTLED" => Ok(Self::Settled),
            _ => Err(format!("Unknown settlement status: {s}")),
        }
    }
}

/// Settlement tracking for one debt group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Settlement identifier.
    pub id: SettlementId,
    /// Group holding the debt pair.
    pub transaction_group: TransactionGroupId,
    /// Kind of the debt pair (PLATFORM_TIP_DEBT).
    pub kind: TransactionKind,
    /// Host that owes the amount.
    pub host_account_id: AccountId,
    /// Current status.
    pub status: SettlementStatus,
    /// Invoice expense that settles the debt, once known.
    pub expense_id: Option<ExpenseId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl Settlement {
    /// A new OWED settlement.
    #[must_use]
    pub fn owed(
        transaction_group: TransactionGroupId,
        kind: TransactionKind,
        host_account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SettlementId::new(),
            transaction_group,
            kind,
            host_account_id,
            status: SettlementStatus::Owed,
            expense_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A compare-and-set status change, applied inside a ledger commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTransition {
    /// Settlement to change.
    pub settlement_id: SettlementId,
    /// Status the settlement must still have.
    pub from: SettlementStatus,
    /// New status.
    pub to: SettlementStatus,
    /// Invoice to attach, if any.
    pub expense_id: Option<ExpenseId>,
}
