//! Account balance derivation.
//!
//! There is no stored balance: an account's balance is the sum of
//! `amount_in_host_currency` over the legs it owns.

use fiscalhost_shared::types::{AccountId, Currency};
use serde::{Deserialize, Serialize};

use super::types::{Transaction, TransactionKind};

/// Account balance at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// The account ID.
    pub account_id: AccountId,
    /// Balance in host currency minor units.
    pub balance: i64,
    /// Host currency of the balance.
    pub currency: Currency,
}

/// Sums the host-currency amounts of the legs owned by `account`.
#[must_use]
pub fn balance_of<'a>(account: AccountId, legs: impl IntoIterator<Item = &'a Transaction>) -> i64 {
    legs.into_iter()
        .filter(|leg| leg.to_account_id == account)
        .map(|leg| leg.amount_in_host_currency)
        .sum()
}

/// Sums the payment-currency amounts of one kind owned by `account`.
#[must_use]
pub fn kind_total<'a>(
    account: AccountId,
    kind: TransactionKind,
    legs: impl IntoIterator<Item = &'a Transaction>,
) -> i64 {
    legs.into_iter()
        .filter(|leg| leg.to_account_id == account && leg.kind == kind)
        .map(|leg| leg.amount)
        .sum()
}
