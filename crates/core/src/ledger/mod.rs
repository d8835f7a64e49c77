//! Double-entry transaction ledger.
//!
//! This module implements the append-only ledger:
//! - Transaction legs, kinds and pairing keys
//! - Pair construction and refund mirrors
//! - The kind strategy table deciding which pairs an event produces
//! - Pair invariant validation and balance derivation
//! - The storage boundary and the service writing transaction groups

pub mod balance;
pub mod entry;
pub mod error;
pub mod payload;
pub mod service;
pub mod store;
pub mod strategy;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod validation_props;

pub use balance::{AccountBalance, balance_of, kind_total};
pub use entry::{DoubleEntry, PairSpec};
pub use error::LedgerError;
pub use payload::{AddedFunds, ContributionPayload, ExpensePayment};
pub use service::{LedgerService, PlatformAccounts, RecordedGroup};
pub use store::{LedgerCommit, LedgerStore};
pub use strategy::{EventKind, Parties, PlannedPair, plan};
pub use types::{
    DoubleEntryInput, EntryType, Linkage, PairKey, Transaction, TransactionKind, TransactionPair,
};
pub use validation::{pair_legs, validate_pairs};
