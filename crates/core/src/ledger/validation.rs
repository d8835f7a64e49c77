//! Pair invariant validation and grouping.
//!
//! Every leg must have exactly one counterpart sharing its pair key, with
//! the opposite type, mirrored accounts and negated amounts.

use std::collections::BTreeMap;

use super::error::LedgerError;
use super::types::{EntryType, PairKey, Transaction, TransactionPair};

/// Validates the pair invariant over a set of legs.
///
/// # Errors
///
/// - `LedgerError::SignMismatch` if a leg's sign contradicts its type
/// - `LedgerError::CounterpartMismatch` if a leg has zero or several counterparts
/// - `LedgerError::UnbalancedPair` if a pair does not sum to zero
pub fn validate_pairs(legs: &[Transaction]) -> Result<(), LedgerError> {
    for leg in legs {
        check_sign(leg)?;
    }

    for (key, members) in by_pair_key(legs) {
        let [first, second] = members.as_slice() else {
            let transaction = members.first().map(|leg| leg.id).unwrap_or_default();
            return Err(LedgerError::CounterpartMismatch {
                transaction,
                found: members.len().saturating_sub(1),
            });
        };

        if !first.is_counterpart_of(second) {
            return Err(LedgerError::CounterpartMismatch {
                transaction: first.id,
                found: 0,
            });
        }

        let (credit, debit) = if first.entry_type == EntryType::Credit {
            (first, second)
        } else {
            (second, first)
        };
        if credit.amount + debit.amount != 0
            || credit.amount_in_host_currency + debit.amount_in_host_currency != 0
        {
            return Err(LedgerError::UnbalancedPair {
                group: key.transaction_group,
                kind: key.kind,
                credit: credit.amount,
                debit: debit.amount,
            });
        }
    }

    Ok(())
}

/// Groups legs into pairs, ordered by group then kind.
///
/// # Errors
///
/// Returns `LedgerError::CounterpartMismatch` if any leg cannot be paired.
pub fn pair_legs(legs: Vec<Transaction>) -> Result<Vec<TransactionPair>, LedgerError> {
    let mut buckets: BTreeMap<PairKey, (Option<Transaction>, Option<Transaction>)> = BTreeMap::new();
    for leg in legs {
        let id = leg.id;
        let slot = buckets.entry(leg.pair_key()).or_default();
        let side = match leg.entry_type {
            EntryType::Credit => &mut slot.0,
            EntryType::Debit => &mut slot.1,
        };
        if side.replace(leg).is_some() {
            return Err(LedgerError::CounterpartMismatch {
                transaction: id,
                found: 2,
            });
        }
    }

    buckets
        .into_values()
        .map(|slot| match slot {
            (Some(credit), Some(debit)) => Ok(TransactionPair { credit, debit }),
            (Some(leg), None) | (None, Some(leg)) => Err(LedgerError::CounterpartMismatch {
                transaction: leg.id,
                found: 0,
            }),
            (None, None) => Err(LedgerError::Internal("empty pair bucket".to_string())),
        })
        .collect()
}

fn check_sign(leg: &Transaction) -> Result<(), LedgerError> {
    let ok = match leg.entry_type {
        EntryType::Credit => leg.amount > 0 && leg.amount_in_host_currency >= 0,
        EntryType::Debit => leg.amount < 0 && leg.amount_in_host_currency <= 0,
    };
    if ok {
        Ok(())
    } else {
        Err(LedgerError::SignMismatch(leg.id))
    }
}

fn by_pair_key(legs: &[Transaction]) -> BTreeMap<PairKey, Vec<&Transaction>> {
    let mut map: BTreeMap<PairKey, Vec<&Transaction>> = BTreeMap::new();
    for leg in legs {
        map.entry(leg.pair_key()).or_default().push(leg);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::entry::{DoubleEntry, PairSpec};
    use crate::ledger::types::{Linkage, TransactionKind};
    use chrono::Utc;
    use fiscalhost_shared::types::{AccountId, Currency, OrderId, TransactionGroupId};
    use rust_decimal::Decimal;

    fn pair(kind: TransactionKind, amount: i64, group: TransactionGroupId, linkage: Linkage) -> TransactionPair {
        DoubleEntry::from_spec(
            PairSpec {
                kind,
                amount,
                amount_in_host_currency: amount,
                net_amount: amount,
                tax_amount: 0,
                currency: Currency::Usd,
                host_currency: Currency::Usd,
                fx_rate: Decimal::ONE,
                payer: AccountId::new(),
                recipient: AccountId::new(),
                host_account_id: AccountId::new(),
                linkage,
                transaction_group: group,
                is_refund: false,
                is_debt: false,
                cleared_at: None,
                data: serde_json::Value::Null,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn group_legs() -> Vec<Transaction> {
        let group = TransactionGroupId::new();
        let linkage = Linkage::Order(OrderId::new());
        let mut legs = Vec::new();
        legs.extend(pair(TransactionKind::Contribution, 5000, group, linkage).into_legs());
        legs.extend(pair(TransactionKind::HostFee, 450, group, linkage).into_legs());
        legs
    }

    #[test]
    fn test_valid_group() {
        assert!(validate_pairs(&group_legs()).is_ok());
    }

    #[test]
    fn test_missing_counterpart() {
        let mut legs = group_legs();
        legs.pop();
        let err = validate_pairs(&legs).unwrap_err();
        assert!(matches!(err, LedgerError::CounterpartMismatch { found: 0, .. }));
    }

    #[test]
    fn test_unbalanced_pair() {
        let mut legs = group_legs();
        legs[1].amount = -4999;
        let err = validate_pairs(&legs).unwrap_err();
        assert!(matches!(err, LedgerError::UnbalancedPair { credit: 5000, debit: -4999, .. }));
    }

    #[test]
    fn test_sign_mismatch() {
        let mut legs = group_legs();
        legs[0].amount = -5000;
        assert!(matches!(validate_pairs(&legs).unwrap_err(), LedgerError::SignMismatch(_)));
    }

    #[test]
    fn test_accounts_must_mirror() {
        let mut legs = group_legs();
        legs[1].from_account_id = AccountId::new();
        assert!(matches!(
            validate_pairs(&legs).unwrap_err(),
            LedgerError::CounterpartMismatch { .. }
        ));
    }

    #[test]
    fn test_pair_legs_round_trip() {
        let legs = group_legs();
        let pairs = pair_legs(legs).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].kind(), TransactionKind::Contribution);
        assert_eq!(pairs[1].kind(), TransactionKind::HostFee);
        for p in &pairs {
            assert!(p.credit.is_counterpart_of(&p.debit));
        }
    }

    #[test]
    fn test_pair_legs_rejects_orphan() {
        let mut legs = group_legs();
        legs.remove(0);
        assert!(pair_legs(legs).is_err());
    }
}
