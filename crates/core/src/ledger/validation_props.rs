//! Property-based tests for the pair invariant.
//!
//! - Property 1: Every built pair balances in both currencies
//! - Property 2: A tampered or orphaned leg is rejected
//! - Property 3: A leg and its reversal net to zero

use chrono::Utc;
use fiscalhost_shared::types::{AccountId, Currency, OrderId, TransactionGroupId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::entry::{DoubleEntry, PairSpec};
use super::error::LedgerError;
use super::types::{Linkage, TransactionKind};
use super::validation::validate_pairs;

/// Strategy to generate positive minor-unit amounts.
fn positive_amount() -> impl Strategy<Value = i64> {
    1i64..10_000_000i64
}

/// Strategy to generate positive exchange rates (0.01 to 100.00).
fn positive_rate() -> impl Strategy<Value = Decimal> {
    (1i64..10_000i64).prop_map(|v| Decimal::new(v, 2))
}

fn kind_strategy() -> impl Strategy<Value = TransactionKind> {
    proptest::sample::select(TransactionKind::ALL.to_vec())
}

fn spec(kind: TransactionKind, amount: i64, rate: Decimal) -> PairSpec {
    let host_amount = crate::currency::convert_minor(amount, rate, Currency::Eur, Currency::Usd)
        .unwrap_or(amount);
    PairSpec {
        kind,
        amount,
        amount_in_host_currency: host_amount,
        net_amount: amount,
        tax_amount: 0,
        currency: Currency::Eur,
        host_currency: Currency::Usd,
        fx_rate: rate,
        payer: AccountId::new(),
        recipient: AccountId::new(),
        host_account_id: AccountId::new(),
        linkage: Linkage::Order(OrderId::new()),
        transaction_group: TransactionGroupId::new(),
        is_refund: false,
        is_debt: false,
        cleared_at: None,
        data: serde_json::Value::Null,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // =========================================================================
    // Property 1: Pair Balance
    // =========================================================================

    /// *For any* positive amount, rate and kind, the built pair validates and
    /// its legs sum to zero in both currencies.
    #[test]
    fn prop_built_pair_balances(
        amount in positive_amount(),
        rate in positive_rate(),
        kind in kind_strategy(),
    ) {
        let pair = DoubleEntry::from_spec(spec(kind, amount, rate), Utc::now()).unwrap();

        prop_assert_eq!(pair.credit.amount + pair.debit.amount, 0);
        prop_assert_eq!(
            pair.credit.amount_in_host_currency + pair.debit.amount_in_host_currency,
            0
        );
        prop_assert_eq!(pair.credit.host_currency_fx_rate, pair.debit.host_currency_fx_rate);
        prop_assert!(validate_pairs(&pair.into_legs()).is_ok());
    }

    // =========================================================================
    // Property 2: Tampering Detection
    // =========================================================================

    /// *For any* pair whose debit is altered by a non-zero delta, validation fails.
    #[test]
    fn prop_tampered_debit_rejected(
        amount in positive_amount(),
        delta in 1i64..1000i64,
    ) {
        let mut pair = DoubleEntry::from_spec(spec(TransactionKind::HostFee, amount, Decimal::ONE), Utc::now())
            .unwrap();
        pair.debit.amount -= delta;

        let result = validate_pairs(&pair.into_legs());
        prop_assert!(
            matches!(result, Err(LedgerError::UnbalancedPair { .. })),
            "Tampered pair should be unbalanced, got: {:?}",
            result
        );
    }

    /// *For any* pair, a lone leg has no counterpart.
    #[test]
    fn prop_orphan_leg_rejected(amount in positive_amount(), kind in kind_strategy()) {
        let pair = DoubleEntry::from_spec(spec(kind, amount, Decimal::ONE), Utc::now()).unwrap();

        let result = validate_pairs(&[pair.credit]);
        prop_assert!(
            matches!(result, Err(LedgerError::CounterpartMismatch { found: 0, .. })),
            "Orphan leg should be rejected, got: {:?}",
            result
        );
    }

    // =========================================================================
    // Property 3: Reversal
    // =========================================================================

    /// *For any* pair, the full reversal of both legs forms a valid refund pair
    /// and each account's original and refund legs net to zero.
    #[test]
    fn prop_reversal_nets_to_zero(
        amount in positive_amount(),
        rate in positive_rate(),
        kind in kind_strategy(),
    ) {
        let pair = DoubleEntry::from_spec(spec(kind, amount, rate), Utc::now()).unwrap();
        let refund_group = TransactionGroupId::new();
        let now = Utc::now();

        let refund_debit =
            DoubleEntry::reversal_leg(&pair.credit, amount, refund_group, serde_json::Value::Null, now)
                .unwrap();
        let refund_credit =
            DoubleEntry::reversal_leg(&pair.debit, amount, refund_group, serde_json::Value::Null, now)
                .unwrap();

        prop_assert_eq!(refund_debit.refund_transaction_id, Some(pair.credit.id));
        prop_assert_eq!(pair.credit.amount + refund_debit.amount, 0);
        prop_assert_eq!(
            pair.credit.amount_in_host_currency + refund_debit.amount_in_host_currency,
            0
        );
        prop_assert!(validate_pairs(&[refund_debit, refund_credit]).is_ok());
    }
}
