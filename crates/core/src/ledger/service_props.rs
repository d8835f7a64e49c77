//! Property-based tests for contribution groups.
//!
//! Builds the pairs a contribution produces (strategy table plus pair
//! construction) and checks what each account ends up holding.

use chrono::Utc;
use fiscalhost_shared::types::{AccountId, Currency, Money, OrderId, TransactionGroupId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::balance::balance_of;
use super::entry::{DoubleEntry, PairSpec};
use super::strategy::{EventKind, Parties, plan};
use super::types::{Linkage, Transaction, TransactionKind};
use super::validation::validate_pairs;
use crate::fees::{FeeBreakdown, FeeConfig, FeeContext, FeeEngine, HostFeeRates};

fn host_fee_percent() -> impl Strategy<Value = Decimal> {
    (0i64..=1_500i64).prop_map(|v| Decimal::new(v, 2))
}

fn fx_rate() -> impl Strategy<Value = Decimal> {
    (5_000i64..=20_000i64).prop_map(|v| Decimal::new(v, 4))
}

/// Gross amount with a tip and processor fee that fit inside it.
fn contribution() -> impl Strategy<Value = (i64, i64, i64)> {
    (1_000i64..10_000_000i64).prop_flat_map(|gross| (Just(gross), 0..=gross / 4, 0..=gross / 10))
}

fn parties() -> Parties {
    Parties {
        source: AccountId::new(),
        collective: AccountId::new(),
        host: AccountId::new(),
        platform: AccountId::new(),
        processor: AccountId::new(),
        payee: AccountId::new(),
    }
}

fn build_group(b: &FeeBreakdown, parties: &Parties, direct: bool) -> Vec<Transaction> {
    let group = TransactionGroupId::new();
    let linkage = Linkage::Order(OrderId::new());
    let now = Utc::now();
    plan(EventKind::Contribution, b, parties, direct)
        .into_iter()
        .flat_map(|p| {
            DoubleEntry::from_spec(
                PairSpec {
                    kind: p.kind,
                    amount: p.amount.amount,
                    amount_in_host_currency: p.amount.in_host_currency,
                    net_amount: p.net_amount,
                    tax_amount: p.tax_amount,
                    currency: b.currency,
                    host_currency: b.host_currency,
                    fx_rate: b.fx_rate,
                    payer: p.payer,
                    recipient: p.recipient,
                    host_account_id: parties.host,
                    linkage,
                    transaction_group: group,
                    is_refund: false,
                    is_debt: p.is_debt,
                    cleared_at: None,
                    data: serde_json::Value::Null,
                },
                now,
            )
            .unwrap()
            .into_legs()
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The collective keeps exactly the net amount, in both currencies.
    #[test]
    fn prop_collective_keeps_net(
        (gross, tip, fee) in contribution(),
        pct in host_fee_percent(),
        rate in fx_rate(),
        direct in any::<bool>(),
    ) {
        let ctx = FeeContext {
            platform_tip: tip,
            processor_fee: Some(Money::new(fee, Currency::Eur)),
            host_fee: HostFeeRates { call_override: Some(pct), ..HostFeeRates::default() },
            ..FeeContext::new(Money::new(gross, Currency::Eur))
        };
        let b = FeeEngine::decompose(&ctx, &FeeConfig::default(), rate, Currency::Usd).unwrap();
        let parties = parties();
        let legs = build_group(&b, &parties, direct);

        prop_assert!(validate_pairs(&legs).is_ok());
        prop_assert_eq!(balance_of(parties.collective, &legs), b.net.in_host_currency);
        prop_assert_eq!(balance_of(parties.source, &legs), -b.gross.in_host_currency);
        prop_assert_eq!(legs.iter().map(|l| l.amount_in_host_currency).sum::<i64>(), 0);
    }

    /// The primary leg reports a net equal to gross minus every fee, tax and
    /// tip pair of the group, except the tip debt which moves nothing.
    #[test]
    fn prop_primary_net_matches_other_kinds(
        (gross, tip, fee) in contribution(),
        pct in host_fee_percent(),
    ) {
        let ctx = FeeContext {
            platform_tip: tip,
            processor_fee: Some(Money::new(fee, Currency::Usd)),
            host_fee: HostFeeRates { call_override: Some(pct), ..HostFeeRates::default() },
            ..FeeContext::new(Money::new(gross, Currency::Usd))
        };
        let b = FeeEngine::decompose(&ctx, &FeeConfig::default(), Decimal::ONE, Currency::Usd).unwrap();
        let legs = build_group(&b, &parties(), false);

        let primary = legs
            .iter()
            .find(|l| l.kind == TransactionKind::Contribution && l.amount > 0)
            .unwrap();
        let others: i64 = legs
            .iter()
            .filter(|l| l.amount > 0 && !l.kind.is_primary() && !l.is_debt)
            .map(|l| l.amount)
            .sum();

        prop_assert_eq!(primary.net_amount_in_collective_currency, gross - others);
    }
}
