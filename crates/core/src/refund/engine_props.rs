//! Property-based tests for contribution refunds.

use std::sync::Arc;

use fiscalhost_shared::types::{AccountId, Currency, Money, OrderId};
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;

use super::engine::RefundEngine;
use crate::currency::CurrencyService;
use crate::events::EventBus;
use crate::fees::FeeConfig;
use crate::ledger::{
    ContributionPayload, LedgerService, LedgerStore, PlatformAccounts, TransactionKind, balance_of,
};
use crate::memory::{InMemoryLedgerStore, StaticFxRates};
use crate::orders::Host;

fn host_fee_percent() -> impl Strategy<Value = Decimal> {
    (0i64..=1_500i64).prop_map(|v| Decimal::new(v, 2))
}

/// Gross, tip, processor fee, and the part of the fee the processor returns.
fn contribution() -> impl Strategy<Value = (i64, i64, i64, i64)> {
    (1_000i64..10_000_000i64)
        .prop_flat_map(|gross| (Just(gross), 0..=gross / 4, 0..=gross / 10))
        .prop_flat_map(|(gross, tip, fee)| (Just(gross), Just(tip), Just(fee), 0..=fee))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A full refund returns the collective and the contributor to zero,
    /// leaves the processor with the fee it kept and the host paying for it.
    #[test]
    fn prop_full_refund_restores_balances(
        (gross, tip, fee, returned) in contribution(),
        percent in host_fee_percent(),
        direct in any::<bool>(),
    ) {
        runtime().block_on(async {
            let store = Arc::new(InMemoryLedgerStore::new());
            let bus = EventBus::new();
            let accounts = PlatformAccounts { platform: AccountId::new(), processor: AccountId::new() };
            let ledger = LedgerService::new(
                store.clone(),
                CurrencyService::new(Arc::new(StaticFxRates::new())),
                FeeConfig { default_host_fee_percent: percent, ..FeeConfig::default() },
                accounts,
                bus.clone(),
            );
            let engine = RefundEngine::new(store.clone(), bus);
            let host = Host::new(AccountId::new(), Currency::Usd);
            let payload = ContributionPayload {
                platform_tip: tip,
                processor_fee: Some(Money::new(fee, Currency::Usd)),
                platform_is_direct_recipient: direct,
                ..ContributionPayload::new(
                    OrderId::new(),
                    AccountId::new(),
                    AccountId::new(),
                    host.clone(),
                    Money::new(gross, Currency::Usd),
                )
            };
            let (contributor, collective) = (payload.contributor, payload.collective);

            let recorded = ledger.create_from_contribution_payload(payload).await.unwrap();
            let contribution = recorded.pair(TransactionKind::Contribution).unwrap().credit.clone();
            let outcome = engine
                .create_refund_transaction(&contribution, returned, Value::Null, None)
                .await
                .unwrap();

            let refund_legs = store.find_by_group(outcome.group).await.unwrap();
            prop_assert_eq!(refund_legs.iter().map(|l| l.amount).sum::<i64>(), 0);
            prop_assert_eq!(refund_legs.iter().map(|l| l.amount_in_host_currency).sum::<i64>(), 0);

            let legs = store.transactions().await;
            let kept = fee - returned;
            prop_assert_eq!(balance_of(collective, &legs), 0);
            prop_assert_eq!(balance_of(contributor, &legs), 0);
            prop_assert_eq!(balance_of(accounts.processor, &legs), kept);
            prop_assert_eq!(balance_of(host.account_id, &legs), -kept);
            prop_assert_eq!(balance_of(accounts.platform, &legs), 0);
            Ok(())
        })?;
    }
}
