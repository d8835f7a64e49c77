//! Property-based tests for fee decomposition.

use fiscalhost_shared::types::{Currency, Money};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::engine::FeeEngine;
use super::types::{FeeConfig, FeeContext, FeesPayer, HostFeeRates};

/// Strategy to generate host fee percents (0.00 to 15.00).
fn host_fee_percent() -> impl Strategy<Value = Decimal> {
    (0i64..=1_500i64).prop_map(|v| Decimal::new(v, 2))
}

/// Strategy to generate FX rates (0.5000 to 2.0000).
fn fx_rate() -> impl Strategy<Value = Decimal> {
    (5_000i64..=20_000i64).prop_map(|v| Decimal::new(v, 4))
}

/// Strategy for a gross amount with a tip and processor fee that fit inside it.
fn contribution() -> impl Strategy<Value = (i64, i64, i64)> {
    (1_000i64..10_000_000i64).prop_flat_map(|gross| (Just(gross), 0..=gross / 4, 0..=gross / 10))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Net equals gross minus every deduction, in the payment currency.
    #[test]
    fn prop_net_is_gross_minus_deductions(
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

        prop_assert_eq!(b.net.amount, gross - b.deductions());
        prop_assert!(b.net.amount >= 0);
    }

    /// In host currency the components add back up to the converted gross exactly.
    #[test]
    fn prop_host_currency_components_sum_to_gross(
        (gross, tip, fee) in contribution(),
        pct in host_fee_percent(),
        rate in fx_rate(),
    ) {
        let ctx = FeeContext {
            platform_tip: tip,
            processor_fee: Some(Money::new(fee, Currency::Usd)),
            host_fee: HostFeeRates { call_override: Some(pct), ..HostFeeRates::default() },
            ..FeeContext::new(Money::new(gross, Currency::Usd))
        };
        let b = FeeEngine::decompose(&ctx, &FeeConfig::default(), rate, Currency::Eur).unwrap();

        let parts = b.tax.in_host_currency
            + b.platform_tip.in_host_currency
            + b.host_fee.in_host_currency
            + b.platform_fee.in_host_currency
            + b.processor_fee.in_host_currency
            + b.net.in_host_currency;
        prop_assert_eq!(parts, b.gross.in_host_currency);
    }

    /// The host fee never exceeds its percent of the fee base by more than rounding.
    #[test]
    fn prop_host_fee_is_percent_of_base(
        (gross, tip, _fee) in contribution(),
        pct in host_fee_percent(),
    ) {
        let ctx = FeeContext {
            platform_tip: tip,
            host_fee: HostFeeRates { call_override: Some(pct), ..HostFeeRates::default() },
            ..FeeContext::new(Money::new(gross, Currency::Usd))
        };
        let b = FeeEngine::decompose(&ctx, &FeeConfig::default(), Decimal::ONE, Currency::Usd).unwrap();

        let exact = Decimal::from(gross - tip) * pct / Decimal::ONE_HUNDRED;
        let diff = (Decimal::from(b.host_fee.amount) - exact).abs();
        prop_assert!(diff <= Decimal::new(5, 1));
    }

    /// Whoever bears it, an expense's processor fee is accounted for exactly once.
    #[test]
    fn prop_expense_fee_borne_once(amount in 100i64..1_000_000i64, fee in 0i64..100i64, payee in any::<bool>()) {
        let payer = if payee { FeesPayer::Payee } else { FeesPayer::Collective };
        let b = FeeEngine::decompose_expense(
            Money::new(amount, Currency::Usd),
            Some(Money::new(fee, Currency::Usd)),
            payer,
            Decimal::ONE,
            Currency::Usd,
        ).unwrap();

        // Collective outflow minus payee inflow equals the processor's fee.
        let collective_out = amount + if payee { 0 } else { b.processor_fee.amount };
        let payee_in = b.net.amount;
        prop_assert_eq!(collective_out - payee_in, b.processor_fee.amount);
    }
}
