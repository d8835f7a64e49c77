//! Property-based tests for minor-unit conversion.

use fiscalhost_shared::types::Currency;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::conversion::{convert_minor, percent_of};

/// Strategy to generate amounts up to 10,000,000.00.
fn amount() -> impl Strategy<Value = i64> {
    -1_000_000_000i64..1_000_000_000i64
}

/// Strategy to generate positive exchange rates (0.0001 to 10000.0000).
fn positive_rate() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|v| Decimal::new(v, 4))
}

/// Strategy to generate percentages (0.00 to 100.00).
fn percent() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|v| Decimal::new(v, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Conversion never moves further than half a minor unit from the exact product.
    #[test]
    fn prop_convert_within_half_unit(amount in amount(), rate in positive_rate()) {
        let converted = convert_minor(amount, rate, Currency::Usd, Currency::Eur).unwrap();
        let exact = Decimal::from(amount) * rate;
        let diff = (Decimal::from(converted) - exact).abs();
        prop_assert!(diff <= Decimal::new(5, 1));
    }

    /// Converting a negated amount gives the negated result.
    #[test]
    fn prop_convert_is_sign_symmetric(amount in amount(), rate in positive_rate()) {
        let pos = convert_minor(amount, rate, Currency::Usd, Currency::Gbp).unwrap();
        let neg = convert_minor(-amount, rate, Currency::Usd, Currency::Gbp).unwrap();
        prop_assert_eq!(pos, -neg);
    }

    /// A percentage of a non-negative amount never exceeds the amount.
    #[test]
    fn prop_percent_bounded(amount in 0i64..1_000_000_000i64, pct in percent()) {
        let part = percent_of(amount, pct).unwrap();
        prop_assert!(part >= 0);
        prop_assert!(part <= amount);
    }
}
