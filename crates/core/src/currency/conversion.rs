//! Currency conversion logic.
//!
//! CRITICAL: Rounding strategy for money:
//! - Every ledger amount is a whole number of minor units
//! - Round half away from zero (half-up on magnitude)
//! - Rates keep full `Decimal` precision until the final rounding

use fiscalhost_shared::types::Currency;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::error::CurrencyError;

/// Rounds a value to a whole number, halves away from zero.
#[must_use]
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Multiplies minor units by a factor and rounds half-up.
///
/// # Errors
///
/// Returns `CurrencyError::Overflow` if the result does not fit in `i64`.
pub fn apply_rate(amount: i64, factor: Decimal) -> Result<i64, CurrencyError> {
    Decimal::from(amount)
        .checked_mul(factor)
        .map(round_half_up)
        .and_then(|v| v.to_i64())
        .ok_or(CurrencyError::Overflow {
            amount,
            rate: factor,
        })
}

/// Takes `percent` percent of a minor-unit amount, rounded half-up.
///
/// # Errors
///
/// Returns `CurrencyError::Overflow` if the result does not fit in `i64`.
pub fn percent_of(amount: i64, percent: Decimal) -> Result<i64, CurrencyError> {
    apply_rate(amount, percent / Decimal::ONE_HUNDRED)
}

/// Converts minor units of `from` into minor units of `to`.
///
/// The rate is expressed in major units (1 `from` = `rate` `to`), so the
/// result is rescaled when the two currencies have different exponents
/// (USD cents to whole yen, for example).
///
/// # Errors
///
/// Returns `CurrencyError::Overflow` if the result does not fit in `i64`.
pub fn convert_minor(
    amount: i64,
    rate: Decimal,
    from: Currency,
    to: Currency,
) -> Result<i64, CurrencyError> {
    if from == to && rate == Decimal::ONE {
        return Ok(amount);
    }

    let from_places = from.decimal_places();
    let to_places = to.decimal_places();
    let factor = if to_places >= from_places {
        rate.checked_mul(pow10(to_places - from_places))
    } else {
        rate.checked_div(pow10(from_places - to_places))
    };

    let factor = factor.ok_or(CurrencyError::Overflow { amount, rate })?;
    apply_rate(amount, factor).map_err(|_| CurrencyError::Overflow { amount, rate })
}

fn pow10(exp: u32) -> Decimal {
    Decimal::from(10_i64.pow(exp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(2.5), dec!(3))]
    #[case(dec!(3.5), dec!(4))]
    #[case(dec!(-2.5), dec!(-3))]
    #[case(dec!(2.49), dec!(2))]
    #[case(dec!(0.5), dec!(1))]
    fn test_round_half_up(#[case] value: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_half_up(value), expected);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(4500, dec!(10)).unwrap(), 450);
        assert_eq!(percent_of(4505, dec!(10)).unwrap(), 451);
        assert_eq!(percent_of(1000, dec!(0)).unwrap(), 0);
        assert_eq!(percent_of(999, dec!(7.5)).unwrap(), 75);
    }

    #[test]
    fn test_convert_same_currency() {
        assert_eq!(
            convert_minor(5000, Decimal::ONE, Currency::Usd, Currency::Usd).unwrap(),
            5000
        );
    }

    #[test]
    fn test_convert_usd_to_eur() {
        // 50.00 USD at 0.92 = 46.00 EUR
        assert_eq!(
            convert_minor(5000, dec!(0.92), Currency::Usd, Currency::Eur).unwrap(),
            4600
        );
    }

    #[test]
    fn test_convert_rounds_half_up() {
        // 1.01 USD at 0.5 = 0.505 EUR -> 0.51 EUR
        assert_eq!(
            convert_minor(101, dec!(0.5), Currency::Usd, Currency::Eur).unwrap(),
            51
        );
    }

    #[test]
    fn test_convert_between_exponents() {
        // 10.00 USD at 150 = 1500 JPY
        assert_eq!(
            convert_minor(1000, dec!(150), Currency::Usd, Currency::Jpy).unwrap(),
            1500
        );
        // 1500 JPY at 0.0067 = 10.05 USD
        assert_eq!(
            convert_minor(1500, dec!(0.0067), Currency::Jpy, Currency::Usd).unwrap(),
            1005
        );
    }

    #[test]
    fn test_convert_negative_amount() {
        assert_eq!(
            convert_minor(-101, dec!(0.5), Currency::Usd, Currency::Eur).unwrap(),
            -51
        );
    }

    #[test]
    fn test_convert_overflow() {
        let err = convert_minor(i64::MAX, dec!(1000), Currency::Usd, Currency::Eur).unwrap_err();
        assert!(matches!(err, CurrencyError::Overflow { .. }));
    }
}
