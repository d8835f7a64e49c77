//! Exchange rate types.

use chrono::NaiveDate;
use fiscalhost_shared::types::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange rate between two currencies.
///
/// The rate applies to major units: 1 `from` = `rate` `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Source currency.
    pub from: Currency,
    /// Target currency.
    pub to: Currency,
    /// Exchange rate (1 from = rate to).
    pub rate: Decimal,
    /// Date this rate is effective.
    pub effective_date: NaiveDate,
}

impl ExchangeRate {
    /// Creates a new exchange rate.
    #[must_use]
    pub const fn new(from: Currency, to: Currency, rate: Decimal, effective_date: NaiveDate) -> Self {
        Self {
            from,
            to,
            rate,
            effective_date,
        }
    }

    /// The rate of a currency to itself.
    #[must_use]
    pub const fn identity(currency: Currency, effective_date: NaiveDate) -> Self {
        Self::new(currency, currency, Decimal::ONE, effective_date)
    }

    /// Returns the inverse rate, or `None` for a zero rate.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let rate = Decimal::ONE.checked_div(self.rate)?;
        Some(Self::new(self.to, self.from, rate, self.effective_date))
    }

    /// True when both sides are the same currency.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn test_inverse_rate() {
        let rate = ExchangeRate::new(Currency::Usd, Currency::Eur, dec!(0.8), date());
        let inverse = rate.inverse().unwrap();
        assert_eq!(inverse.from, Currency::Eur);
        assert_eq!(inverse.to, Currency::Usd);
        assert_eq!(inverse.rate, dec!(1.25));
    }

    #[test]
    fn test_inverse_of_zero_rate() {
        let rate = ExchangeRate::new(Currency::Usd, Currency::Eur, Decimal::ZERO, date());
        assert!(rate.inverse().is_none());
    }

    #[test]
    fn test_identity() {
        let rate = ExchangeRate::identity(Currency::Nzd, date());
        assert!(rate.is_identity());
        assert_eq!(rate.rate, Decimal::ONE);
    }
}
