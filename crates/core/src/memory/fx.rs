//! Fixed exchange rates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use fiscalhost_shared::types::Currency;
use rust_decimal::Decimal;

use crate::currency::{CurrencyError, FxRateProvider};

/// Rate provider serving the same rates on every date.
///
/// A pair without a direct rate falls back to the inverse of the reverse pair.
#[derive(Debug, Default)]
pub struct StaticFxRates {
    rates: HashMap<(Currency, Currency), Decimal>,
    calls: AtomicUsize,
}

impl StaticFxRates {
    /// Creates a provider without rates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the rate 1 `from` = `rate` `to`.
    #[must_use]
    pub fn with_rate(mut self, from: Currency, to: Currency, rate: Decimal) -> Self {
        self.rates.insert((from, to), rate);
        self
    }

    /// Number of lookups served, including failed ones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FxRateProvider for StaticFxRates {
    async fn get_fx_rate(
        &self,
        from: Currency,
        to: Currency,
        date: NaiveDate,
    ) -> Result<Decimal, CurrencyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if from == to {
            return Ok(Decimal::ONE);
        }
        if let Some(rate) = self.rates.get(&(from, to)) {
            return Ok(*rate);
        }
        self.rates
            .get(&(to, from))
            .filter(|rate| !rate.is_zero())
            .and_then(|rate| Decimal::ONE.checked_div(*rate))
            .ok_or(CurrencyError::RateNotFound { from, to, date })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn test_direct_and_inverse_rates() {
        let rates = StaticFxRates::new().with_rate(Currency::Usd, Currency::Eur, dec!(0.8));

        assert_eq!(rates.get_fx_rate(Currency::Usd, Currency::Eur, day()).await.unwrap(), dec!(0.8));
        assert_eq!(rates.get_fx_rate(Currency::Eur, Currency::Usd, day()).await.unwrap(), dec!(1.25));
        assert_eq!(rates.calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_pair() {
        let rates = StaticFxRates::new();
        let err = rates.get_fx_rate(Currency::Usd, Currency::Gbp, day()).await.unwrap_err();
        assert!(matches!(err, CurrencyError::RateNotFound { .. }));
    }
}
