//! Currency service for exchange rate lookup and conversion.
//!
//! Rates come from an `FxRateProvider` and are cached with Moka, keyed by
//! currency pair and effective date.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use fiscalhost_shared::types::Currency;
use moka::future::Cache;
use rust_decimal::Decimal;

use super::conversion::convert_minor;
use super::error::CurrencyError;
use super::exchange::ExchangeRate;

/// Default cache capacity (number of currency pairs per day).
const DEFAULT_CACHE_CAPACITY: u64 = 1_000;

/// Default time-to-live for cached rates (1 hour).
const DEFAULT_TTL_SECS: u64 = 3_600;

/// Source of exchange rates.
#[async_trait]
pub trait FxRateProvider: Send + Sync {
    /// Returns the rate (1 `from` = rate `to`) effective on `date`.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyError::RateNotFound` when the pair is unknown.
    async fn get_fx_rate(
        &self,
        from: Currency,
        to: Currency,
        date: NaiveDate,
    ) -> Result<Decimal, CurrencyError>;
}

type RateKey = (Currency, Currency, NaiveDate);

/// Currency service wrapping a rate provider with a cache.
#[derive(Clone)]
pub struct CurrencyService {
    provider: Arc<dyn FxRateProvider>,
    cache: Cache<RateKey, Decimal>,
}

impl CurrencyService {
    /// Creates a currency service with default cache settings.
    ///
    /// Default: 1000 entries max, 1 hour TTL.
    #[must_use]
    pub fn new(provider: Arc<dyn FxRateProvider>) -> Self {
        Self::with_cache_config(provider, DEFAULT_CACHE_CAPACITY, DEFAULT_TTL_SECS)
    }

    /// Creates a currency service with custom cache configuration.
    ///
    /// # Arguments
    ///
    /// * `provider` - Source of exchange rates
    /// * `max_capacity` - Maximum number of cached rates
    /// * `ttl_secs` - Time-to-live in seconds for each rate
    #[must_use]
    pub fn with_cache_config(
        provider: Arc<dyn FxRateProvider>,
        max_capacity: u64,
        ttl_secs: u64,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { provider, cache }
    }

    /// Returns the rate between two currencies on a date (today when `None`).
    ///
    /// The rate of a currency to itself is always 1 and never hits the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider has no rate or returns a non-positive one.
    pub async fn get_fx_rate(
        &self,
        from: Currency,
        to: Currency,
        date: Option<NaiveDate>,
    ) -> Result<Decimal, CurrencyError> {
        Ok(self.quote(from, to, date).await?.rate)
    }

    /// Returns the full exchange rate record used for a conversion.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider has no rate or returns a non-positive one.
    pub async fn quote(
        &self,
        from: Currency,
        to: Currency,
        date: Option<NaiveDate>,
    ) -> Result<ExchangeRate, CurrencyError> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        if from == to {
            return Ok(ExchangeRate::identity(from, date));
        }

        let key = (from, to, date);
        if let Some(rate) = self.cache.get(&key).await {
            return Ok(ExchangeRate::new(from, to, rate, date));
        }

        let rate = self.provider.get_fx_rate(from, to, date).await?;
        if rate <= Decimal::ZERO {
            return Err(CurrencyError::InvalidRate { from, to, rate });
        }

        tracing::debug!(%from, %to, %date, %rate, "Fetched exchange rate");
        self.cache.insert(key, rate).await;

        Ok(ExchangeRate::new(from, to, rate, date))
    }

    /// Converts minor units of `from` into minor units of `to` at today's rate.
    ///
    /// # Errors
    ///
    /// Returns an error if no rate is available or the result overflows.
    pub async fn convert(
        &self,
        amount: i64,
        from: Currency,
        to: Currency,
    ) -> Result<i64, CurrencyError> {
        let quote = self.quote(from, to, None).await?;
        convert_minor(amount, quote.rate, from, to)
    }

    /// Drops every cached rate.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        rate: Decimal,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FxRateProvider for CountingProvider {
        async fn get_fx_rate(
            &self,
            _from: Currency,
            _to: Currency,
            _date: NaiveDate,
        ) -> Result<Decimal, CurrencyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rate)
        }
    }

    struct MissingProvider;

    #[async_trait]
    impl FxRateProvider for MissingProvider {
        async fn get_fx_rate(
            &self,
            from: Currency,
            to: Currency,
            date: NaiveDate,
        ) -> Result<Decimal, CurrencyError> {
            Err(CurrencyError::RateNotFound { from, to, date })
        }
    }

    fn counting(rate: Decimal) -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            rate,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_same_currency_rate_is_one() {
        let provider = counting(dec!(2));
        let service = CurrencyService::new(provider.clone());

        let rate = service.get_fx_rate(Currency::Eur, Currency::Eur, None).await.unwrap();
        assert_eq!(rate, Decimal::ONE);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rates_are_cached() {
        let provider = counting(dec!(0.92));
        let service = CurrencyService::new(provider.clone());
        let date = NaiveDate::from_ymd_opt(2026, 5, 4);

        for _ in 0..3 {
            let rate = service.get_fx_rate(Currency::Usd, Currency::Eur, date).await.unwrap();
            assert_eq!(rate, dec!(0.92));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_convert_uses_rate() {
        let service = CurrencyService::new(counting(dec!(0.92)));
        let converted = service.convert(5000, Currency::Usd, Currency::Eur).await.unwrap();
        assert_eq!(converted, 4600);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_rate() {
        let service = CurrencyService::new(counting(Decimal::ZERO));
        let err = service
            .get_fx_rate(Currency::Usd, Currency::Eur, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CurrencyError::InvalidRate { .. }));
    }

    #[tokio::test]
    async fn test_missing_rate_propagates() {
        let service = CurrencyService::new(Arc::new(MissingProvider));
        let err = service
            .convert(100, Currency::Usd, Currency::Nzd)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "EXCHANGE_RATE_NOT_FOUND");
    }
}
