//! FX rate repository backing the currency service.
//!
//! Lookup order for a pair on a date:
//! 1. Direct rate (from -> to) effective on or before the date
//! 2. Inverse rate (to -> from), inverted
//! 3. `CurrencyError::RateNotFound`

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use fiscalhost_core::currency::{CurrencyError, FxRateProvider};
use fiscalhost_shared::types::Currency;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::debug;
use uuid::Uuid;

use super::error::RepositoryError;
use crate::entities::fx_rates;

/// FX rate repository implementing `FxRateProvider`.
#[derive(Debug, Clone)]
pub struct FxRateRepository {
    db: DatabaseConnection,
}

impl FxRateRepository {
    /// Creates a new FX rate repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Stores the rate of a pair for a date, replacing any rate already set for that day.
    ///
    /// # Errors
    ///
    /// - `CurrencyError::InvalidRate` if the rate is not positive or the currencies match
    /// - `CurrencyError::Provider` on database failure
    pub async fn upsert_rate(
        &self,
        from: Currency,
        to: Currency,
        rate: Decimal,
        effective_date: NaiveDate,
    ) -> Result<(), CurrencyError> {
        if rate <= Decimal::ZERO || from == to {
            return Err(CurrencyError::InvalidRate { from, to, rate });
        }

        let model = fx_rates::ActiveModel {
            id: Set(Uuid::now_v7()),
            from_currency: Set(from.code().to_string()),
            to_currency: Set(to.code().to_string()),
            rate: Set(rate),
            effective_date: Set(effective_date),
            created_at: Set(Utc::now().fixed_offset()),
        };

        fx_rates::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    fx_rates::Column::FromCurrency,
                    fx_rates::Column::ToCurrency,
                    fx_rates::Column::EffectiveDate,
                ])
                .update_column(fx_rates::Column::Rate)
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(RepositoryError::from)?;

        debug!(%from, %to, %rate, %effective_date, "Exchange rate stored");
        Ok(())
    }

    async fn latest(
        &self,
        from: Currency,
        to: Currency,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, RepositoryError> {
        let row = fx_rates::Entity::find()
            .filter(fx_rates::Column::FromCurrency.eq(from.code()))
            .filter(fx_rates::Column::ToCurrency.eq(to.code()))
            .filter(fx_rates::Column::EffectiveDate.lte(date))
            .order_by_desc(fx_rates::Column::EffectiveDate)
            .one(&self.db)
            .await?;
        Ok(row.map(|row| row.rate))
    }
}

#[async_trait]
impl FxRateProvider for FxRateRepository {
    async fn get_fx_rate(
        &self,
        from: Currency,
        to: Currency,
        date: NaiveDate,
    ) -> Result<Decimal, CurrencyError> {
        if from == to {
            return Ok(Decimal::ONE);
        }

        if let Some(rate) = self.latest(from, to, date).await? {
            return Ok(rate);
        }

        if let Some(inverse) = self.latest(to, from, date).await? {
            return Decimal::ONE
                .checked_div(inverse)
                .ok_or(CurrencyError::InvalidRate {
                    from: to,
                    to: from,
                    rate: inverse,
                });
        }

        Err(CurrencyError::RateNotFound { from, to, date })
    }
}
