//! Exchange rates and minor-unit conversion.
//!
//! Ledger amounts are whole minor units. Conversion multiplies by a
//! `Decimal` rate, rescales between the currencies' exponents and rounds
//! half-up to the nearest minor unit.

pub mod conversion;
pub mod error;
pub mod exchange;
pub mod service;

#[cfg(test)]
mod props;

pub use conversion::{apply_rate, convert_minor, percent_of, round_half_up};
pub use error::CurrencyError;
pub use exchange::ExchangeRate;
pub use service::{CurrencyService, FxRateProvider};
