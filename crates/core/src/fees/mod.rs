//! Fee and tax decomposition.
//!
//! Splits a gross payment into the amounts owed to the collective, the
//! host, the platform, the payment processor and the tax authority.

pub mod engine;
pub mod error;
pub mod tax;
pub mod types;

#[cfg(test)]
mod engine_props;

pub use engine::FeeEngine;
pub use error::FeeError;
pub use tax::{AppliedTax, TaxContext, TaxType, resolve_tax};
pub use types::{
    FeeBreakdown, FeeConfig, FeeContext, FeesPayer, HostFeeRates, HostFeeSource, Split, TaxInput,
};
