//! Repository implementations of the core store traits.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod error;
pub mod fx_rate;
pub mod ledger;
mod mapping;
pub mod subscription;

pub use error::RepositoryError;
pub use fx_rate::FxRateRepository;
pub use ledger::LedgerRepository;
pub use subscription::SubscriptionRepository;
