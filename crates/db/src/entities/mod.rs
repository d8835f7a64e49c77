//! `SeaORM` entities, one module per table.

pub mod prelude;

pub mod fx_rates;
pub mod orders;
pub mod subscriptions;
pub mod transaction_settlements;
pub mod transactions;
