//! Entity re-exports.

pub use super::fx_rates::Entity as FxRates;
pub use super::orders::Entity as Orders;
pub use super::subscriptions::Entity as Subscriptions;
pub use super::transaction_settlements::Entity as TransactionSettlements;
pub use super::transactions::Entity as Transactions;
