//! In-memory implementations of the storage and provider traits.
//!
//! Used by the unit tests and by dry runs that must not touch the database.
//! Each store keeps its state behind one lock so a commit is applied
//! all-or-nothing, matching the transactional guarantees of the SQL stores.

mod events;
mod fx;
mod ledger_store;
mod processor;
mod subscription_store;

pub use events::RecordingSubscriber;
pub use fx::StaticFxRates;
pub use ledger_store::InMemoryLedgerStore;
pub use processor::StubProcessor;
pub use subscription_store::InMemorySubscriptionStore;
