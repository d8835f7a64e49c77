//! Post-commit domain events.
//!
//! Services publish a `LedgerEvent` after their unit of work commits.
//! Subscribers (notifications, projections) react to it; their failures are
//! logged by the bus and never reach the publisher.

mod bus;
mod error;
mod notification;
mod types;

pub use bus::{EventBus, EventSubscriber};
pub use error::EventError;
pub use notification::{NotificationService, NotificationSubscriber};
pub use types::LedgerEvent;
