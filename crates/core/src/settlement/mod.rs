//! Host-to-platform debt settlements.
//!
//! A PLATFORM_TIP_DEBT pair records that the host holds a tip belonging to
//! the platform. Its settlement tracks whether that amount has been
//! invoiced and paid.

pub mod tracker;
pub mod types;

pub use tracker::SettlementTracker;
pub use types::{Settlement, SettlementStatus, SettlementTransition};
