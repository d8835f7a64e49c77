//! Refunds of transaction groups.
//!
//! A refund never edits the original legs. It writes a new group of mirror
//! legs, each pointing back at the leg it cancels. Refunding the primary
//! pair of a group (contribution, expense, added funds) takes the rest of the
//! group with it; refunding any other pair only touches that pair.

mod engine;

#[cfg(test)]
mod engine_props;

pub use engine::{RefundEngine, RefundOutcome};
