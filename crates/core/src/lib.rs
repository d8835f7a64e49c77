//! Core business logic for Fiscalhost.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here; persistence
//! and external services are reached through the traits each module declares.
//!
//! # Modules
//!
//! - `ledger` - Double-entry transaction legs, grouping and balances
//! - `fees` - Fee and tax decomposition of a gross payment
//! - `refund` - Mirror-pair refunds of transaction groups
//! - `billing` - Recurring subscription charging and retry schedule
//! - `settlement` - Host-to-platform debt tracking
//! - `currency` - Exchange rates and minor-unit conversion
//! - `events` - Post-commit event fan-out and notifications
//! - `orders` - Orders, expenses and the services that pay them
//! - `payment` - Payment processor boundary
//! - `memory` - In-memory stores for tests and dry runs

pub mod billing;
pub mod currency;
pub mod events;
pub mod fees;
pub mod ledger;
pub mod memory;
pub mod orders;
pub mod payment;
pub mod refund;
pub mod settlement;
