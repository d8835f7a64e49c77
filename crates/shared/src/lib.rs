//! Shared types, errors, and configuration for Fiscalhost.
//!
//! This crate provides common types used across all other crates:
//! - Money in integer minor units with ISO 4217 currencies
//! - Typed IDs for type-safe entity references
//! - Pagination types for ledger queries
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, DatabaseConfig};
pub use error::{AppError, AppResult, ErrorCategory};
