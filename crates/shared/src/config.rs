//! Application configuration management.
//!
//! Fee defaults and billing limits live here and are handed to the core
//! services as explicit values; nothing reads configuration ambiently.

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Platform-owned ledger accounts.
    pub platform: PlatformConfig,
    /// Fee defaults.
    #[serde(default)]
    pub fees: FeeSettings,
    /// Recurring billing settings.
    #[serde(default)]
    pub billing: BillingSettings,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Ledger accounts owned by the platform itself.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Account receiving platform tips and platform fees.
    pub platform_account_id: Uuid,
    /// Account standing in for the payment processor on fee legs.
    pub processor_account_id: Uuid,
}

/// Default fee percentages.
#[derive(Debug, Clone, Deserialize)]
pub struct FeeSettings {
    /// Host fee percent applied when neither the call, the tier nor the host overrides it.
    #[serde(default)]
    pub default_host_fee_percent: Decimal,
    /// Platform fee percent taken on contributions (0 disables the PLATFORM_FEE pair).
    #[serde(default)]
    pub platform_fee_percent: Decimal,
    /// Accepted rounding difference, in minor units, when checking expected amounts.
    #[serde(default = "default_rounding_tolerance")]
    pub rounding_tolerance: i64,
}

fn default_rounding_tolerance() -> i64 {
    1
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            default_host_fee_percent: Decimal::ZERO,
            platform_fee_percent: Decimal::ZERO,
            rounding_tolerance: default_rounding_tolerance(),
        }
    }
}

/// Recurring billing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingSettings {
    /// Consecutive failures after which a subscription is cancelled.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Orders charged concurrently within one sweep.
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,
    /// Maximum due subscriptions loaded per sweep.
    #[serde(default = "default_sweep_limit")]
    pub sweep_limit: u64,
    /// How long a sweep may hold a subscription claim, in seconds.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_sweep_concurrency() -> usize {
    4
}

fn default_sweep_limit() -> u64 {
    500
}

fn default_claim_lease_secs() -> u64 {
    600 // 10 minutes
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            sweep_concurrency: default_sweep_concurrency(),
            sweep_limit: default_sweep_limit(),
            claim_lease_secs: default_claim_lease_secs(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default.toml`,
    /// `config/{RUN_MODE}.toml`, then `FISCALHOST__SECTION__KEY` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        sources()?.try_deserialize()
    }
}

impl DatabaseConfig {
    /// Loads only the `database` section, from the same sources as `AppConfig::load`.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is missing or malformed.
    pub fn load() -> Result<Self, config::ConfigError> {
        sources()?.get("database")
    }
}

fn sources() -> Result<config::Config, config::ConfigError> {
    dotenvy::dotenv().ok();

    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

    config::Config::builder()
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
        .add_source(config::Environment::with_prefix("FISCALHOST").separator("__"))
        .build()
}
