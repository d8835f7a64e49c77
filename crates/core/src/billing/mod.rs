//! Recurring billing.
//!
//! The scheduler charges due subscriptions, advances their schedule with
//! the date rules in `dates`, retries failures and cancels orders once the
//! retry budget is spent. Each subscription is claimed with a
//! compare-and-set before charging so concurrent sweeps cannot charge it
//! twice.

pub mod dates;
pub mod error;
pub mod report;
pub mod scheduler;
pub mod store;
pub mod types;

#[cfg(test)]
mod dates_props;

pub use dates::{NextDates, charge_retry_count, next_charge_and_period_start};
pub use error::BillingError;
pub use report::{ReportBucket, SweepFailure, SweepReport, group_processed_orders};
pub use scheduler::{BillingConfig, BillingScheduler, ChargeReceipt, OrderCharger, SweepOptions};
pub use store::SubscriptionStore;
pub use types::{
    ChargeOutcome, ClaimGuard, Interval, ProcessedOrder, Subscription, SubscriptionClaim,
    SweepStatus,
};
