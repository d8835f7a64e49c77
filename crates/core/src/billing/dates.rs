//! Charge date and retry rules.
//!
//! Periods start on the first day of a month at midnight UTC. A
//! subscription started in the second half of a month gets its first
//! period pushed one extra month out.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};

use super::error::BillingError;
use super::types::{ChargeOutcome, Interval, Subscription};

/// Days between a failed charge and the next attempt.
pub const RETRY_DELAY_DAYS: i64 = 2;

/// Day of month from which the next period skips an extra month.
const LATE_ANCHOR_DAY: u32 = 15;

/// Next charge attempt and next period start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextDates {
    /// Next charge attempt.
    pub next_charge_date: DateTime<Utc>,
    /// Start of the next billing period.
    pub next_period_start: DateTime<Utc>,
}

/// Computes the next dates for a subscription after `outcome`.
///
/// - `New` and `Success` move both dates to the start of the next period,
///   anchored on the previous period start so retries cause no drift.
/// - `Failure` retries two days from `now`; the period is unchanged.
/// - `Updated` charges `now`; the period is unchanged.
///
/// # Errors
///
/// Returns `BillingError::DateOutOfRange` if the next period overflows the calendar.
pub fn next_charge_and_period_start(
    outcome: ChargeOutcome,
    subscription: &Subscription,
    now: DateTime<Utc>,
) -> Result<NextDates, BillingError> {
    let anchor = subscription
        .next_period_start
        .or(subscription.next_charge_date)
        .unwrap_or(subscription.created_at);

    match outcome {
        ChargeOutcome::New | ChargeOutcome::Success => {
            let next = next_period_start(anchor, subscription.interval)?;
            Ok(NextDates {
                next_charge_date: next,
                next_period_start: next,
            })
        }
        ChargeOutcome::Failure => Ok(NextDates {
            next_charge_date: now + Duration::days(RETRY_DELAY_DAYS),
            next_period_start: anchor,
        }),
        ChargeOutcome::Updated => Ok(NextDates {
            next_charge_date: now,
            next_period_start: anchor,
        }),
    }
}

/// Retry count after `outcome`: failures add one, anything else resets.
#[must_use]
pub const fn charge_retry_count(outcome: ChargeOutcome, subscription: &Subscription) -> u32 {
    match outcome {
        ChargeOutcome::Failure => subscription.charge_retry_count.saturating_add(1),
        ChargeOutcome::New | ChargeOutcome::Success | ChargeOutcome::Updated => 0,
    }
}

/// First day of the period following `anchor`, at midnight UTC.
///
/// # Errors
///
/// Returns `BillingError::DateOutOfRange` on calendar overflow.
pub fn next_period_start(
    anchor: DateTime<Utc>,
    interval: Interval,
) -> Result<DateTime<Utc>, BillingError> {
    let base = match interval {
        Interval::Month => 1,
        Interval::Year => 12,
    };
    let months = if anchor.day() >= LATE_ANCHOR_DAY { base + 1 } else { base };

    NaiveDate::from_ymd_opt(anchor.year(), anchor.month(), 1)
        .and_then(|first| first.checked_add_months(Months::new(months)))
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or(BillingError::DateOutOfRange(anchor))
}
