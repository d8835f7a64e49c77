//! Subscription and sweep types.

use chrono::{DateTime, Utc};
use fiscalhost_shared::types::{Money, OrderId, SubscriptionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    /// Charged monthly.
    Month,
    /// Charged yearly.
    Year,
}

impl Interval {
    /// Returns the storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl std::str::FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(format!("Unknown interval: {s}")),
        }
    }
}

/// A sweep's temporary hold on a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionClaim {
    /// Token only the holder knows.
    pub token: Uuid,
    /// When the hold lapses if never released.
    pub expires_at: DateTime<Utc>,
    /// Held by a sweep that may charge. Such a claim does not lapse: only
    /// saving the charged schedule or releasing it frees the subscription.
    pub charging: bool,
}

impl SubscriptionClaim {
    /// True while the claim still blocks other claimers.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.charging || self.expires_at > now
    }

    /// True for a charging claim whose holder ran past its lease without
    /// saving, so the charge may or may not have been made.
    #[must_use]
    pub fn is_unconfirmed(&self, now: DateTime<Utc>) -> bool {
        self.charging && self.expires_at <= now
    }
}

/// State a claimer expects the subscription to still be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimGuard {
    /// Charges made when the subscription was read.
    pub charge_number: u32,
    /// Due date when the subscription was read.
    pub next_charge_date: Option<DateTime<Utc>>,
}

/// Recurring schedule of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription identifier.
    pub id: SubscriptionId,
    /// Owning order.
    pub order_id: OrderId,
    /// Amount charged per period.
    pub amount: Money,
    /// Billing period.
    pub interval: Interval,
    /// Still charging.
    pub is_active: bool,
    /// First activation.
    pub activated_at: Option<DateTime<Utc>>,
    /// Next charge attempt.
    pub next_charge_date: Option<DateTime<Utc>>,
    /// Start of the next billing period.
    pub next_period_start: Option<DateTime<Utc>>,
    /// Successful charges so far.
    pub charge_number: u32,
    /// Consecutive failed attempts.
    pub charge_retry_count: u32,
    /// Total charges allowed, for fixed-count subscriptions.
    pub quantity: Option<u32>,
    /// When charging stopped.
    pub deactivated_at: Option<DateTime<Utc>>,
    /// Current claim, if a sweep holds one.
    pub claim: Option<SubscriptionClaim>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// True when an active subscription is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.next_charge_date.is_some_and(|date| date <= now)
    }

    /// True once a fixed-count subscription has made all its charges.
    #[must_use]
    pub fn quantity_reached(&self) -> bool {
        self.quantity.is_some_and(|quantity| self.charge_number >= quantity)
    }

    /// The guard a claim on the current state must match.
    #[must_use]
    pub const fn guard(&self) -> ClaimGuard {
        ClaimGuard {
            charge_number: self.charge_number,
            next_charge_date: self.next_charge_date,
        }
    }

    /// True when `guard` still describes this subscription and no live
    /// claim holds it.
    #[must_use]
    pub fn claimable(&self, guard: &ClaimGuard, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.charge_number == guard.charge_number
            && self.next_charge_date == guard.next_charge_date
            && !self.claim.is_some_and(|claim| claim.is_live(now))
    }

    /// Stops charging.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.deactivated_at = Some(now);
    }
}

/// Result of a charge attempt, as seen by the date and retry rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeOutcome {
    /// Subscription just created.
    New,
    /// Charge succeeded.
    Success,
    /// Charge failed.
    Failure,
    /// Payment method replaced.
    Updated,
}

/// What a sweep did with one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    /// Charged.
    Success,
    /// Charge failed.
    Failure,
    /// Stopped without a charge attempt (all charges made).
    Deactivated,
    /// Another sweep holds the subscription.
    Skipped,
    /// Dry run; nothing attempted.
    DryRun,
    /// A charge may have been made but the schedule was not saved. The
    /// subscription stays held until the charge is resolved.
    Unconfirmed,
    /// Processing failed for a reason other than the charge.
    Error,
}

/// Outcome for one order of a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedOrder {
    /// Processed order.
    pub order_id: OrderId,
    /// What happened.
    pub status: SweepStatus,
    /// Amount charged or attempted.
    pub amount: Money,
    /// Retry count after the attempt.
    pub retries_after: u32,
    /// Failure detail.
    pub error: Option<String>,
}

impl ProcessedOrder {
    /// An outcome without error detail.
    #[must_use]
    pub const fn new(order_id: OrderId, status: SweepStatus, amount: Money, retries_after: u32) -> Self {
        Self {
            order_id,
            status,
            amount,
            retries_after,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use fiscalhost_shared::types::Currency;

    fn subscription() -> Subscription {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        Subscription {
            id: SubscriptionId::new(),
            order_id: OrderId::new(),
            amount: Money::new(1000, Currency::Usd),
            interval: Interval::Month,
            is_active: true,
            activated_at: Some(now),
            next_charge_date: Some(now),
            next_period_start: Some(now),
            charge_number: 1,
            charge_retry_count: 0,
            quantity: None,
            deactivated_at: None,
            claim: None,
            created_at: now,
        }
    }

    #[test]
    fn test_is_due() {
        let sub = subscription();
        let date = sub.next_charge_date.unwrap();
        assert!(sub.is_due(date));
        assert!(!sub.is_due(date - Duration::seconds(1)));

        let mut inactive = sub;
        inactive.deactivate(date);
        assert!(!inactive.is_due(date));
    }

    #[test]
    fn test_quantity_reached() {
        let mut sub = subscription();
        assert!(!sub.quantity_reached());
        sub.quantity = Some(2);
        assert!(!sub.quantity_reached());
        sub.charge_number = 2;
        assert!(sub.quantity_reached());
    }

    #[test]
    fn test_claimable_respects_guard_and_live_claim() {
        let mut sub = subscription();
        let now = sub.created_at;
        let guard = sub.guard();
        assert!(sub.claimable(&guard, now));

        sub.claim = Some(SubscriptionClaim {
            token: Uuid::new_v4(),
            expires_at: now + Duration::minutes(10),
            charging: false,
        });
        assert!(!sub.claimable(&guard, now));
        // An expired claim no longer blocks
        assert!(sub.claimable(&guard, now + Duration::minutes(11)));

        sub.claim = None;
        sub.charge_number += 1;
        assert!(!sub.claimable(&guard, now));
    }

    #[test]
    fn test_charging_claim_outlives_its_lease() {
        let mut sub = subscription();
        let now = sub.created_at;
        let guard = sub.guard();
        let claim = SubscriptionClaim {
            token: Uuid::new_v4(),
            expires_at: now + Duration::minutes(10),
            charging: true,
        };
        sub.claim = Some(claim);

        assert!(!claim.is_unconfirmed(now));
        assert!(!sub.claimable(&guard, now + Duration::minutes(11)));
        assert!(claim.is_unconfirmed(now + Duration::minutes(11)));
    }
}
