//! Integration tests for SubscriptionRepository.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use fiscalhost_core::billing::{
    BillingConfig, BillingError, BillingScheduler, ChargeReceipt, Interval, OrderCharger,
    Subscription, SubscriptionClaim, SubscriptionStore, SweepStatus,
};
use fiscalhost_core::events::EventBus;
use fiscalhost_core::ledger::LedgerError;
use fiscalhost_core::orders::{Host, Order, OrderStatus};
use fiscalhost_core::payment::{PaymentMethodRef, ProcessorError};
use fiscalhost_db::SubscriptionRepository;
use fiscalhost_shared::types::{
    AccountId, Currency, Money, OrderId, SubscriptionId, TransactionGroupId,
};
use uuid::Uuid;

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn order_and_subscription() -> (Order, Subscription) {
    let subscription_id = SubscriptionId::new();
    let order = Order {
        id: OrderId::new(),
        contributor_account_id: AccountId::new(),
        collective_account_id: AccountId::new(),
        host: Host::new(AccountId::new(), Currency::Eur),
        total_amount: Money::new(1500, Currency::Eur),
        platform_tip: 100,
        expected_amount: Some(1400),
        tax: None,
        tier_host_fee_percent: None,
        payment_method: Some(PaymentMethodRef {
            id: "pm_card_visa".into(),
            service: "stripe".into(),
            platform_is_direct_recipient: true,
        }),
        status: OrderStatus::Active,
        subscription_id: Some(subscription_id),
        created_at: at(2018, 1, 1),
    };
    let subscription = Subscription {
        id: subscription_id,
        order_id: order.id,
        amount: order.total_amount,
        interval: Interval::Month,
        is_active: true,
        activated_at: Some(at(2018, 1, 1)),
        next_charge_date: Some(at(2018, 2, 1)),
        next_period_start: Some(at(2018, 2, 1)),
        charge_number: 1,
        charge_retry_count: 0,
        quantity: None,
        deactivated_at: None,
        claim: None,
        created_at: at(2018, 1, 1),
    };
    (order, subscription)
}

async fn stored() -> (SubscriptionRepository, Order, Subscription) {
    let repo = SubscriptionRepository::new(common::setup().await);
    let (order, subscription) = order_and_subscription();
    repo.insert_order(&order).await.unwrap();
    repo.insert_subscription(&subscription).await.unwrap();
    (repo, order, subscription)
}

fn claim_at(now: DateTime<Utc>) -> SubscriptionClaim {
    SubscriptionClaim {
        token: Uuid::new_v4(),
        expires_at: now + Duration::minutes(10),
        charging: false,
    }
}

/// Charger that declines every call once `declining` is set.
struct CountingCharger {
    calls: AtomicUsize,
    declining: bool,
}

#[async_trait]
impl OrderCharger for CountingCharger {
    async fn charge_recurring(&self, order: &Order) -> Result<ChargeReceipt, LedgerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.declining {
            return Err(ProcessorError::new("Your card was declined")
                .with_code("card_declined")
                .into());
        }
        Ok(ChargeReceipt {
            group: TransactionGroupId::new(),
            processor_ref: format!("ch_{call}"),
            amount: order.total_amount,
        })
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_order_and_subscription_round_trip() {
    let (repo, order, subscription) = stored().await;

    let found = repo.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(found, order);
    let found = repo.find_by_order(order.id).await.unwrap().unwrap();
    assert_eq!(found, subscription);

    let due = repo.find_due(at(2018, 2, 1), 10_000).await.unwrap();
    assert!(due.iter().any(|s| s.id == subscription.id));
    let early = repo.find_due(at(2018, 1, 31), 10_000).await.unwrap();
    assert!(early.iter().all(|s| s.id != subscription.id));
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_only_one_claim_wins() {
    let (repo, _, subscription) = stored().await;
    let now = at(2018, 2, 1);
    let guard = subscription.guard();

    let (a, b) = tokio::join!(
        repo.claim(subscription.id, &guard, claim_at(now), now),
        repo.claim(subscription.id, &guard, claim_at(now), now),
    );

    assert_eq!([a.unwrap(), b.unwrap()].iter().filter(|won| **won).count(), 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_expired_claim_can_be_taken_over() {
    let (repo, _, subscription) = stored().await;
    let now = at(2018, 2, 1);
    let guard = subscription.guard();

    assert!(repo.claim(subscription.id, &guard, claim_at(now), now).await.unwrap());
    assert!(!repo.claim(subscription.id, &guard, claim_at(now), now).await.unwrap());

    let later = now + Duration::minutes(11);
    assert!(repo.claim(subscription.id, &guard, claim_at(later), later).await.unwrap());
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_charging_claim_is_never_taken_over() {
    let (repo, order, subscription) = stored().await;
    let now = at(2018, 2, 1);
    let guard = subscription.guard();
    let charging = SubscriptionClaim {
        charging: true,
        ..claim_at(now)
    };
    assert!(repo.claim(subscription.id, &guard, charging, now).await.unwrap());

    let later = now + Duration::minutes(11);
    assert!(!repo.claim(subscription.id, &guard, claim_at(later), later).await.unwrap());
    let held = repo.find_by_order(order.id).await.unwrap().unwrap().claim.unwrap();
    assert!(held.is_unconfirmed(later));

    repo.release(subscription.id, charging.token).await.unwrap();
    assert!(repo.claim(subscription.id, &guard, claim_at(later), later).await.unwrap());
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_stale_guard_cannot_claim() {
    let (repo, _, subscription) = stored().await;
    let now = at(2018, 2, 1);
    let mut guard = subscription.guard();
    guard.charge_number += 1;

    assert!(!repo.claim(subscription.id, &guard, claim_at(now), now).await.unwrap());
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_save_is_fenced_by_token() {
    let (repo, order, mut subscription) = stored().await;
    let now = at(2018, 2, 1);
    let claim = claim_at(now);
    assert!(repo.claim(subscription.id, &subscription.guard(), claim, now).await.unwrap());

    subscription.charge_number = 2;
    subscription.next_charge_date = Some(at(2018, 3, 1));

    let err = repo.save(&subscription, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, BillingError::ClaimLost(id) if id == subscription.id));

    repo.save(&subscription, claim.token).await.unwrap();
    let stored = repo.find_by_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.charge_number, 2);
    assert_eq!(stored.next_charge_date, Some(at(2018, 3, 1)));
    assert!(stored.claim.is_none());

    // The claim was dropped with the save, so the token no longer fences anything
    let err = repo.save(&subscription, claim.token).await.unwrap_err();
    assert!(matches!(err, BillingError::ClaimLost(_)));
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_release_frees_the_claim() {
    let (repo, order, subscription) = stored().await;
    let now = at(2018, 2, 1);
    let claim = claim_at(now);
    assert!(repo.claim(subscription.id, &subscription.guard(), claim, now).await.unwrap());

    // A foreign token does not release
    repo.release(subscription.id, Uuid::new_v4()).await.unwrap();
    assert!(repo.find_by_order(order.id).await.unwrap().unwrap().claim.is_some());

    repo.release(subscription.id, claim.token).await.unwrap();
    assert!(repo.find_by_order(order.id).await.unwrap().unwrap().claim.is_none());
    assert!(repo.claim(subscription.id, &subscription.guard(), claim_at(now), now).await.unwrap());
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_update_order_status() {
    let (repo, order, _) = stored().await;

    repo.update_order_status(order.id, OrderStatus::Error).await.unwrap();
    let found = repo.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(found.status, OrderStatus::Error);

    let missing = OrderId::new();
    let err = repo
        .update_order_status(missing, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::OrderNotFound(id) if id == missing));
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_scheduler_charges_through_repository() {
    let (repo, order, subscription) = stored().await;
    let repo = Arc::new(repo);
    let charger = Arc::new(CountingCharger {
        calls: AtomicUsize::new(0),
        declining: false,
    });
    let scheduler = BillingScheduler::new(
        repo.clone(),
        charger.clone(),
        EventBus::new(),
        BillingConfig::default(),
    );
    let now = at(2018, 2, 1);

    let processed = scheduler
        .process_order_with_subscription(&order, subscription.clone(), false, now)
        .await
        .unwrap();
    assert_eq!(processed.status, SweepStatus::Success);

    // The stale copy no longer matches the stored guard
    let again = scheduler
        .process_order_with_subscription(&order, subscription, false, now)
        .await
        .unwrap();
    assert_eq!(again.status, SweepStatus::Skipped);
    assert_eq!(charger.calls.load(Ordering::SeqCst), 1);

    let stored = repo.find_by_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.charge_number, 2);
    assert_eq!(stored.next_charge_date, Some(at(2018, 3, 1)));
    assert!(stored.claim.is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
async fn test_declined_charge_marks_order_error() {
    let (repo, order, subscription) = stored().await;
    let repo = Arc::new(repo);
    let scheduler = BillingScheduler::new(
        repo.clone(),
        Arc::new(CountingCharger {
            calls: AtomicUsize::new(0),
            declining: true,
        }),
        EventBus::new(),
        BillingConfig::default(),
    );
    let now = at(2018, 2, 1);

    let processed = scheduler
        .process_order_with_subscription(&order, subscription, false, now)
        .await
        .unwrap();

    assert_eq!(processed.status, SweepStatus::Failure);
    assert_eq!(processed.retries_after, 1);
    let stored = repo.find_by_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.charge_retry_count, 1);
    assert_eq!(stored.next_charge_date, Some(now + Duration::days(2)));
    assert_eq!(
        repo.find_order(order.id).await.unwrap().unwrap().status,
        OrderStatus::Error
    );
}
