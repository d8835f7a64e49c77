//! Sweep report.

use std::collections::BTreeMap;

use fiscalhost_shared::types::{Currency, OrderId};
use serde::{Deserialize, Serialize};

use super::types::{ProcessedOrder, SweepStatus};

/// Orders of one outcome with their amount totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportBucket {
    /// Orders in the bucket.
    pub orders: Vec<ProcessedOrder>,
    /// Running total per currency, in minor units.
    pub totals: BTreeMap<Currency, i64>,
}

impl ReportBucket {
    fn push(&mut self, order: ProcessedOrder) {
        *self.totals.entry(order.amount.currency).or_default() += order.amount.amount;
        self.orders.push(order);
    }

    /// Number of orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// True when the bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// An order the sweep could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    /// Order.
    pub order_id: OrderId,
    /// What went wrong.
    pub message: String,
}

/// Classification of a sweep's results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Charged successfully.
    pub charged: ReportBucket,
    /// Failed and will be retried.
    pub past_due: ReportBucket,
    /// Stopped: retries exhausted or all charges made.
    pub canceled: ReportBucket,
    /// Held by another sweep.
    pub skipped: Vec<OrderId>,
    /// Dry-run orders that would have been processed.
    pub dry_run: Vec<OrderId>,
    /// Charged or possibly charged, with the schedule left unsaved.
    pub unconfirmed: Vec<SweepFailure>,
    /// Orders that failed for reasons other than the charge.
    pub errors: Vec<SweepFailure>,
}

impl SweepReport {
    /// Orders handled in any way.
    #[must_use]
    pub fn total(&self) -> usize {
        self.charged.len()
            + self.past_due.len()
            + self.canceled.len()
            + self.skipped.len()
            + self.dry_run.len()
            + self.unconfirmed.len()
            + self.errors.len()
    }
}

/// Partitions sweep results for reporting.
///
/// Failures whose retry count reached `max_retries` count as canceled, as
/// do subscriptions stopped because every charge was made.
#[must_use]
pub fn group_processed_orders(
    results: impl IntoIterator<Item = ProcessedOrder>,
    max_retries: u32,
) -> SweepReport {
    let mut report = SweepReport::default();
    for order in results {
        match order.status {
            SweepStatus::Success => report.charged.push(order),
            SweepStatus::Failure if order.retries_after >= max_retries => report.canceled.push(order),
            SweepStatus::Failure => report.past_due.push(order),
            SweepStatus::Deactivated => report.canceled.push(order),
            SweepStatus::Skipped => report.skipped.push(order.order_id),
            SweepStatus::DryRun => report.dry_run.push(order.order_id),
            SweepStatus::Unconfirmed => report.unconfirmed.push(SweepFailure {
                order_id: order.order_id,
                message: order.error.unwrap_or_default(),
            }),
            SweepStatus::Error => report.errors.push(SweepFailure {
                order_id: order.order_id,
                message: order.error.unwrap_or_default(),
            }),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscalhost_shared::types::Money;

    fn processed(status: SweepStatus, amount: Money, retries: u32) -> ProcessedOrder {
        ProcessedOrder::new(OrderId::new(), status, amount, retries)
    }

    #[test]
    fn test_group_processed_orders() {
        let usd = |a| Money::new(a, Currency::Usd);
        let results = vec![
            processed(SweepStatus::Success, usd(1000), 0),
            processed(SweepStatus::Success, Money::new(500, Currency::Eur), 0),
            processed(SweepStatus::Success, usd(250), 0),
            processed(SweepStatus::Failure, usd(700), 1),
            processed(SweepStatus::Failure, usd(300), 3),
            processed(SweepStatus::Deactivated, usd(100), 0),
            processed(SweepStatus::Skipped, usd(100), 0),
        ];

        let report = group_processed_orders(results, 3);

        assert_eq!(report.charged.len(), 3);
        assert_eq!(report.charged.totals[&Currency::Usd], 1250);
        assert_eq!(report.charged.totals[&Currency::Eur], 500);
        assert_eq!(report.past_due.len(), 1);
        assert_eq!(report.past_due.totals[&Currency::Usd], 700);
        assert_eq!(report.canceled.len(), 2);
        assert_eq!(report.canceled.totals[&Currency::Usd], 400);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.total(), 7);
    }

    #[test]
    fn test_errors_keep_message() {
        let mut failed = processed(SweepStatus::Error, Money::new(1, Currency::Usd), 0);
        failed.error = Some("Order not found".into());
        let report = group_processed_orders([failed], 3);
        assert_eq!(report.errors[0].message, "Order not found");
        assert!(report.charged.is_empty());
    }

    #[test]
    fn test_unconfirmed_charges_are_reported_apart() {
        let mut held = processed(SweepStatus::Unconfirmed, Money::new(1000, Currency::Usd), 0);
        held.error = Some("Storage error: connection reset".into());
        let report = group_processed_orders([held], 3);
        assert_eq!(report.unconfirmed[0].message, "Storage error: connection reset");
        assert!(report.errors.is_empty());
        assert!(report.charged.is_empty());
        assert_eq!(report.total(), 1);
    }

    #[test]
    fn test_report_serializes_currency_keys() {
        let report = group_processed_orders(
            [processed(SweepStatus::Success, Money::new(10, Currency::Nzd), 0)],
            3,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["charged"]["totals"]["NZD"], 10);
    }
}
