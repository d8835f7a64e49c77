//! Property-based tests for the charge date rules.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use proptest::prelude::*;

use super::dates::next_period_start;
use super::types::Interval;

/// Strategy to generate anchors between 2000 and 2099 at any time of day.
fn anchor() -> impl Strategy<Value = DateTime<Utc>> {
    (2000i32..2100, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60)
        .prop_map(|(y, m, d, h, min)| Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap())
}

fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i32 {
    (to.year() - from.year()) * 12 + i32::try_from(to.month()).unwrap() - i32::try_from(from.month()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every period starts on the first of a month at midnight.
    #[test]
    fn prop_period_starts_first_of_month(at in anchor(), yearly in any::<bool>()) {
        let interval = if yearly { Interval::Year } else { Interval::Month };
        let next = next_period_start(at, interval).unwrap();
        prop_assert_eq!(next.day(), 1);
        prop_assert_eq!(next.num_seconds_from_midnight(), 0);
        prop_assert!(next > at);
    }

    /// Monthly anchors before the 15th advance one month, later ones two.
    #[test]
    fn prop_monthly_gap(at in anchor()) {
        let next = next_period_start(at, Interval::Month).unwrap();
        let expected = if at.day() < 15 { 1 } else { 2 };
        prop_assert_eq!(months_between(at, next), expected);
    }

    /// Yearly anchors advance twelve months, or thirteen from the 15th on.
    #[test]
    fn prop_yearly_gap(at in anchor()) {
        let next = next_period_start(at, Interval::Year).unwrap();
        let expected = if at.day() < 15 { 12 } else { 13 };
        prop_assert_eq!(months_between(at, next), expected);
    }
}
