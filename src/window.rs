// src/window.rs
//! # Temporal Window
//! "Yesterday" recency test shared by the timeline and podcast digests.
//!
//! The window is `(now_floor - 1 day, now_floor]`, where `now_floor` is `now`
//! truncated to the start of its UTC calendar day. Upper bound inclusive, lower
//! bound exclusive.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Anything that carries a creation instant and can be windowed.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Start of the UTC calendar day containing `now`.
pub fn day_floor(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Naive timestamps carry no zone; they are taken as UTC.
pub fn naive_as_utc(ts: NaiveDateTime) -> DateTime<Utc> {
    ts.and_utc()
}

/// Midnight UTC of a day-precision date.
pub fn date_as_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub fn in_window(ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let upper = day_floor(now);
    let lower = upper - Duration::days(1);
    lower < ts && ts <= upper
}

/// Day-precision variant used for podcast release dates.
///
/// The date is placed at midnight UTC and run through [`in_window`], so only a
/// date equal to today's UTC date lands in the window; yesterday's date sits on
/// the exclusive lower bound. This matches how release dates have always been
/// compared and is kept on purpose until the intended semantics are confirmed.
pub fn date_in_window(date: NaiveDate, now: DateTime<Utc>) -> bool {
    in_window(date_as_utc(date), now)
}

/// Split items into `(in_window, other)`, keeping relative order in both halves.
pub fn partition<T: Timestamped>(items: Vec<T>, now: DateTime<Utc>) -> (Vec<T>, Vec<T>) {
    items
        .into_iter()
        .partition(|item| in_window(item.timestamp(), now))
}

/// How many overflow items may pad a digest: `max(0, target - primary)`.
pub fn overflow_cap(target_count: usize, primary_len: usize) -> usize {
    target_count.saturating_sub(primary_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, PartialEq)]
    struct Item(u32, DateTime<Utc>);

    impl Timestamped for Item {
        fn timestamp(&self) -> DateTime<Utc> {
            self.1
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap()
    }

    #[test]
    fn bounds_are_exclusive_below_inclusive_above() {
        let floor = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        assert!(in_window(floor, now()));
        assert!(!in_window(floor - Duration::days(1), now()));
        assert!(in_window(floor - Duration::days(1) + Duration::seconds(1), now()));
        assert!(!in_window(floor + Duration::seconds(1), now()));
    }

    #[test]
    fn naive_input_is_treated_as_utc() {
        let naive = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert!(in_window(naive_as_utc(naive), now()));
    }

    #[test]
    fn release_date_window_only_admits_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert!(date_in_window(today, now()));
        assert!(!date_in_window(yesterday, now()));
    }

    #[test]
    fn partition_keeps_order_and_totals() {
        let floor = day_floor(now());
        let items = vec![
            Item(1, floor - Duration::hours(1)),
            Item(2, floor - Duration::days(3)),
            Item(3, floor - Duration::hours(20)),
            Item(4, floor + Duration::hours(2)),
        ];
        let (hit, other) = partition(items, now());
        assert_eq!(hit.iter().map(|i| i.0).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(other.iter().map(|i| i.0).collect::<Vec<_>>(), vec![2, 4]);

        let (hit, other) = partition(Vec::<Item>::new(), now());
        assert!(hit.is_empty() && other.is_empty());
    }

    #[test]
    fn overflow_cap_saturates() {
        assert_eq!(overflow_cap(3, 2), 1);
        assert_eq!(overflow_cap(3, 5), 0);
        assert_eq!(overflow_cap(3, 0), 3);
    }
}
