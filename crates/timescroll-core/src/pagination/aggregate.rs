//! Client-side monthly aggregation for year zoom.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

use crate::model::Event;

/// Most months a year view shows.
pub const MAX_MONTH_BUCKETS: usize = 12;

/// Group events by the `YYYY-MM` of their creation instant (UTC).
///
/// Returns one synthetic [`Event::month_bucket`] per month, newest month
/// first, keeping at most [`MAX_MONTH_BUCKETS`] of the most recent months.
#[must_use]
pub fn aggregate_by_month(events: &[Event]) -> Vec<Event> {
    let mut counts: BTreeMap<(i32, u32), u64> = BTreeMap::new();
    for event in events {
        let at = event.created_at;
        *counts.entry((at.year(), at.month())).or_default() += 1;
    }

    counts
        .into_iter()
        .rev()
        .filter_map(|((year, month), count)| {
            let first = NaiveDate::from_ymd_opt(year, month, 1)?
                .and_hms_opt(0, 0, 0)?
                .and_utc();
            let label = format!("{year:04}-{month:02}");
            Some(Event::month_bucket(&label, first, count))
        })
        .take(MAX_MONTH_BUCKETS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use chrono::{DateTime, TimeZone, Utc};

    fn event_at(id: &str, at: DateTime<Utc>) -> Event {
        Event {
            id: id.into(),
            created_at: at,
            role: Role::User,
            content_preview: String::new(),
            thread_id: "t".into(),
            thread_label: "T".into(),
            user_id: "u".into(),
            user_name: None,
            count: None,
        }
    }

    #[test]
    fn groups_by_month_newest_first() {
        let events = [
            event_at("a", Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap()),
            event_at("b", Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap()),
            event_at("c", Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap()),
        ];

        let buckets = aggregate_by_month(&events);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].id, "month_2024-02");
        assert_eq!(buckets[0].count, Some(1));
        assert_eq!(buckets[1].id, "month_2024-01");
        assert_eq!(buckets[1].count, Some(2));
        assert_eq!(
            buckets[1].created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn input_order_does_not_matter() {
        let a = event_at("a", Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap());
        let b = event_at("b", Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap());
        assert_eq!(
            aggregate_by_month(&[a.clone(), b.clone()]),
            aggregate_by_month(&[b, a])
        );
    }

    #[test]
    fn keeps_only_the_twelve_most_recent_months() {
        let events: Vec<_> = (1..=12)
            .map(|m| event_at("x", Utc.with_ymd_and_hms(2023, m, 10, 0, 0, 0).unwrap()))
            .chain(std::iter::once(event_at(
                "y",
                Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
            )))
            .collect();

        let buckets = aggregate_by_month(&events);
        assert_eq!(buckets.len(), MAX_MONTH_BUCKETS);
        assert_eq!(buckets[0].id, "month_2024-01");
        assert_eq!(buckets[11].id, "month_2023-02");
    }

    #[test]
    fn empty_input_yields_no_buckets() {
        assert!(aggregate_by_month(&[]).is_empty());
    }
}
