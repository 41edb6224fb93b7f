//! Shared fixtures and proptest strategies for the integration tests.
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use timescroll_core::{Event, Role, TimeRange, Zoom};

/// Minutes in May 2024.
pub const MAY_MINUTES: i64 = 31 * 24 * 60;

pub fn may_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

pub fn may() -> TimeRange {
    TimeRange::containing(may_start(), Zoom::Month).unwrap()
}

pub fn event(seq: usize, minute: i64, role: Role) -> Event {
    Event {
        id: format!("evt-{seq:05}"),
        created_at: may_start() + Duration::minutes(minute),
        role,
        content_preview: format!("message {seq}"),
        thread_id: format!("thread-{}", seq % 7),
        thread_label: format!("Thread {}", seq % 7),
        user_id: format!("user-{}", seq % 3),
        user_name: (seq % 2 == 0).then(|| format!("User {}", seq % 3)),
        count: None,
    }
}

/// `n` events one minute apart starting at the top of May.
pub fn sequential(n: usize) -> Vec<Event> {
    (0..n)
        .map(|seq| event(seq, i64::try_from(seq).unwrap(), Role::User))
        .collect()
}

/// Events scattered over May, possibly sharing timestamps.
pub fn arb_events(max: usize) -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec((0..MAY_MINUTES, 0usize..3), 0..max).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(seq, (minute, role))| event(seq, minute, Role::ALL[role]))
            .collect()
    })
}
