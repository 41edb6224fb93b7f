//! End-to-end flows through `TimelineController` against both event sources.

use std::time::{Duration, Instant};

use timescroll_core::config::TimelineConfig;
use timescroll_core::{
    EventSource, FetchKind, FetchOutcome, LoadPlan, MemoryEventSource, RangeCache, Resolution,
    SourceError, SqliteEventSource, TimeRange, TimelineController, TimelineError, Zoom,
};

#[path = "generators.rs"]
mod generators;
use generators::*;

fn config(page_size: usize) -> TimelineConfig {
    let mut config = TimelineConfig::default();
    config.pagination.page_size = page_size;
    config
}

fn sqlite_with(events: &[timescroll_core::Event]) -> SqliteEventSource {
    let mut store = SqliteEventSource::open_in_memory().expect("open store");
    store.insert_all(events).expect("insert");
    store
}

#[test]
fn browse_month_forward_then_back() {
    let events = sequential(250);
    let mut ctl = TimelineController::new(MemoryEventSource::new(events), &config(100));
    ctl.set_zoom(Zoom::Month).unwrap();
    ctl.set_range(may()).unwrap();

    assert_eq!(ctl.events().len(), 100);
    assert_eq!(ctl.total(), 250);

    ctl.load_more().unwrap();
    ctl.load_more().unwrap();
    assert_eq!(ctl.events().len(), 250);
    assert_eq!(ctl.offset_cursor(), 250);
    assert!(!ctl.has_more());

    let outcome = ctl.load_previous().unwrap();
    assert_eq!(outcome, FetchOutcome::Applied { received: 100, added: 0 });
    assert_eq!(ctl.offset_cursor(), 150);
    assert!(ctl.has_more());
}

#[test]
fn sqlite_source_drives_the_same_flow() {
    let events = sequential(230);
    let mut ctl = TimelineController::new(sqlite_with(&events), &config(100));
    ctl.set_zoom(Zoom::Month).unwrap();
    ctl.set_range(may()).unwrap();
    assert_eq!(ctl.total(), 230);
    assert_eq!(ctl.events()[0].id, "evt-00000");

    while ctl.has_more() {
        ctl.load_more().unwrap();
    }
    assert_eq!(ctl.events().len(), 230);
    assert_eq!(ctl.events().last().map(|e| e.id.as_str()), Some("evt-00229"));
}

#[test]
fn year_zoom_over_sqlite_aggregates_months() {
    let mut events = sequential(3);
    let extra = event(3, 45 * 24 * 60, timescroll_core::Role::System);
    events.push(extra);
    let store = sqlite_with(&events);

    let year = TimeRange::containing(may_start(), Zoom::Year).unwrap();
    let mut ctl = TimelineController::new(store, &config(100));
    ctl.navigate(year, Zoom::Year).unwrap();

    let ids: Vec<&str> = ctl.events().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["month_2024-06", "month_2024-05"]);
    assert_eq!(ctl.events()[1].count, Some(3));
    assert!(!ctl.has_more());
    assert_eq!(ctl.load_more().unwrap(), FetchOutcome::Skipped);
}

#[test]
fn overlapping_resets_apply_only_the_latest() {
    let mut ctl = TimelineController::new(MemoryEventSource::new(sequential(40)), &config(10));
    let june = may().step(Zoom::Month, 1).unwrap();

    let LoadPlan::Fetch(first) = ctl.engine_mut().begin_load(may(), Zoom::Month, true) else {
        panic!("nothing cached yet");
    };
    let LoadPlan::Fetch(second) = ctl.engine_mut().begin_load(june, Zoom::Month, true) else {
        panic!("nothing cached yet");
    };
    assert_eq!(first.kind(), FetchKind::Reset);
    assert!(second.generation() > first.generation());

    // Resolve in reverse order: the newer reset lands first.
    let second_result = ctl.source_mut().query(second.query());
    let first_result = ctl.source_mut().query(first.query());
    ctl.engine_mut().complete(second, second_result).unwrap();
    let late = ctl.engine_mut().complete(first, first_result).unwrap();

    assert_eq!(late, FetchOutcome::Discarded);
    assert_eq!(ctl.range(), Some(june));
    assert!(ctl.events().is_empty());
    assert!(ctl.last_error().is_none());
}

#[test]
fn cache_is_injected_and_bounded() {
    let mut ctl = TimelineController::with_cache(
        MemoryEventSource::new(sequential(5)),
        &config(10),
        RangeCache::new(2),
    );
    let days: Vec<TimeRange> = (0..3)
        .map(|n| {
            TimeRange::containing(may_start() + chrono::Duration::days(n), Zoom::Day).unwrap()
        })
        .collect();

    for day in &days {
        ctl.navigate(*day, Zoom::Day).unwrap();
    }
    assert_eq!(ctl.engine().cache().len(), 2);
    // The first day was evicted, so revisiting it queries again.
    let before = ctl.source().query_count();
    ctl.navigate(days[0], Zoom::Day).unwrap();
    assert_eq!(ctl.source().query_count(), before + 1);
    // The third day is still cached.
    assert_eq!(ctl.navigate(days[2], Zoom::Day).unwrap(), FetchOutcome::CacheHit);
}

#[test]
fn reset_failure_empties_window_and_reports() {
    let mut ctl = TimelineController::new(MemoryEventSource::new(sequential(20)), &config(10));
    ctl.set_range(may()).unwrap();
    assert_eq!(ctl.events().len(), 10);

    ctl.source_mut().fail_next(SourceError::Unavailable("connection reset".into()));
    let err = ctl.refresh().unwrap_err();
    assert!(matches!(err, TimelineError::FetchFailed(_)));
    assert_eq!(err.code().code(), "E3001");
    assert!(ctl.events().is_empty());
    assert!(!ctl.has_more());
}

#[test]
fn scrolling_through_a_drag_does_not_prefetch() {
    let mut ctl = TimelineController::new(MemoryEventSource::new(sequential(300)), &config(100));
    ctl.set_range(may()).unwrap();
    ctl.set_resolution(Resolution::MOST_COMPACT);
    // 100 rows * 30px = 3000px.
    let start = Instant::now();
    ctl.on_scroll(0.0, 400.0, start).unwrap();

    // Thumb drag straight to the bottom.
    assert_eq!(ctl.on_scroll(2600.0, 400.0, start).unwrap(), FetchOutcome::Skipped);
    assert_eq!(
        ctl.on_scroll(2650.0, 400.0, start + Duration::from_millis(50)).unwrap(),
        FetchOutcome::Skipped
    );
    assert_eq!(ctl.source().query_count(), 1);

    // Organic scrolling after the hold window resumes prefetching.
    let outcome = ctl
        .on_scroll(2700.0, 400.0, start + Duration::from_millis(400))
        .unwrap();
    assert!(matches!(outcome, FetchOutcome::Applied { received: 100, .. }));
}

#[test]
fn resolution_round_trip_keeps_anchor() {
    let mut ctl = TimelineController::new(MemoryEventSource::new(sequential(100)), &config(100));
    ctl.set_range(may()).unwrap();
    ctl.set_resolution(Resolution::MOST_DETAILED);

    let anchor = ctl.anchor(1200.0, 600.0).map(|e| e.id.clone());
    let top = ctl.on_resolution_change(
        Resolution::MOST_DETAILED,
        Resolution::MOST_COMPACT,
        1200.0,
        600.0,
    );
    assert!((top - 60.0).abs() < f64::EPSILON);
    assert_eq!(ctl.anchor(top, 600.0).map(|e| e.id.clone()), anchor);
}
