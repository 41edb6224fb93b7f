use std::collections::HashSet;

use proptest::prelude::*;
use timescroll_core::config::PaginationConfig;
use timescroll_core::density::remap_scroll_top;
use timescroll_core::virtualizer::visible_range;
use timescroll_core::{
    FetchOutcome, MemoryEventSource, PaginationEngine, RangeCache, SourceError, Zoom,
};

#[path = "generators.rs"]
mod generators;
use generators::*;

fn engine(page_size: usize, max_loaded: usize) -> PaginationEngine {
    PaginationEngine::new(
        &PaginationConfig {
            page_size,
            max_loaded,
        },
        RangeCache::default(),
    )
}

fn check_window(eng: &PaginationEngine, max_loaded: usize) -> Result<(), TestCaseError> {
    let events = eng.events();
    prop_assert!(
        events.windows(2).all(|w| w[0].created_at <= w[1].created_at),
        "window not sorted"
    );
    let ids: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();
    prop_assert_eq!(ids.len(), events.len(), "duplicate ids in window");
    prop_assert!(eng.offset_cursor() <= eng.total());
    prop_assert!(events.len() <= max_loaded);
    prop_assert_eq!(eng.has_more(), eng.offset_cursor() < eng.total());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn forward_paging_keeps_window_sorted_and_unique(
        events in arb_events(300),
        page_size in 1usize..60,
        max_loaded in 1usize..200,
        steps in 0usize..12,
    ) {
        let mut src = MemoryEventSource::new(events);
        let mut eng = engine(page_size, max_loaded);
        eng.load_events(&mut src, may(), Zoom::Month, true).unwrap();
        check_window(&eng, max_loaded)?;

        for _ in 0..steps {
            eng.load_more(&mut src).unwrap();
            check_window(&eng, max_loaded)?;
        }
    }

    #[test]
    fn mixed_paging_never_duplicates(
        events in arb_events(300),
        page_size in 1usize..60,
        forward in prop::collection::vec(any::<bool>(), 0..24),
    ) {
        let mut src = MemoryEventSource::new(events);
        let mut eng = engine(page_size, 500);
        eng.load_events(&mut src, may(), Zoom::Week, true).unwrap();

        for step in forward {
            if step {
                eng.load_more(&mut src).unwrap();
            } else {
                eng.load_previous(&mut src).unwrap();
            }
            check_window(&eng, 500)?;
        }
    }

    #[test]
    fn full_forward_scan_loads_every_event(
        events in arb_events(200),
        page_size in 1usize..40,
    ) {
        let expected = events.len();
        let mut src = MemoryEventSource::new(events);
        let mut eng = engine(page_size, 500);
        eng.load_events(&mut src, may(), Zoom::Day, true).unwrap();
        while eng.has_more() {
            eng.load_more(&mut src).unwrap();
        }
        prop_assert_eq!(eng.events().len(), expected);
        prop_assert_eq!(eng.offset_cursor(), expected);
    }

    #[test]
    fn failed_load_more_changes_nothing(
        events in arb_events(200),
        page_size in 1usize..40,
        warmup in 0usize..4,
    ) {
        let mut src = MemoryEventSource::new(events);
        let mut eng = engine(page_size, 500);
        eng.load_events(&mut src, may(), Zoom::Month, true).unwrap();
        for _ in 0..warmup {
            eng.load_more(&mut src).unwrap();
        }

        let before = (eng.events().to_vec(), eng.offset_cursor(), eng.has_more());
        src.fail_next(SourceError::Unavailable("injected".into()));
        let result = eng.load_more(&mut src);
        if before.2 {
            prop_assert!(result.is_err());
        } else {
            prop_assert_eq!(result, Ok(FetchOutcome::Skipped));
        }
        prop_assert_eq!((eng.events().to_vec(), eng.offset_cursor(), eng.has_more()), before);
    }

    #[test]
    fn failed_load_previous_changes_nothing(
        events in arb_events(200),
        page_size in 1usize..40,
        warmup in 0usize..4,
    ) {
        let mut src = MemoryEventSource::new(events);
        let mut eng = engine(page_size, 500);
        eng.load_events(&mut src, may(), Zoom::Month, true).unwrap();
        for _ in 0..warmup {
            eng.load_more(&mut src).unwrap();
        }

        let before = (eng.events().to_vec(), eng.offset_cursor(), eng.has_more());
        src.fail_next(SourceError::Unavailable("injected".into()));
        let result = eng.load_previous(&mut src);
        if before.1 > 0 {
            prop_assert!(result.is_err());
        } else {
            prop_assert_eq!(result, Ok(FetchOutcome::Skipped));
        }
        prop_assert_eq!((eng.events().to_vec(), eng.offset_cursor(), eng.has_more()), before);
        prop_assert!(!eng.is_loading_previous());
    }

    #[test]
    fn visible_range_is_total(
        scroll_top in any::<f64>(),
        client_height in any::<f64>(),
        item_height in any::<f64>(),
        item_count in 0usize..100_000,
        buffer in 0usize..64,
    ) {
        let range = visible_range(scroll_top, client_height, item_height, item_count, buffer);
        prop_assert!(range.start <= range.end);
        prop_assert!(range.end <= item_count);
    }

    #[test]
    fn remapped_offset_is_never_negative(
        scroll_top in 0.0f64..1e7,
        client_height in 0.0f64..4000.0,
        from in prop::sample::select(vec![120.0, 90.0, 60.0, 40.0, 30.0]),
        to in prop::sample::select(vec![120.0, 90.0, 60.0, 40.0, 30.0]),
    ) {
        let top = remap_scroll_top(scroll_top, client_height, from, to);
        prop_assert!(top >= 0.0);
        prop_assert!(top.is_finite());
    }
}
