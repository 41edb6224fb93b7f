//! Composition root tying pagination, windowing, and density together.

use std::ops::Range;
use std::time::Instant;

use tracing::debug;

use crate::cache::RangeCache;
use crate::config::TimelineConfig;
use crate::density::{center_index, transition_scroll_top};
use crate::error::TimelineError;
use crate::model::{Event, Resolution, TimeRange, Zoom};
use crate::pagination::{FetchOutcome, PaginationEngine};
use crate::source::EventSource;
use crate::virtualizer::{
    PrefetchPolicy, PrefetchSignal, ScrollSample, ScrollTracker, offset_top, total_height,
    visible_range,
};

/// The slice of loaded events the rendering layer should materialize.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleWindow<'a> {
    /// Indices into [`TimelineController::events`].
    pub range: Range<usize>,
    pub events: &'a [Event],
    pub item_height: f64,
    /// Height of the whole scrollable list.
    pub total_height: f64,
    /// Pixel offset at which `events[0]` is drawn.
    pub offset_top: f64,
}

/// A browsable timeline over one [`EventSource`].
///
/// Range and zoom are data concerns: changing either fetches. Resolution is
/// a rendering concern: changing it only remaps the scroll offset.
///
/// Each controller owns its own [`RangeCache`], so two timelines never
/// evict each other's windows.
#[derive(Debug)]
pub struct TimelineController<S> {
    source: S,
    engine: PaginationEngine,
    tracker: ScrollTracker,
    zoom: Zoom,
    resolution: Resolution,
    buffer: usize,
}

impl<S: EventSource> TimelineController<S> {
    #[must_use]
    pub fn new(source: S, config: &TimelineConfig) -> Self {
        Self::with_cache(source, config, RangeCache::new(config.cache.max_entries))
    }

    /// Build a controller around a caller-supplied cache.
    #[must_use]
    pub fn with_cache(source: S, config: &TimelineConfig, cache: RangeCache) -> Self {
        Self {
            source,
            engine: PaginationEngine::new(&config.pagination, cache),
            tracker: ScrollTracker::new(PrefetchPolicy::from(&config.viewport)),
            zoom: Zoom::Day,
            resolution: config.viewport.default_resolution,
            buffer: config.viewport.buffer,
        }
    }

    // -----------------------------------------------------------------------
    // Data operations
    // -----------------------------------------------------------------------

    /// Show `range` at the current zoom, refetching from the start.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; the window is left empty.
    pub fn set_range(&mut self, range: TimeRange) -> Result<FetchOutcome, TimelineError> {
        debug!(%range, zoom = %self.zoom, "range changed");
        self.reload(range, self.zoom, true)
    }

    /// Switch zoom, refetching the current range from the start.
    ///
    /// Before any range is set this only records the zoom.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; the window is left empty.
    pub fn set_zoom(&mut self, zoom: Zoom) -> Result<FetchOutcome, TimelineError> {
        self.zoom = zoom;
        let Some(range) = self.engine.range() else {
            return Ok(FetchOutcome::Skipped);
        };
        debug!(%range, %zoom, "zoom changed");
        self.reload(range, zoom, true)
    }

    /// Show `(range, zoom)`, reusing a cached window when one exists.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when the window was not cached.
    pub fn navigate(&mut self, range: TimeRange, zoom: Zoom) -> Result<FetchOutcome, TimelineError> {
        self.zoom = zoom;
        self.reload(range, zoom, false)
    }

    /// Refetch the current window, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::NoRange`] before any range is set, otherwise
    /// the fetch error.
    pub fn refresh(&mut self) -> Result<FetchOutcome, TimelineError> {
        let range = self.engine.range().ok_or(TimelineError::NoRange)?;
        self.reload(range, self.zoom, true)
    }

    /// Append the next page. A no-op when nothing remains.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; loaded events are kept.
    pub fn load_more(&mut self) -> Result<FetchOutcome, TimelineError> {
        self.engine.load_more(&mut self.source)
    }

    /// Prepend the previous page. A no-op at the start of the range.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; loaded events are kept.
    pub fn load_previous(&mut self) -> Result<FetchOutcome, TimelineError> {
        self.engine.load_previous(&mut self.source)
    }

    fn reload(
        &mut self,
        range: TimeRange,
        zoom: Zoom,
        reset: bool,
    ) -> Result<FetchOutcome, TimelineError> {
        self.tracker.reset();
        self.engine.load_events(&mut self.source, range, zoom, reset)
    }

    // -----------------------------------------------------------------------
    // Rendering operations
    // -----------------------------------------------------------------------

    /// Change density without fetching.
    pub const fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    /// Switch density from `old` to `new` and return the scroll offset that
    /// keeps the centered event centered.
    pub fn on_resolution_change(
        &mut self,
        old: Resolution,
        new: Resolution,
        scroll_top: f64,
        client_height: f64,
    ) -> f64 {
        let new_top = transition_scroll_top(old, new, scroll_top, client_height);
        self.resolution = new;
        if old != new {
            self.tracker.rebase(new_top);
            debug!(from = %old, to = %new, scroll_top, new_top, "resolution changed");
        }
        new_top
    }

    /// Events to render for the given viewport.
    #[must_use]
    pub fn get_visible_window(&self, scroll_top: f64, client_height: f64) -> VisibleWindow<'_> {
        let item_height = self.resolution.item_height();
        let events = self.engine.events();
        let range = visible_range(scroll_top, client_height, item_height, events.len(), self.buffer);
        VisibleWindow {
            events: &events[range.clone()],
            item_height,
            total_height: total_height(events.len(), item_height),
            offset_top: offset_top(&range, item_height),
            range,
        }
    }

    /// Feed a scroll sample and run whatever prefetch it triggers.
    ///
    /// # Errors
    ///
    /// Returns the error of a triggered fetch; loaded events are kept.
    pub fn on_scroll(
        &mut self,
        scroll_top: f64,
        client_height: f64,
        at: Instant,
    ) -> Result<FetchOutcome, TimelineError> {
        let sample = ScrollSample {
            scroll_top,
            client_height,
            total_height: total_height(self.engine.events().len(), self.resolution.item_height()),
            at,
        };
        match self.tracker.observe(sample, self.engine.has_more()) {
            PrefetchSignal::None => Ok(FetchOutcome::Skipped),
            PrefetchSignal::Previous => self.load_previous(),
            PrefetchSignal::More => self.load_more(),
        }
    }

    /// The event at the vertical center of the viewport.
    #[must_use]
    pub fn anchor(&self, scroll_top: f64, client_height: f64) -> Option<&Event> {
        let index = center_index(scroll_top, client_height, self.resolution.item_height());
        self.engine.events().get(index)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn events(&self) -> &[Event] {
        self.engine.events()
    }

    #[must_use]
    pub const fn range(&self) -> Option<TimeRange> {
        self.engine.range()
    }

    #[must_use]
    pub const fn zoom(&self) -> Zoom {
        self.zoom
    }

    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.engine.has_more()
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.engine.total()
    }

    #[must_use]
    pub const fn offset_cursor(&self) -> usize {
        self.engine.offset_cursor()
    }

    #[must_use]
    pub const fn last_error(&self) -> Option<&TimelineError> {
        self.engine.last_error()
    }

    pub fn take_error(&mut self) -> Option<TimelineError> {
        self.engine.take_error()
    }

    #[must_use]
    pub const fn engine(&self) -> &PaginationEngine {
        &self.engine
    }

    /// Direct engine access for callers driving fetches in two phases.
    pub const fn engine_mut(&mut self) -> &mut PaginationEngine {
        &mut self.engine
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    pub const fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}
