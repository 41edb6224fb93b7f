//! Bidirectional pagination over an [`EventSource`].
//!
//! [`PaginationEngine`] owns the in-memory window of events for the current
//! `(range, zoom)` and the bookkeeping needed to extend it at either end:
//!
//! - `offset_cursor`: how far forward paging has progressed through the
//!   range, with `0 <= offset_cursor <= total` at all times.
//! - `has_more`: whether a forward page remains.
//! - one in-flight flag per direction. A request for a direction that is
//!   already in flight is dropped, not queued.
//! - a generation counter bumped by every reset. Responses carrying an older
//!   generation are discarded on arrival, which serializes competing resets.
//!
//! # Two-phase fetches
//!
//! Each fetching operation is split so the caller decides how the query is
//! executed (inline, on an executor, across an IPC boundary):
//!
//! ```text
//! begin_load / begin_load_more / begin_load_previous  ->  FetchRequest
//! source.query(request.query())                        ->  Result<QueryResponse, _>
//! complete(request, result)                            ->  FetchOutcome
//! ```
//!
//! [`PaginationEngine::load_events`], [`PaginationEngine::load_more`] and
//! [`PaginationEngine::load_previous`] run both halves inline.
//!
//! # Window invariants
//!
//! Outside year zoom the window is sorted ascending by `created_at` and
//! never holds two events with the same id. It is soft-capped at
//! `max_loaded`: appending past the cap drops from the head, prepending
//! drops from the tail, so freshly fetched events always survive.
//!
//! Year zoom holds synthetic month buckets, newest first, and never pages.

pub mod aggregate;

pub use aggregate::{MAX_MONTH_BUCKETS, aggregate_by_month};

use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::cache::{CachedWindow, RangeCache};
use crate::config::PaginationConfig;
use crate::error::TimelineError;
use crate::model::{Event, TimeRange, Zoom};
use crate::source::{EventQuery, EventSource, QueryMode, QueryResponse, SortOrder, SourceError};
use crate::timing;

/// Which part of the window a fetch fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    /// Replace the window with the first page (or month buckets).
    Reset,
    /// Append the next page after `offset_cursor`.
    Forward,
    /// Prepend the page before `offset_cursor`.
    Backward,
}

impl FetchKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Forward => "forward",
            Self::Backward => "backward",
        }
    }

    const fn timing_name(self) -> &'static str {
        match self {
            Self::Reset => "fetch.reset",
            Self::Forward => "fetch.forward",
            Self::Backward => "fetch.backward",
        }
    }
}

/// Handle for a fetch that has been started but not yet completed.
///
/// Pass it back to [`PaginationEngine::complete`] with the query result, or
/// to [`PaginationEngine::abandon`] if the query will never run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an uncompleted request keeps its direction marked in flight"]
pub struct FetchRequest {
    generation: u64,
    kind: FetchKind,
    query: EventQuery,
}

impl FetchRequest {
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn kind(&self) -> FetchKind {
        self.kind
    }

    pub const fn query(&self) -> &EventQuery {
        &self.query
    }

    const fn offset(&self) -> usize {
        match self.query.mode {
            QueryMode::Page { offset, .. } => offset,
            QueryMode::Timestamps => 0,
        }
    }
}

/// What [`PaginationEngine::begin_load`] decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPlan {
    /// The window was served from the cache; nothing to fetch.
    CacheHit,
    Fetch(FetchRequest),
}

/// Result of a completed (or skipped) load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A response was merged. `received` counts events in the response,
    /// `added` those that were new to the window.
    Applied { received: usize, added: usize },
    /// The window came from the cache without a query.
    CacheHit,
    /// The operation was a no-op (nothing more to load, or already in flight).
    Skipped,
    /// The response belonged to a superseded load and was dropped.
    Discarded,
}

#[derive(Debug, Clone)]
pub struct PaginationEngine {
    page_size: usize,
    max_loaded: usize,
    cache: RangeCache,
    range: Option<TimeRange>,
    zoom: Zoom,
    events: Vec<Event>,
    offset_cursor: usize,
    total: usize,
    has_more: bool,
    generation: u64,
    reset_in_flight: bool,
    forward_in_flight: bool,
    backward_in_flight: bool,
    last_error: Option<TimelineError>,
}

impl PaginationEngine {
    /// Create an engine that stores fetched windows in `cache`.
    #[must_use]
    pub fn new(config: &PaginationConfig, cache: RangeCache) -> Self {
        Self {
            page_size: config.effective_page_size(),
            max_loaded: config.max_loaded.max(1),
            cache,
            range: None,
            zoom: Zoom::Day,
            events: Vec::new(),
            offset_cursor: 0,
            total: 0,
            has_more: false,
            generation: 0,
            reset_in_flight: false,
            forward_in_flight: false,
            backward_in_flight: false,
            last_error: None,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    #[must_use]
    pub const fn offset_cursor(&self) -> usize {
        self.offset_cursor
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.has_more
    }

    #[must_use]
    pub const fn range(&self) -> Option<TimeRange> {
        self.range
    }

    #[must_use]
    pub const fn zoom(&self) -> Zoom {
        self.zoom
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn is_resetting(&self) -> bool {
        self.reset_in_flight
    }

    #[must_use]
    pub const fn is_loading_more(&self) -> bool {
        self.forward_in_flight
    }

    #[must_use]
    pub const fn is_loading_previous(&self) -> bool {
        self.backward_in_flight
    }

    #[must_use]
    pub const fn cache(&self) -> &RangeCache {
        &self.cache
    }

    /// The error from the most recent failed fetch, if any.
    #[must_use]
    pub const fn last_error(&self) -> Option<&TimelineError> {
        self.last_error.as_ref()
    }

    /// Take the most recent error, e.g. after showing it once.
    pub fn take_error(&mut self) -> Option<TimelineError> {
        self.last_error.take()
    }

    // -----------------------------------------------------------------------
    // Phase one: start a fetch
    // -----------------------------------------------------------------------

    /// Point the engine at `(range, zoom)`.
    ///
    /// Always supersedes any outstanding fetch. With `reset = false` a cached
    /// window is installed directly; with `reset = true` the cache entry for
    /// the key is dropped and the first page is refetched.
    pub fn begin_load(&mut self, range: TimeRange, zoom: Zoom, reset: bool) -> LoadPlan {
        self.generation = self.generation.wrapping_add(1);
        self.range = Some(range);
        self.zoom = zoom;
        self.reset_in_flight = false;
        self.forward_in_flight = false;
        self.backward_in_flight = false;
        self.last_error = None;
        self.offset_cursor = 0;

        if reset {
            if self.cache.remove(zoom, &range).is_some() {
                debug!(%zoom, %range, "dropped cached window for reset");
            }
        } else if let Some(window) = self.cache.get(zoom, &range).cloned() {
            debug!(%zoom, %range, events = window.events.len(), "serving window from cache");
            self.install_cached(window);
            return LoadPlan::CacheHit;
        }

        self.events.clear();
        self.total = 0;
        self.has_more = false;
        self.reset_in_flight = true;

        let query = if zoom.is_aggregated() {
            EventQuery::timestamps(range)
        } else {
            EventQuery::page(range, zoom, self.page_size, 0, SortOrder::Ascending)
        };
        LoadPlan::Fetch(self.request(FetchKind::Reset, query))
    }

    /// Start fetching the page after `offset_cursor`.
    ///
    /// Returns `None` (a no-op) when nothing remains or a forward fetch is
    /// already in flight.
    pub fn begin_load_more(&mut self) -> Option<FetchRequest> {
        let range = self.range?;
        if !self.has_more || self.forward_in_flight {
            trace!(
                has_more = self.has_more,
                in_flight = self.forward_in_flight,
                "load_more dropped"
            );
            return None;
        }

        self.forward_in_flight = true;
        let query = EventQuery::page(
            range,
            self.zoom,
            self.page_size,
            self.offset_cursor,
            SortOrder::Ascending,
        );
        Some(self.request(FetchKind::Forward, query))
    }

    /// Start fetching the page ending at `offset_cursor`.
    ///
    /// Returns `None` (a no-op) when the cursor is at the start of the range
    /// or a backward fetch is already in flight.
    pub fn begin_load_previous(&mut self) -> Option<FetchRequest> {
        let range = self.range?;
        if self.offset_cursor == 0 || self.backward_in_flight {
            trace!(
                cursor = self.offset_cursor,
                in_flight = self.backward_in_flight,
                "load_previous dropped"
            );
            return None;
        }

        self.backward_in_flight = true;
        let previous_offset = self.offset_cursor.saturating_sub(self.page_size);
        let query = EventQuery::page(
            range,
            self.zoom,
            self.page_size,
            previous_offset,
            SortOrder::Ascending,
        );
        Some(self.request(FetchKind::Backward, query))
    }

    // -----------------------------------------------------------------------
    // Phase two: apply the result
    // -----------------------------------------------------------------------

    /// Apply the result of a fetch started with one of the `begin_*` calls.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::FetchFailed`] or
    /// [`TimelineError::InvalidResponseShape`] when the query failed or its
    /// response is unusable. A failed reset leaves the window empty; a failed
    /// continuation leaves the window, cursor, and `has_more` untouched.
    /// Stale responses are not errors: they yield [`FetchOutcome::Discarded`].
    pub fn complete(
        &mut self,
        request: FetchRequest,
        result: Result<QueryResponse, SourceError>,
    ) -> Result<FetchOutcome, TimelineError> {
        if let Err(stale) = self.ensure_current(&request) {
            debug!(kind = request.kind.as_str(), "{stale}");
            return Ok(FetchOutcome::Discarded);
        }
        self.clear_in_flight(request.kind);

        let response = match result
            .map_err(TimelineError::from)
            .and_then(|response| validate(&request, response))
        {
            Ok(response) => response,
            Err(err) => return Err(self.fail(request.kind, err)),
        };

        let outcome = match request.kind {
            FetchKind::Reset => self.apply_reset(response),
            FetchKind::Forward => self.apply_forward(response),
            FetchKind::Backward => self.apply_backward(request.offset(), response),
        };
        if let FetchOutcome::Applied { received, added } = outcome {
            debug!(
                kind = request.kind.as_str(),
                received,
                added,
                cursor = self.offset_cursor,
                total = self.total,
                loaded = self.events.len(),
                "applied page"
            );
        }
        Ok(outcome)
    }

    /// Give up on a request whose query will never run, freeing its direction.
    pub fn abandon(&mut self, request: FetchRequest) {
        if self.ensure_current(&request).is_ok() {
            self.clear_in_flight(request.kind);
        }
    }

    // -----------------------------------------------------------------------
    // Inline convenience wrappers
    // -----------------------------------------------------------------------

    /// Load `(range, zoom)`, querying `source` unless the cache can answer.
    ///
    /// # Errors
    ///
    /// See [`PaginationEngine::complete`].
    pub fn load_events<S: EventSource + ?Sized>(
        &mut self,
        source: &mut S,
        range: TimeRange,
        zoom: Zoom,
        reset: bool,
    ) -> Result<FetchOutcome, TimelineError> {
        match self.begin_load(range, zoom, reset) {
            LoadPlan::CacheHit => Ok(FetchOutcome::CacheHit),
            LoadPlan::Fetch(request) => self.execute(source, request),
        }
    }

    /// Append the next page from `source`.
    ///
    /// # Errors
    ///
    /// See [`PaginationEngine::complete`].
    pub fn load_more<S: EventSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<FetchOutcome, TimelineError> {
        match self.begin_load_more() {
            Some(request) => self.execute(source, request),
            None => Ok(FetchOutcome::Skipped),
        }
    }

    /// Prepend the previous page from `source`.
    ///
    /// # Errors
    ///
    /// See [`PaginationEngine::complete`].
    pub fn load_previous<S: EventSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<FetchOutcome, TimelineError> {
        match self.begin_load_previous() {
            Some(request) => self.execute(source, request),
            None => Ok(FetchOutcome::Skipped),
        }
    }

    /// Run `request` against `source` and apply the result.
    ///
    /// # Errors
    ///
    /// See [`PaginationEngine::complete`].
    pub fn execute<S: EventSource + ?Sized>(
        &mut self,
        source: &mut S,
        request: FetchRequest,
    ) -> Result<FetchOutcome, TimelineError> {
        let result = timing::timed(request.kind.timing_name(), || source.query(&request.query));
        self.complete(request, result)
    }

    /// Drop the window and all bookkeeping. The cache is kept.
    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.range = None;
        self.events.clear();
        self.offset_cursor = 0;
        self.total = 0;
        self.has_more = false;
        self.reset_in_flight = false;
        self.forward_in_flight = false;
        self.backward_in_flight = false;
        self.last_error = None;
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    const fn request(&self, kind: FetchKind, query: EventQuery) -> FetchRequest {
        FetchRequest {
            generation: self.generation,
            kind,
            query,
        }
    }

    fn ensure_current(&self, request: &FetchRequest) -> Result<(), TimelineError> {
        if request.generation == self.generation {
            Ok(())
        } else {
            Err(TimelineError::StaleRequest {
                request: request.generation,
                current: self.generation,
            })
        }
    }

    const fn clear_in_flight(&mut self, kind: FetchKind) {
        match kind {
            FetchKind::Reset => self.reset_in_flight = false,
            FetchKind::Forward => self.forward_in_flight = false,
            FetchKind::Backward => self.backward_in_flight = false,
        }
    }

    fn fail(&mut self, kind: FetchKind, err: TimelineError) -> TimelineError {
        warn!(kind = kind.as_str(), code = %err.code(), "fetch failed: {err}");
        if kind == FetchKind::Reset {
            self.events.clear();
            self.offset_cursor = 0;
            self.total = 0;
            self.has_more = false;
        }
        self.last_error = Some(err.clone());
        err
    }

    fn install_cached(&mut self, window: CachedWindow) {
        self.events = window.events;
        self.offset_cursor = window.offset_cursor;
        self.total = window.total.max(window.offset_cursor);
        self.has_more = window.has_more && self.offset_cursor < self.total;
    }

    fn apply_reset(&mut self, response: QueryResponse) -> FetchOutcome {
        let received = response.events.len();

        if self.zoom.is_aggregated() {
            self.events = aggregate_by_month(&response.events);
            self.offset_cursor = 0;
            self.total = self.events.len();
            self.has_more = false;
        } else {
            self.events = fresh_events(&[], response.events);
            self.cap_from_head();
            self.offset_cursor = received;
            self.total = response.meta.total.max(received);
            self.has_more = self.offset_cursor < self.total;
        }

        if let Some(range) = self.range {
            let window = CachedWindow {
                events: self.events.clone(),
                total: self.total,
                offset_cursor: self.offset_cursor,
                has_more: self.has_more,
            };
            self.cache.put(self.zoom, &range, window);
        }

        FetchOutcome::Applied {
            received,
            added: self.events.len(),
        }
    }

    fn apply_forward(&mut self, response: QueryResponse) -> FetchOutcome {
        let received = response.events.len();
        let fresh = fresh_events(&self.events, response.events);
        let added = fresh.len();

        self.events.extend(fresh);
        sort_by_time(&mut self.events);
        self.cap_from_head();

        self.offset_cursor = self.offset_cursor.saturating_add(received);
        self.total = response.meta.total.max(self.offset_cursor);
        self.has_more = received > 0 && self.offset_cursor < self.total;

        FetchOutcome::Applied { received, added }
    }

    fn apply_backward(&mut self, previous_offset: usize, response: QueryResponse) -> FetchOutcome {
        let received = response.events.len();
        let mut merged = fresh_events(&self.events, response.events);
        let added = merged.len();

        merged.append(&mut self.events);
        sort_by_time(&mut merged);
        merged.truncate(self.max_loaded);
        self.events = merged;

        self.offset_cursor = previous_offset;
        self.total = response.meta.total.max(self.offset_cursor);
        self.has_more = self.offset_cursor < self.total;

        FetchOutcome::Applied { received, added }
    }

    fn cap_from_head(&mut self) {
        if self.events.len() > self.max_loaded {
            let excess = self.events.len() - self.max_loaded;
            self.events.drain(..excess);
        }
    }
}

/// Reject responses that break the query contract.
fn validate(request: &FetchRequest, response: QueryResponse) -> Result<QueryResponse, TimelineError> {
    if let QueryMode::Page { limit, .. } = request.query.mode {
        if response.events.len() > limit {
            return Err(TimelineError::InvalidResponseShape(format!(
                "source returned {} events for a page limit of {limit}",
                response.events.len()
            )));
        }
    }
    Ok(response)
}

/// Events from `page` whose ids are neither in `existing` nor repeated
/// within the page, sorted ascending by creation time.
fn fresh_events(existing: &[Event], page: Vec<Event>) -> Vec<Event> {
    let known: HashSet<&str> = existing.iter().map(|e| e.id.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::with_capacity(page.len());
    let mut fresh: Vec<Event> = page
        .into_iter()
        .filter(|event| !known.contains(event.id.as_str()) && seen.insert(event.id.clone()))
        .collect();
    sort_by_time(&mut fresh);
    fresh
}

/// Stable sort, so events sharing an instant keep their arrival order.
fn sort_by_time(events: &mut [Event]) {
    events.sort_by(|a, b| a.created_at.cmp(&b.created_at));
}
