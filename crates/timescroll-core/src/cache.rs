//! Bounded cache of fetched windows keyed by `(zoom, range)`.
//!
//! Eviction is by insertion order, not by access: once the cache is full,
//! inserting a new key drops the key that was inserted first, however
//! recently it was read. Re-inserting an existing key replaces its value in
//! place and keeps its original position.
//!
//! The cache is a plain owned value. Each timeline holds its own instance,
//! so independent timelines never share eviction behaviour.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::model::{Event, TimeRange, Zoom};

/// Default number of windows kept.
pub const DEFAULT_CACHE_MAX_SIZE: usize = 5;

/// Structural key of a cached window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub zoom: Zoom,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CacheKey {
    #[must_use]
    pub const fn new(zoom: Zoom, range: &TimeRange) -> Self {
        Self {
            zoom,
            start: range.start(),
            end: range.end(),
        }
    }
}

/// The events of one window as they were at fetch time, with the paging
/// state that fetch left behind.
///
/// `offset_cursor` is the source offset the next forward page starts at. It
/// can exceed `events.len()` when the window was capped or a page repeated
/// an id, so it is stored rather than derived.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CachedWindow {
    pub events: Vec<Event>,
    pub total: usize,
    pub offset_cursor: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct RangeCache {
    capacity: usize,
    entries: IndexMap<CacheKey, CachedWindow>,
}

impl Default for RangeCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_MAX_SIZE)
    }
}

impl RangeCache {
    /// A cache holding at most `capacity` windows. A capacity of zero
    /// disables caching.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: IndexMap::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn get(&self, zoom: Zoom, range: &TimeRange) -> Option<&CachedWindow> {
        self.entries.get(&CacheKey::new(zoom, range))
    }

    /// Store a window, evicting the oldest-inserted entry when full.
    ///
    /// Returns the key that was evicted, if any.
    pub fn put(&mut self, zoom: Zoom, range: &TimeRange, window: CachedWindow) -> Option<CacheKey> {
        if self.capacity == 0 {
            return None;
        }

        let key = CacheKey::new(zoom, range);
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = window;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0).map(|(key, _)| key)
        } else {
            None
        };
        if let Some(evicted) = &evicted {
            tracing::debug!(
                zoom = %evicted.zoom,
                start = %evicted.start,
                "evicted oldest cached window"
            );
        }

        self.entries.insert(key, window);
        evicted
    }

    pub fn remove(&mut self, zoom: Zoom, range: &TimeRange) -> Option<CachedWindow> {
        self.entries.shift_remove(&CacheKey::new(zoom, range))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keys in insertion order, oldest first.
    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
