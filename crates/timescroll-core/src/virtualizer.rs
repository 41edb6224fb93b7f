//! Windowing and prefetch decisions for a fixed-height list.
//!
//! Everything here is a pure function of its inputs or of a small piece of
//! owned scroll state. Nothing fails: degenerate inputs (zero or negative
//! heights, NaN, an empty list) yield an empty or clamped window.

use std::ops::Range;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::config::ViewportConfig;

/// Items rendered beyond each edge of the viewport.
pub const DEFAULT_BUFFER: usize = 5;

/// Indices of the items to materialize, `[start, end)`.
///
/// ```text
/// start = max(0, floor(scroll_top / item_height) - buffer)
/// end   = min(item_count, ceil((scroll_top + client_height) / item_height) + buffer)
/// ```
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn visible_range(
    scroll_top: f64,
    client_height: f64,
    item_height: f64,
    item_count: usize,
    buffer: usize,
) -> Range<usize> {
    if item_count == 0 || !item_height.is_finite() || item_height <= 0.0 {
        return 0..0;
    }
    // Overscroll above the top keeps its sign so both edges shift up.
    let top = if scroll_top.is_finite() { scroll_top } else { 0.0 };
    let height = if client_height.is_finite() { client_height.max(0.0) } else { 0.0 };
    let buffer = buffer as f64;

    let first = (top / item_height).floor() - buffer;
    let last = ((top + height) / item_height).ceil() + buffer;

    // `as` saturates for floats, so huge offsets clamp to usize::MAX.
    let end = (last.max(0.0) as usize).min(item_count);
    let start = (first.max(0.0) as usize).min(end);
    start..end
}

/// Scrollable height of `item_count` items.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn total_height(item_count: usize, item_height: f64) -> f64 {
    if !item_height.is_finite() || item_height <= 0.0 {
        return 0.0;
    }
    item_count as f64 * item_height
}

/// Pixel offset of the first item of `range`.
#[must_use]
pub fn offset_top(range: &Range<usize>, item_height: f64) -> f64 {
    total_height(range.start, item_height)
}

/// Thresholds deciding when scrolling should load more data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefetchPolicy {
    pub upper_fraction: f64,
    pub lower_fraction: f64,
    pub drag_threshold_px: f64,
    pub drag_hold: Duration,
}

impl Default for PrefetchPolicy {
    fn default() -> Self {
        Self::from(&ViewportConfig::default())
    }
}

impl From<&ViewportConfig> for PrefetchPolicy {
    fn from(config: &ViewportConfig) -> Self {
        Self {
            upper_fraction: config.prefetch_upper_fraction,
            lower_fraction: config.prefetch_lower_fraction,
            drag_threshold_px: config.drag_threshold_px,
            drag_hold: config.drag_hold(),
        }
    }
}

/// One scroll observation from the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSample {
    pub scroll_top: f64,
    pub client_height: f64,
    pub total_height: f64,
    pub at: Instant,
}

/// What the tracker asks the caller to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchSignal {
    None,
    /// Near the top while scrolling up: load older events.
    Previous,
    /// Near the bottom while scrolling down: load newer events.
    More,
}

/// Direction and drag state across consecutive scroll samples.
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    policy: PrefetchPolicy,
    last_top: Option<f64>,
    dragging_until: Option<Instant>,
}

impl ScrollTracker {
    #[must_use]
    pub const fn new(policy: PrefetchPolicy) -> Self {
        Self {
            policy,
            last_top: None,
            dragging_until: None,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &PrefetchPolicy {
        &self.policy
    }

    /// Whether a drag detected earlier still suppresses prefetching at `now`.
    #[must_use]
    pub fn is_dragging(&self, now: Instant) -> bool {
        self.dragging_until.is_some_and(|until| now < until)
    }

    /// Record a sample and decide whether to prefetch.
    ///
    /// The first sample only establishes a baseline. A jump larger than the
    /// drag threshold starts a drag window, and no signal is produced for
    /// that sample or any other inside the window.
    pub fn observe(&mut self, sample: ScrollSample, has_more: bool) -> PrefetchSignal {
        let top = sample.scroll_top;
        let Some(previous) = self.last_top.replace(top) else {
            return PrefetchSignal::None;
        };
        if !top.is_finite() || !previous.is_finite() {
            return PrefetchSignal::None;
        }

        let delta = top - previous;
        if delta.abs() > self.policy.drag_threshold_px {
            trace!(delta, "drag detected, suppressing prefetch");
            self.dragging_until = Some(sample.at + self.policy.drag_hold);
            return PrefetchSignal::None;
        }
        if self.is_dragging(sample.at) {
            return PrefetchSignal::None;
        }

        if delta < 0.0 && top < sample.total_height * self.policy.upper_fraction {
            PrefetchSignal::Previous
        } else if delta > 0.0
            && has_more
            && top + sample.client_height > sample.total_height * self.policy.lower_fraction
        {
            PrefetchSignal::More
        } else {
            PrefetchSignal::None
        }
    }

    /// Treat `scroll_top` as the new baseline without evaluating it, e.g.
    /// after the caller moved the viewport programmatically.
    pub const fn rebase(&mut self, scroll_top: f64) {
        self.last_top = Some(scroll_top);
    }

    /// Forget the baseline and any active drag.
    pub const fn reset(&mut self) {
        self.last_top = None;
        self.dragging_until = None;
    }
}

impl Default for ScrollTracker {
    fn default() -> Self {
        Self::new(PrefetchPolicy::default())
    }
}
