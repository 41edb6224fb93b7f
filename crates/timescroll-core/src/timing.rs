//! Opt-in latency sampling for event source queries.
//!
//! Samples go into a thread-local buffer, which fits the single-threaded
//! controller: every query the timeline issues runs on the thread that owns
//! it. Enable with `TIMESCROLL_TIMING=1` or [`set_timing_enabled`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Latency statistics per operation name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimingReport {
    pub operations: Vec<OpTiming>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpTiming {
    pub name: String,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub count: usize,
}

thread_local! {
    static SAMPLES: RefCell<BTreeMap<String, Vec<Duration>>> = const { RefCell::new(BTreeMap::new()) };
}

static TIMING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Returns true when `TIMESCROLL_TIMING` is set to `1`, `true`, `yes`, or `on`.
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var("TIMESCROLL_TIMING").is_ok_and(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

pub fn set_timing_enabled(enabled: bool) {
    TIMING_ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        clear_timings();
    }
}

#[must_use]
pub fn is_timing_enabled() -> bool {
    TIMING_ENABLED.load(Ordering::Relaxed)
}

pub fn clear_timings() {
    SAMPLES.with(|samples| samples.borrow_mut().clear());
}

/// Run `f`, recording its duration under `name` when timing is enabled.
pub fn timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    if !is_timing_enabled() {
        return f();
    }

    let started = Instant::now();
    let result = f();
    let elapsed = started.elapsed();
    SAMPLES.with(|samples| {
        samples
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(elapsed);
    });
    result
}

/// Drain this thread's samples into a report.
#[must_use]
pub fn collect_report() -> TimingReport {
    let grouped = SAMPLES.with(|samples| std::mem::take(&mut *samples.borrow_mut()));

    let operations = grouped
        .into_iter()
        .map(|(name, mut values)| {
            values.sort_unstable();
            OpTiming {
                p50: percentile(&values, 50),
                p95: percentile(&values, 95),
                p99: percentile(&values, 99),
                count: values.len(),
                name,
            }
        })
        .collect();

    TimingReport { operations }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Render one line per operation, e.g. `fetch.forward  n=3  p50=1.2ms ...`.
    #[must_use]
    pub fn to_text(&self) -> String {
        let width = self
            .operations
            .iter()
            .map(|op| op.name.len())
            .max()
            .unwrap_or(0);
        self.operations
            .iter()
            .map(|op| {
                format!(
                    "{:<width$}  n={}  p50={:?}  p95={:?}  p99={:?}",
                    op.name, op.count, op.p50, op.p95, op.p99
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Nearest-rank percentile over sorted samples.
fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}
