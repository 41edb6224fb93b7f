//! timescroll-core library.
//!
//! A time-windowed event browser: pick a calendar range and zoom, page
//! through the events inside it in both directions, and render only the
//! rows the viewport can show at one of five densities.
//!
//! # Conventions
//!
//! - **Errors**: [`TimelineError`] for timeline operations, `anyhow::Result`
//!   for file and database setup.
//! - **Logging**: `tracing` macros (`debug!` for fetch lifecycle, `warn!`
//!   for failed fetches, `trace!` for dropped requests).

#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod controller;
pub mod density;
pub mod error;
pub mod model;
pub mod pagination;
pub mod source;
pub mod timing;
pub mod virtualizer;

pub use cache::{CacheKey, CachedWindow, RangeCache};
pub use config::{TimelineConfig, load_config, load_project_config};
pub use controller::{TimelineController, VisibleWindow};
pub use error::{ErrorCode, TimelineError};
pub use model::{Event, Resolution, Role, TimeRange, Zoom};
pub use pagination::{FetchKind, FetchOutcome, FetchRequest, LoadPlan, PaginationEngine};
pub use source::{
    EventQuery, EventSource, MemoryEventSource, QueryMode, QueryResponse, ResponseMeta,
    SortOrder, SourceError, SqliteEventSource,
};
