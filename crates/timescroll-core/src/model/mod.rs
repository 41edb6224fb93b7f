//! Data model for the timeline browser.
//!
//! - [`Event`]: an immutable timestamped record as returned by an event source
//! - [`TimeRange`] and [`Zoom`]: what is queried, and at which granularity
//! - [`Resolution`]: how densely the loaded events are drawn

pub mod event;
pub mod range;
pub mod resolution;

pub use event::{Event, PREVIEW_MAX_CHARS, Role, UnknownRole, truncate_preview};
pub use range::{TimeRange, UnknownZoom, Zoom};
pub use resolution::{ITEM_HEIGHTS, Resolution};
