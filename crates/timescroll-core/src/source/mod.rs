//! The event source contract the pagination engine consumes.
//!
//! An [`EventSource`] answers one [`EventQuery`] at a time with a
//! [`QueryResponse`]: a page of events plus bookkeeping in [`ResponseMeta`].
//! Storage and indexing are the source's business; the browser relies only
//! on this contract.
//!
//! Two query shapes exist, modeled as [`QueryMode`]:
//!
//! - [`QueryMode::Page`]: offset/limit pagination in a requested order.
//! - [`QueryMode::Timestamps`]: every event in the range, unpaginated, for
//!   client-side monthly aggregation at year zoom. Only `id`, `created_at`
//!   and `role` are meaningful; sources may leave the display fields empty.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryEventSource;
pub use sqlite::SqliteEventSource;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Event, TimeRange, Zoom};

/// Upper bound on the page size a source will be asked for.
pub const MAX_PAGE_LIMIT: usize = 500;

/// Order in which a page query walks the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first.
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

/// Shape of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    Page {
        limit: usize,
        offset: usize,
        order: SortOrder,
    },
    Timestamps,
}

/// One request to an [`EventSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventQuery {
    pub range: TimeRange,
    pub zoom: Zoom,
    pub mode: QueryMode,
}

impl EventQuery {
    /// A paginated query. `limit` is clamped to [`MAX_PAGE_LIMIT`].
    #[must_use]
    pub fn page(range: TimeRange, zoom: Zoom, limit: usize, offset: usize, order: SortOrder) -> Self {
        Self {
            range,
            zoom,
            mode: QueryMode::Page {
                limit: limit.min(MAX_PAGE_LIMIT),
                offset,
                order,
            },
        }
    }

    /// An unpaginated query returning every event in `range`.
    #[must_use]
    pub const fn timestamps(range: TimeRange) -> Self {
        Self {
            range,
            zoom: Zoom::Year,
            mode: QueryMode::Timestamps,
        }
    }
}

/// Bookkeeping returned alongside a page of events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// Number of events in the whole range.
    pub total: usize,
    /// Number of events in this response.
    pub returned: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub zoom: Zoom,
}

impl ResponseMeta {
    /// Meta for a response carrying `returned` events out of `total`.
    #[must_use]
    pub fn for_query(query: &EventQuery, total: usize, returned: usize) -> Self {
        let (offset, limit, has_more) = match query.mode {
            QueryMode::Page { limit, offset, .. } => {
                (offset, limit, offset.saturating_add(returned) < total)
            }
            QueryMode::Timestamps => (0, returned, false),
        };
        Self {
            total,
            returned,
            offset,
            limit,
            has_more,
            start: query.range.start(),
            end: query.range.end(),
            zoom: query.zoom,
        }
    }
}

/// A page of events plus its meta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub events: Vec<Event>,
    pub meta: ResponseMeta,
}

impl QueryResponse {
    /// Parse a JSON response body.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Malformed`] if the body is not JSON, lacks an
    /// `events` array or a `meta` object, or any element fails to decode.
    pub fn from_json_str(body: &str) -> Result<Self, SourceError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| SourceError::Malformed(format!("response is not JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Validate and decode an already-parsed JSON response.
    ///
    /// # Errors
    ///
    /// See [`QueryResponse::from_json_str`].
    pub fn from_value(value: Value) -> Result<Self, SourceError> {
        let Value::Object(mut body) = value else {
            return Err(SourceError::Malformed("response is not an object".into()));
        };
        let events = match body.remove("events") {
            Some(events @ Value::Array(_)) => events,
            Some(_) => return Err(SourceError::Malformed("`events` is not an array".into())),
            None => return Err(SourceError::Malformed("missing `events` array".into())),
        };
        let Some(meta) = body.remove("meta") else {
            return Err(SourceError::Malformed("missing `meta` object".into()));
        };

        let events: Vec<Event> = serde_json::from_value(events)
            .map_err(|e| SourceError::Malformed(format!("bad event: {e}")))?;
        let meta: ResponseMeta = serde_json::from_value(meta)
            .map_err(|e| SourceError::Malformed(format!("bad meta: {e}")))?;
        Ok(Self { events, meta })
    }
}

/// Failure reported by an event source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The source could not be reached or the query failed.
    #[error("event source unavailable: {0}")]
    Unavailable(String),

    /// The source answered with data that does not fit the contract.
    #[error("malformed event source response: {0}")]
    Malformed(String),
}

/// Answers range and pagination queries over events.
pub trait EventSource {
    /// Run one query.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the query cannot be answered.
    fn query(&mut self, query: &EventQuery) -> Result<QueryResponse, SourceError>;
}

impl<T: EventSource + ?Sized> EventSource for &mut T {
    fn query(&mut self, query: &EventQuery) -> Result<QueryResponse, SourceError> {
        (**self).query(query)
    }
}

impl<T: EventSource + ?Sized> EventSource for Box<T> {
    fn query(&mut self, query: &EventQuery) -> Result<QueryResponse, SourceError> {
        (**self).query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_limit_is_clamped() {
        let range = TimeRange::new(
            "2024-01-01T00:00:00Z".parse().unwrap(),
            "2024-02-01T00:00:00Z".parse().unwrap(),
        )
        .unwrap();
        let query = EventQuery::page(range, Zoom::Month, 10_000, 0, SortOrder::Ascending);
        assert!(matches!(query.mode, QueryMode::Page { limit: 500, .. }));
    }

    #[test]
    fn from_value_rejects_missing_events() {
        let err = QueryResponse::from_value(json!({ "meta": {} })).unwrap_err();
        assert_eq!(err, SourceError::Malformed("missing `events` array".into()));

        let err = QueryResponse::from_value(json!({ "events": 3, "meta": {} })).unwrap_err();
        assert!(err.to_string().contains("not an array"));

        let err = QueryResponse::from_json_str("[]").unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn from_json_str_accepts_wire_shape() {
        let body = r#"{
            "events": [{
                "id": "e1",
                "createdAt": "2024-01-05T10:00:00Z",
                "role": "user",
                "contentPreview": "hi",
                "threadId": "t1",
                "threadLabel": "Thread",
                "userId": "u1",
                "userName": "Ana"
            }],
            "meta": {
                "total": 1, "returned": 1, "offset": 0, "limit": 100,
                "hasMore": false,
                "start": "2024-01-01T00:00:00Z", "end": "2024-02-01T00:00:00Z",
                "zoom": "month"
            }
        }"#;
        let response = QueryResponse::from_json_str(body).expect("valid body");
        assert_eq!(response.events.len(), 1);
        assert_eq!(response.events[0].user_name.as_deref(), Some("Ana"));
        assert_eq!(response.meta.zoom, Zoom::Month);
        assert!(!response.meta.has_more);
    }
}
