//! In-memory [`EventSource`] used by tests, demos, and embedding callers.

use std::collections::VecDeque;

use super::{EventQuery, EventSource, QueryMode, QueryResponse, ResponseMeta, SortOrder, SourceError};
use crate::model::Event;

/// An event source over a `Vec<Event>` held in memory.
///
/// Supports failure injection: errors queued with [`MemoryEventSource::fail_next`]
/// are returned, in order, by the next queries instead of data.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSource {
    events: Vec<Event>,
    failures: VecDeque<SourceError>,
    queries: Vec<EventQuery>,
}

impl MemoryEventSource {
    #[must_use]
    pub fn new(mut events: Vec<Event>) -> Self {
        sort_ascending(&mut events);
        Self {
            events,
            failures: VecDeque::new(),
            queries: Vec::new(),
        }
    }

    pub fn insert(&mut self, event: Event) {
        let at = self
            .events
            .partition_point(|existing| existing.created_at <= event.created_at);
        self.events.insert(at, event);
    }

    /// Queue an error to be returned by the next query.
    pub fn fail_next(&mut self, error: SourceError) {
        self.failures.push_back(error);
    }

    /// Number of queries answered so far, failed ones included.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Every query received, oldest first.
    #[must_use]
    pub fn queries(&self) -> &[EventQuery] {
        &self.queries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSource for MemoryEventSource {
    fn query(&mut self, query: &EventQuery) -> Result<QueryResponse, SourceError> {
        self.queries.push(*query);
        if let Some(error) = self.failures.pop_front() {
            return Err(error);
        }

        let in_range: Vec<&Event> = self
            .events
            .iter()
            .filter(|event| query.range.contains(event.created_at))
            .collect();
        let total = in_range.len();

        let events: Vec<Event> = match query.mode {
            QueryMode::Timestamps => in_range.into_iter().cloned().collect(),
            QueryMode::Page {
                limit,
                offset,
                order,
            } => {
                let ordered: Box<dyn Iterator<Item = &&Event>> = match order {
                    SortOrder::Ascending => Box::new(in_range.iter()),
                    SortOrder::Descending => Box::new(in_range.iter().rev()),
                };
                ordered.skip(offset).take(limit).map(|e| (*e).clone()).collect()
            }
        };

        let meta = ResponseMeta::for_query(query, total, events.len());
        Ok(QueryResponse { events, meta })
    }
}

fn sort_ascending(events: &mut [Event]) {
    events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
