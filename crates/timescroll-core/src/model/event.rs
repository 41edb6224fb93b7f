//! The `Event` record and its author role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of characters kept in [`Event::content_preview`].
pub const PREVIEW_MAX_CHARS: usize = 200;

/// Who authored an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Error returned when parsing an unknown role string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown role '{}': expected one of user, assistant, system",
            self.raw
        )
    }
}

impl std::error::Error for UnknownRole {}

impl Role {
    pub const ALL: [Self; 3] = [Self::User, Self::Assistant, Self::System];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(UnknownRole { raw: s.to_string() }),
        }
    }
}

/// A single timestamped entry in the journal.
///
/// Events never change after creation. The browser only ever holds copies
/// obtained from a successful fetch.
///
/// `count` is set only on synthetic month buckets produced by year-zoom
/// aggregation; regular events leave it empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Opaque unique identifier.
    pub id: String,

    /// Creation instant. Used for ordering but not guaranteed unique.
    pub created_at: DateTime<Utc>,

    pub role: Role,

    /// Display-only excerpt, at most [`PREVIEW_MAX_CHARS`] characters.
    pub content_preview: String,

    /// Conversation group this event belongs to.
    pub thread_id: String,

    /// Denormalized display label of the thread.
    pub thread_label: String,

    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl Event {
    /// Build a synthetic month bucket for year-zoom views.
    ///
    /// `month` is the `YYYY-MM` label; `start` is the first instant of that
    /// month. The id is deterministic (`month_<YYYY-MM>`) so the same bucket
    /// fetched twice compares equal.
    #[must_use]
    pub fn month_bucket(month: &str, start: DateTime<Utc>, count: u64) -> Self {
        let noun = if count == 1 { "event" } else { "events" };
        Self {
            id: format!("month_{month}"),
            created_at: start,
            role: Role::System,
            content_preview: format!("{count} {noun}"),
            thread_id: String::new(),
            thread_label: month.to_string(),
            user_id: String::new(),
            user_name: None,
            count: Some(count),
        }
    }

    /// Returns true for synthetic month buckets.
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        self.count.is_some()
    }
}

/// Truncate `s` to at most `max_chars` characters, appending `…` when cut.
#[must_use]
pub fn truncate_preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}
