use std::fmt;

use chrono::{DateTime, Utc};

use crate::source::SourceError;

/// Machine-readable error codes for UI layers and scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidConfig,
    InvalidRange,
    InvalidResolution,
    NoRangeSelected,
    FetchFailed,
    InvalidResponseShape,
    StaleRequest,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidConfig => "E1001",
            Self::InvalidRange => "E2001",
            Self::InvalidResolution => "E2002",
            Self::NoRangeSelected => "E2003",
            Self::FetchFailed => "E3001",
            Self::InvalidResponseShape => "E3002",
            Self::StaleRequest => "E3003",
        }
    }

    /// Short human-facing summary for logs and status lines.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidConfig => "Invalid timeline configuration",
            Self::InvalidRange => "Invalid time range",
            Self::InvalidResolution => "Invalid resolution level",
            Self::NoRangeSelected => "No time range selected",
            Self::FetchFailed => "Event fetch failed",
            Self::InvalidResponseShape => "Malformed event source response",
            Self::StaleRequest => "Superseded request discarded",
        }
    }

    /// Optional remediation hint that can be surfaced next to the error.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidConfig => Some("Fix the values in .timescroll/config.toml and retry."),
            Self::InvalidRange => Some("Pick a range whose end is after its start."),
            Self::InvalidResolution => Some("Use a resolution level between 0 and 4."),
            Self::NoRangeSelected => Some("Select a time range before paging."),
            Self::FetchFailed => Some("Retry once the event store is reachable."),
            Self::InvalidResponseShape => {
                Some("Check that the event store answers with an `events` array and `meta`.")
            }
            Self::StaleRequest => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the timeline browser.
///
/// `FetchFailed` and `InvalidResponseShape` come out of the event source.
/// On a reset load they clear the visible window; on a continuation
/// (`load_more` / `load_previous`) the already-loaded window is left intact
/// and the error is only reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimelineError {
    #[error("event fetch failed: {0}")]
    FetchFailed(String),

    #[error("invalid event source response: {0}")]
    InvalidResponseShape(String),

    /// A resolved fetch belongs to a load that has since been superseded.
    #[error("stale response for generation {request}, current generation is {current}")]
    StaleRequest { request: u64, current: u64 },

    #[error("invalid time range: end {end} is not after start {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("resolution level {0} is out of range 0..=4")]
    InvalidResolution(u8),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no time range selected")]
    NoRange,
}

impl TimelineError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::FetchFailed(_) => ErrorCode::FetchFailed,
            Self::InvalidResponseShape(_) => ErrorCode::InvalidResponseShape,
            Self::StaleRequest { .. } => ErrorCode::StaleRequest,
            Self::InvalidRange { .. } => ErrorCode::InvalidRange,
            Self::InvalidResolution(_) => ErrorCode::InvalidResolution,
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Self::NoRange => ErrorCode::NoRangeSelected,
        }
    }

    /// Optional remediation hint for the UI.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether this error came from talking to the event source.
    #[must_use]
    pub const fn is_fetch_error(&self) -> bool {
        matches!(self, Self::FetchFailed(_) | Self::InvalidResponseShape(_))
    }
}

impl From<SourceError> for TimelineError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unavailable(msg) => Self::FetchFailed(msg),
            SourceError::Malformed(msg) => Self::InvalidResponseShape(msg),
        }
    }
}
