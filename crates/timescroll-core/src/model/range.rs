//! Half-open time ranges and the zoom granularity used to query them.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TimelineError;

/// Coarse temporal granularity governing the shape of event source queries.
///
/// `Year` is special: instead of paging individual events the browser
/// aggregates them into monthly buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zoom {
    Year,
    Month,
    Week,
    Day,
}

/// Error returned when parsing an unknown zoom string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownZoom {
    pub raw: String,
}

impl fmt::Display for UnknownZoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown zoom '{}': expected one of year, month, week, day",
            self.raw
        )
    }
}

impl std::error::Error for UnknownZoom {}

impl Zoom {
    pub const ALL: [Self; 4] = [Self::Year, Self::Month, Self::Week, Self::Day];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
        }
    }

    /// Returns true when this zoom is answered by monthly aggregation
    /// rather than offset/limit pagination.
    #[must_use]
    pub const fn is_aggregated(self) -> bool {
        matches!(self, Self::Year)
    }
}

impl fmt::Display for Zoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zoom {
    type Err = UnknownZoom;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(Self::Year),
            "month" => Ok(Self::Month),
            "week" => Ok(Self::Week),
            "day" => Ok(Self::Day),
            _ => Err(UnknownZoom { raw: s.to_string() }),
        }
    }
}

/// A half-open interval `[start, end)` of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a range, rejecting empty or inverted intervals.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::InvalidRange`] when `end <= start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimelineError> {
        if end <= start {
            return Err(TimelineError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// The calendar window of the given zoom that contains `instant`.
    ///
    /// Day windows start at midnight UTC, week windows on Monday, month and
    /// year windows on the first day. Returns `None` only when the window
    /// falls outside chrono's representable dates.
    #[must_use]
    pub fn containing(instant: DateTime<Utc>, zoom: Zoom) -> Option<Self> {
        let date = instant.date_naive();
        let (first, last) = match zoom {
            Zoom::Day => (date, date.checked_add_days(Days::new(1))?),
            Zoom::Week => {
                let monday = date.checked_sub_days(Days::new(u64::from(
                    date.weekday().num_days_from_monday(),
                )))?;
                (monday, monday.checked_add_days(Days::new(7))?)
            }
            Zoom::Month => {
                let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?;
                (first, first.checked_add_months(Months::new(1))?)
            }
            Zoom::Year => {
                let first = NaiveDate::from_ymd_opt(date.year(), 1, 1)?;
                (first, first.checked_add_months(Months::new(12))?)
            }
        };
        Some(Self {
            start: first.and_hms_opt(0, 0, 0)?.and_utc(),
            end: last.and_hms_opt(0, 0, 0)?.and_utc(),
        })
    }

    /// Move `steps` zoom windows forward (positive) or backward (negative)
    /// from the window containing this range's start.
    #[must_use]
    pub fn step(&self, zoom: Zoom, steps: i32) -> Option<Self> {
        let magnitude = steps.unsigned_abs();
        let forward = steps >= 0;
        let start = self.start;
        let moved = match zoom {
            Zoom::Day | Zoom::Week => {
                let per_step = if zoom == Zoom::Day { 1 } else { 7 };
                let days = Days::new(u64::from(magnitude) * per_step);
                if forward {
                    start.checked_add_days(days)?
                } else {
                    start.checked_sub_days(days)?
                }
            }
            Zoom::Month | Zoom::Year => {
                let per_step = if zoom == Zoom::Month { 1 } else { 12 };
                let months = Months::new(magnitude.checked_mul(per_step)?);
                if forward {
                    start.checked_add_months(months)?
                } else {
                    start.checked_sub_months(months)?
                }
            }
        };
        Self::containing(moved, zoom)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
