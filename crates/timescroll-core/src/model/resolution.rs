use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TimelineError;

/// Pixel height of one item at each resolution level, most detailed first.
pub const ITEM_HEIGHTS: [f64; 5] = [120.0, 90.0, 60.0, 40.0, 30.0];

/// Rendering density level, `0` (tallest, most detail) to `4` (most compact).
///
/// Purely visual: changing it never triggers a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Resolution(u8);

impl Resolution {
    pub const MOST_DETAILED: Self = Self(0);
    pub const MOST_COMPACT: Self = Self(4);

    pub const ALL: [Self; 5] = [Self(0), Self(1), Self(2), Self(3), Self(4)];

    /// # Errors
    ///
    /// Returns [`TimelineError::InvalidResolution`] for levels above 4.
    pub const fn new(level: u8) -> Result<Self, TimelineError> {
        if (level as usize) < ITEM_HEIGHTS.len() {
            Ok(Self(level))
        } else {
            Err(TimelineError::InvalidResolution(level))
        }
    }

    #[must_use]
    pub const fn level(self) -> u8 {
        self.0
    }

    /// Pixel height of one item at this level.
    #[must_use]
    pub const fn item_height(self) -> f64 {
        ITEM_HEIGHTS[self.0 as usize]
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self(2)
    }
}

impl TryFrom<u8> for Resolution {
    type Error = TimelineError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<Resolution> for u8 {
    fn from(resolution: Resolution) -> Self {
        resolution.0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heights_shrink_with_level() {
        for pair in Resolution::ALL.windows(2) {
            assert!(pair[0].item_height() > pair[1].item_height());
        }
        assert!((Resolution::MOST_DETAILED.item_height() - 120.0).abs() < f64::EPSILON);
        assert!((Resolution::MOST_COMPACT.item_height() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_level_is_rejected() {
        assert_eq!(Resolution::new(5), Err(TimelineError::InvalidResolution(5)));
        assert!(serde_json::from_str::<Resolution>("7").is_err());
        assert_eq!(serde_json::from_str::<Resolution>("3").unwrap().level(), 3);
    }
}
