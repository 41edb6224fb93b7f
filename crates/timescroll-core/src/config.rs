use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_MAX_SIZE;
use crate::error::TimelineError;
use crate::model::Resolution;
use crate::source::MAX_PAGE_LIMIT;

/// Project-relative location of the config file.
pub const CONFIG_RELATIVE_PATH: &str = ".timescroll/config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TimelineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Events requested per page. Clamped to the 500-event query limit.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Soft cap on events held in memory at once.
    #[serde(default = "default_max_loaded")]
    pub max_loaded: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_loaded: default_max_loaded(),
        }
    }
}

impl PaginationConfig {
    /// Page size actually sent to the source.
    #[must_use]
    pub fn effective_page_size(&self) -> usize {
        self.page_size.clamp(1, MAX_PAGE_LIMIT)
    }
}

/// Scroll and prefetch policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportConfig {
    /// Items rendered beyond each edge of the viewport.
    #[serde(default = "default_buffer")]
    pub buffer: usize,
    #[serde(default)]
    pub default_resolution: Resolution,
    /// Scrolling up above this fraction of the total height loads older events.
    #[serde(default = "default_prefetch_upper")]
    pub prefetch_upper_fraction: f64,
    /// Scrolling down past this fraction of the total height loads newer events.
    #[serde(default = "default_prefetch_lower")]
    pub prefetch_lower_fraction: f64,
    /// A jump larger than this between two scroll samples counts as a drag.
    #[serde(default = "default_drag_threshold")]
    pub drag_threshold_px: f64,
    /// How long prefetching stays suppressed after a drag is detected.
    #[serde(default = "default_drag_hold_ms")]
    pub drag_hold_ms: u64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            buffer: default_buffer(),
            default_resolution: Resolution::default(),
            prefetch_upper_fraction: default_prefetch_upper(),
            prefetch_lower_fraction: default_prefetch_lower(),
            drag_threshold_px: default_drag_threshold(),
            drag_hold_ms: default_drag_hold_ms(),
        }
    }
}

impl ViewportConfig {
    #[must_use]
    pub const fn drag_hold(&self) -> Duration {
        Duration::from_millis(self.drag_hold_ms)
    }
}

impl TimelineConfig {
    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> Result<(), TimelineError> {
        if self.pagination.page_size == 0 {
            return Err(TimelineError::InvalidConfig(
                "pagination.page_size must be at least 1".into(),
            ));
        }
        if self.pagination.max_loaded == 0 {
            return Err(TimelineError::InvalidConfig(
                "pagination.max_loaded must be at least 1".into(),
            ));
        }

        let vp = &self.viewport;
        for (name, value) in [
            ("prefetch_upper_fraction", vp.prefetch_upper_fraction),
            ("prefetch_lower_fraction", vp.prefetch_lower_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TimelineError::InvalidConfig(format!(
                    "viewport.{name} must be within 0.0..=1.0, got {value}"
                )));
            }
        }
        if vp.prefetch_upper_fraction > vp.prefetch_lower_fraction {
            return Err(TimelineError::InvalidConfig(
                "viewport.prefetch_upper_fraction must not exceed prefetch_lower_fraction".into(),
            ));
        }
        if !vp.drag_threshold_px.is_finite() || vp.drag_threshold_px <= 0.0 {
            return Err(TimelineError::InvalidConfig(
                "viewport.drag_threshold_px must be a positive number".into(),
            ));
        }
        Ok(())
    }
}

/// Load and validate a config file. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails validation.
pub fn load_config(path: &Path) -> Result<TimelineConfig> {
    if !path.exists() {
        return Ok(TimelineConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<TimelineConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid settings in {}", path.display()))?;
    Ok(config)
}

/// Load `<project_root>/.timescroll/config.toml`.
///
/// # Errors
///
/// See [`load_config`].
pub fn load_project_config(project_root: &Path) -> Result<TimelineConfig> {
    load_config(&project_root.join(CONFIG_RELATIVE_PATH))
}

const fn default_cache_entries() -> usize {
    DEFAULT_CACHE_MAX_SIZE
}

const fn default_page_size() -> usize {
    100
}

const fn default_max_loaded() -> usize {
    500
}

const fn default_buffer() -> usize {
    5
}

const fn default_prefetch_upper() -> f64 {
    0.2
}

const fn default_prefetch_lower() -> f64 {
    0.8
}

const fn default_drag_threshold() -> f64 {
    500.0
}

const fn default_drag_hold_ms() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_project_config(dir.path()).expect("load should succeed");
        assert_eq!(cfg, TimelineConfig::default());
        assert_eq!(cfg.cache.max_entries, 5);
        assert_eq!(cfg.pagination.page_size, 100);
        assert_eq!(cfg.pagination.max_loaded, 500);
        assert_eq!(cfg.viewport.buffer, 5);
        assert_eq!(cfg.viewport.drag_hold(), Duration::from_millis(300));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_RELATIVE_PATH);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(
            &path,
            "[pagination]\npage_size = 25\n\n[viewport]\ndefault_resolution = 4\n",
        )
        .expect("write");

        let cfg = load_project_config(dir.path()).expect("load");
        assert_eq!(cfg.pagination.page_size, 25);
        assert_eq!(cfg.pagination.max_loaded, 500);
        assert_eq!(cfg.viewport.default_resolution, Resolution::MOST_COMPACT);
        assert!((cfg.viewport.prefetch_lower_fraction - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = TimelineConfig::default();
        cfg.viewport.prefetch_upper_fraction = 0.9;
        assert!(matches!(cfg.validate(), Err(TimelineError::InvalidConfig(_))));

        let mut cfg = TimelineConfig::default();
        cfg.pagination.page_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TimelineConfig::default();
        cfg.viewport.prefetch_lower_fraction = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_resolution_in_file_fails_to_parse() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[viewport]\ndefault_resolution = 9\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn page_size_is_clamped_to_query_limit() {
        let cfg = PaginationConfig {
            page_size: 2_000,
            max_loaded: 500,
        };
        assert_eq!(cfg.effective_page_size(), 500);
    }
}
