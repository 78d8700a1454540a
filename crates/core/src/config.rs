//! Reader and thumbnail configuration
//!
//! Configuration is read from a JSON file (camelCase keys, every field
//! optional), then overridden by environment variables. Residency values are
//! clamped into their supported ranges by [`ResidencyConfig::normalized`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Aggressive-mode radius/inflight/hysteresis reductions last this long
pub const AGGRESSIVE_MODE_MIN_MS: u64 = 8000;

/// Hysteresis ceiling while aggressive mode is active
pub const AGGRESSIVE_HYSTERESIS_CAP_MS: u64 = 300;

/// Windowed residency settings for the page reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResidencyConfig {
    /// When false, every page is loaded on open and nothing is evicted
    pub enabled: bool,

    /// Pages on each side of the anchor that must be resident
    pub hot_radius: usize,

    /// Pages on each side of the anchor that are prefetched and protected
    pub warm_radius: usize,

    /// Resident pages tolerated before trimming
    pub max_resident_pages: usize,

    /// Concurrent page loads
    pub max_inflight_loads: usize,

    /// Minimum time out of zone before a page may be evicted
    pub evict_hysteresis_ms: u64,

    /// Cadence of the periodic residency sweep
    pub sweep_interval_ms: u64,

    /// Warm prefetch is skipped while scrolling faster than this (px/ms)
    pub scroll_velocity_prefetch_cutoff: f64,

    /// Evict every out-of-zone page past hysteresis, not just the overflow
    pub enforce_zone_residency: bool,
}

impl Default for ResidencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hot_radius: 2,
            warm_radius: 8,
            max_resident_pages: 16,
            max_inflight_loads: 3,
            evict_hysteresis_ms: 2000,
            sweep_interval_ms: 7000,
            scroll_velocity_prefetch_cutoff: 1.6,
            enforce_zone_residency: true,
        }
    }
}

impl ResidencyConfig {
    /// Clamp every field into its supported range
    pub fn normalized(mut self) -> Self {
        self.hot_radius = self.hot_radius.min(200);
        self.warm_radius = self.warm_radius.min(400).max(self.hot_radius);
        self.max_resident_pages = self.max_resident_pages.clamp(1, 2000);
        self.max_inflight_loads = self.max_inflight_loads.clamp(1, 20);
        self.evict_hysteresis_ms = self.evict_hysteresis_ms.min(60_000);
        self.sweep_interval_ms = self.sweep_interval_ms.clamp(250, 120_000);
        self.scroll_velocity_prefetch_cutoff = if self.scroll_velocity_prefetch_cutoff.is_finite() {
            self.scroll_velocity_prefetch_cutoff.clamp(0.0, 20.0)
        } else {
            Self::default().scroll_velocity_prefetch_cutoff
        };
        self
    }

    /// Settings in force, reduced while aggressive mode is active
    pub fn effective(&self, aggressive: bool) -> EffectiveResidency {
        if !aggressive {
            return EffectiveResidency {
                hot_radius: self.hot_radius,
                warm_radius: self.warm_radius.max(self.hot_radius),
                max_resident_pages: self.max_resident_pages.max(1),
                max_inflight_loads: self.max_inflight_loads.max(1),
                evict_hysteresis_ms: self.evict_hysteresis_ms,
                scroll_velocity_prefetch_cutoff: self.scroll_velocity_prefetch_cutoff,
                aggressive: false,
            };
        }

        let hot_radius = (self.hot_radius / 2).max(1);
        EffectiveResidency {
            hot_radius,
            warm_radius: (self.warm_radius / 2).max(hot_radius),
            max_resident_pages: self.max_resident_pages.max(1),
            max_inflight_loads: self.max_inflight_loads.saturating_sub(1).max(1),
            evict_hysteresis_ms: self.evict_hysteresis_ms.min(AGGRESSIVE_HYSTERESIS_CAP_MS),
            scroll_velocity_prefetch_cutoff: self.scroll_velocity_prefetch_cutoff,
            aggressive: true,
        }
    }

    pub fn with_radii(mut self, hot_radius: usize, warm_radius: usize) -> Self {
        self.hot_radius = hot_radius;
        self.warm_radius = warm_radius;
        self
    }

    pub fn with_max_resident_pages(mut self, pages: usize) -> Self {
        self.max_resident_pages = pages;
        self
    }

    pub fn with_max_inflight_loads(mut self, loads: usize) -> Self {
        self.max_inflight_loads = loads;
        self
    }

    pub fn with_evict_hysteresis_ms(mut self, ms: u64) -> Self {
        self.evict_hysteresis_ms = ms;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_enforce_zone_residency(mut self, enforce: bool) -> Self {
        self.enforce_zone_residency = enforce;
        self
    }
}

/// Residency values after aggressive-mode adjustment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveResidency {
    pub hot_radius: usize,
    pub warm_radius: usize,
    pub max_resident_pages: usize,
    pub max_inflight_loads: usize,
    pub evict_hysteresis_ms: u64,
    pub scroll_velocity_prefetch_cutoff: f64,
    pub aggressive: bool,
}

/// Page slot geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    /// Widest a page is drawn in natural mode
    pub max_page_width_px: f64,

    /// Vertical breathing room subtracted in fit-height mode
    pub fit_height_padding_px: f64,

    /// Height/width ratio assumed for pages with unknown size
    pub fallback_aspect_ratio: f64,

    /// Gap between consecutive pages
    pub page_gap_px: f64,

    /// Padding above the first page
    pub padding_top_px: f64,

    /// Smallest fallback slot height
    pub min_fallback_height_px: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_page_width_px: 980.0,
            fit_height_padding_px: 28.0,
            fallback_aspect_ratio: 1.45,
            page_gap_px: 0.0,
            padding_top_px: 0.0,
            min_fallback_height_px: 80.0,
        }
    }
}

/// Gallery thumbnail settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThumbnailConfig {
    /// Budget of the in-memory thumbnail cache
    pub cache_memory_mb: usize,

    /// Largest output width a measured cell may request
    pub max_output_width: u32,

    /// Largest output height a measured cell may request
    pub max_output_height: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self { cache_memory_mb: 64, max_output_width: 610, max_output_height: 813 }
    }
}

/// Complete nview configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NviewConfig {
    pub residency: ResidencyConfig,
    pub layout: LayoutConfig,
    pub thumbnail: ThumbnailConfig,
}

impl NviewConfig {
    /// Default config file location
    ///
    /// - Linux: ~/.config/nview/config.json
    /// - macOS: ~/Library/Application Support/nview/config.json
    /// - Windows: %APPDATA%\nview\config.json
    pub fn default_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("nview").join("config.json"),
            None => PathBuf::from("nview.json"),
        }
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&contents)
    }

    /// Load `path` (or the default path) if it exists, then apply env overrides
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let config = if path.exists() {
            tracing::debug!(path = %path.display(), "loading config");
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.with_env_overrides()
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides
    ///
    /// Environment variables:
    /// - `NVIEW_HOT_RADIUS`
    /// - `NVIEW_WARM_RADIUS`
    /// - `NVIEW_MAX_RESIDENT_PAGES`
    /// - `NVIEW_MAX_INFLIGHT_LOADS`
    /// - `NVIEW_EVICT_HYSTERESIS_MS`
    /// - `NVIEW_THUMB_CACHE_MB`
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` naming the first variable that does
    /// not parse.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(value) = env_number("NVIEW_HOT_RADIUS")? {
            self.residency.hot_radius = value;
        }
        if let Some(value) = env_number("NVIEW_WARM_RADIUS")? {
            self.residency.warm_radius = value;
        }
        if let Some(value) = env_number("NVIEW_MAX_RESIDENT_PAGES")? {
            self.residency.max_resident_pages = value;
        }
        if let Some(value) = env_number("NVIEW_MAX_INFLIGHT_LOADS")? {
            self.residency.max_inflight_loads = value;
        }
        if let Some(value) = env_number("NVIEW_EVICT_HYSTERESIS_MS")? {
            self.residency.evict_hysteresis_ms = value;
        }
        if let Some(value) = env_number("NVIEW_THUMB_CACHE_MB")? {
            self.thumbnail.cache_memory_mb = value;
        }
        Ok(self.normalized())
    }

    /// Clamp nested values into range
    pub fn normalized(mut self) -> Self {
        self.residency = self.residency.normalized();
        self
    }

    /// Write configuration as pretty JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse::<T>().map(Some).map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_KEYS: [&str; 6] = [
        "NVIEW_HOT_RADIUS",
        "NVIEW_WARM_RADIUS",
        "NVIEW_MAX_RESIDENT_PAGES",
        "NVIEW_MAX_INFLIGHT_LOADS",
        "NVIEW_EVICT_HYSTERESIS_MS",
        "NVIEW_THUMB_CACHE_MB",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = NviewConfig::default();
        assert!(config.residency.enabled);
        assert_eq!(config.residency.hot_radius, 2);
        assert_eq!(config.residency.warm_radius, 8);
        assert_eq!(config.residency.max_resident_pages, 16);
        assert_eq!(config.residency.max_inflight_loads, 3);
        assert_eq!(config.residency.evict_hysteresis_ms, 2000);
        assert_eq!(config.residency.sweep_interval_ms, 7000);
        assert_eq!(config.layout.max_page_width_px, 980.0);
        assert_eq!(config.thumbnail.cache_memory_mb, 64);
    }

    #[test]
    fn test_normalize_clamps_ranges() {
        let config = ResidencyConfig {
            hot_radius: 500,
            warm_radius: 3,
            max_resident_pages: 0,
            max_inflight_loads: 99,
            evict_hysteresis_ms: 1_000_000,
            sweep_interval_ms: 10,
            scroll_velocity_prefetch_cutoff: f64::NAN,
            ..Default::default()
        }
        .normalized();

        assert_eq!(config.hot_radius, 200);
        assert_eq!(config.warm_radius, 200);
        assert_eq!(config.max_resident_pages, 1);
        assert_eq!(config.max_inflight_loads, 20);
        assert_eq!(config.evict_hysteresis_ms, 60_000);
        assert_eq!(config.sweep_interval_ms, 250);
        assert_eq!(config.scroll_velocity_prefetch_cutoff, 1.6);
    }

    #[test]
    fn test_aggressive_mode_halves_radii() {
        let base = ResidencyConfig::default();
        let relaxed = base.effective(false);
        assert_eq!((relaxed.hot_radius, relaxed.warm_radius), (2, 8));
        assert!(!relaxed.aggressive);

        let tight = base.effective(true);
        assert_eq!(tight.hot_radius, 1);
        assert_eq!(tight.warm_radius, 4);
        assert_eq!(tight.max_inflight_loads, 2);
        assert_eq!(tight.evict_hysteresis_ms, 300);
        assert!(tight.aggressive);

        let minimal = ResidencyConfig::default().with_radii(0, 0).with_max_inflight_loads(1).effective(true);
        assert_eq!((minimal.hot_radius, minimal.warm_radius), (1, 1));
        assert_eq!(minimal.max_inflight_loads, 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = NviewConfig::from_json(r#"{"residency":{"hotRadius":1,"warmRadius":0},"thumbnail":{"cacheMemoryMb":8}}"#)
            .unwrap();

        assert_eq!(config.residency.hot_radius, 1);
        assert_eq!(config.residency.warm_radius, 1);
        assert_eq!(config.residency.max_resident_pages, 16);
        assert_eq!(config.thumbnail.cache_memory_mb, 8);
        assert_eq!(config.thumbnail.max_output_width, 610);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(NviewConfig::from_json("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = NviewConfig::default();
        config.residency.max_resident_pages = 40;
        config.layout.page_gap_px = 12.0;
        config.save_to_file(&path).unwrap();

        assert_eq!(NviewConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = NviewConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("NVIEW_HOT_RADIUS", "3");
        env::set_var("NVIEW_WARM_RADIUS", "5");
        env::set_var("NVIEW_MAX_RESIDENT_PAGES", "9");
        env::set_var("NVIEW_EVICT_HYSTERESIS_MS", "100");
        env::set_var("NVIEW_THUMB_CACHE_MB", "16");

        let config = NviewConfig::from_env().unwrap();
        assert_eq!(config.residency.hot_radius, 3);
        assert_eq!(config.residency.warm_radius, 5);
        assert_eq!(config.residency.max_resident_pages, 9);
        assert_eq!(config.residency.max_inflight_loads, 3);
        assert_eq!(config.residency.evict_hysteresis_ms, 100);
        assert_eq!(config.thumbnail.cache_memory_mb, 16);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_value() {
        clear_env();
        env::set_var("NVIEW_MAX_INFLIGHT_LOADS", "many");

        match NviewConfig::from_env() {
            Err(ConfigError::InvalidValue(key)) => assert_eq!(key, "NVIEW_MAX_INFLIGHT_LOADS"),
            other => panic!("expected invalid value, got {other:?}"),
        }

        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_without_file_uses_env() {
        clear_env();
        env::set_var("NVIEW_HOT_RADIUS", "4");

        let dir = tempfile::tempdir().unwrap();
        let config = NviewConfig::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config.residency.hot_radius, 4);
        assert_eq!(config.residency.warm_radius, 8);

        clear_env();
    }
}
