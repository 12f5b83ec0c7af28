//! Reader configuration (`lectern.toml`).
//!
//! The tuning values here are carried over from the source application as
//! configuration, not derived: prefetch thresholds, burst size and the
//! reserved top margin are reading-feel choices, and changing them never
//! affects correctness of the anchor math.
//!
//! # Sections
//!
//! | Section    | Purpose                                          |
//! |------------|--------------------------------------------------|
//! | `[loader]` | Prefetch thresholds, burst cap, anchor margins   |
//! | `[cache]`  | Pinned editions per book                         |

mod error;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};

use crate::fetch::VersionSelector;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing lectern.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Scroll-loader settings
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Cache settings
    #[serde(default)]
    pub cache: CacheConfig,
}

impl ReaderConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values, collecting every problem before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diagnostics = ConfigDiagnostics::new();

        if self.loader.burst_max == 0 {
            diagnostics.error_with_hint(
                "loader.burst_max",
                "must be at least 1",
                "a burst of 1 disables read-ahead batching but still works",
            );
        }
        if self.loader.top_threshold_px < 0.0 {
            diagnostics.error("loader.top_threshold_px", "must not be negative");
        }
        if self.loader.bottom_threshold_px < 0.0 {
            diagnostics.error("loader.bottom_threshold_px", "must not be negative");
        }
        if self.loader.reserved_top_margin_px < 0.0 {
            diagnostics.error("loader.reserved_top_margin_px", "must not be negative");
        }
        if self.loader.initial_offset_px < 0.0 {
            diagnostics.error("loader.initial_offset_px", "must not be negative");
        }

        diagnostics.into_result().map_err(ConfigError::Diagnostics)
    }
}

// ============================================================================
// [loader]
// ============================================================================

/// Scroll-loader tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Maximum sections fetched in one prepend/append burst.
    pub burst_max: usize,

    /// Distance from the top edge (px) that triggers a prepend burst.
    pub top_threshold_px: f64,

    /// Distance from the bottom edge (px) that triggers an append burst.
    pub bottom_threshold_px: f64,

    /// Margin (px) kept above the anchor after a prepend settles, so the
    /// reader can still scroll up a little.
    pub reserved_top_margin_px: f64,

    /// Scroll offset (px) applied after a jump with no highlighted segment.
    pub initial_offset_px: f64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            burst_max: 3,
            top_threshold_px: 100.0,
            bottom_threshold_px: 500.0,
            reserved_top_margin_px: 90.0,
            initial_offset_px: 90.0,
        }
    }
}

// ============================================================================
// [cache]
// ============================================================================

/// Cache settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Pinned edition per book, applied to the cache at startup.
    pub preferred_versions: FxHashMap<String, VersionSelector>,
}

// =============================================================================
// Tests
// =============================================================================
