//! Engine configuration.

use crate::document::{DEFAULT_WORKSPACE_HEIGHT, DEFAULT_WORKSPACE_WIDTH};
use crate::snap::DEFAULT_SNAP_THRESHOLD;
use crate::viewport::DEFAULT_ZOOM_RATIO;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables for an [`EngineContext`](crate::engine::EngineContext).
///
/// Every field has a default, so a partial JSON file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub workspace_width: f64,
    pub workspace_height: f64,
    /// Snap distance in world units; candidates must be strictly closer.
    pub snap_threshold: f64,
    pub snap_enabled: bool,
    /// Fallback width/height for SVGs with no usable size information.
    pub default_svg_size: f64,
    /// Deadline for the render compatibility test.
    pub render_timeout_ms: u64,
    /// Fraction of the workspace an imported SVG is scaled to fit.
    pub import_fit_ratio: f64,
    /// Fraction of the visible area the workspace fills after auto-zoom.
    pub viewport_zoom_ratio: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_width: DEFAULT_WORKSPACE_WIDTH,
            workspace_height: DEFAULT_WORKSPACE_HEIGHT,
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
            snap_enabled: true,
            default_svg_size: 1080.0,
            render_timeout_ms: 1000,
            import_fit_ratio: 0.8,
            viewport_zoom_ratio: DEFAULT_ZOOM_RATIO,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("workspace_width", self.workspace_width),
            ("workspace_height", self.workspace_height),
            ("default_svg_size", self.default_svg_size),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("expected a positive number, got {value}"),
                });
            }
        }
        if !(self.snap_threshold.is_finite() && self.snap_threshold >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "snap_threshold",
                reason: format!("expected a non-negative number, got {}", self.snap_threshold),
            });
        }
        let ratios = [
            ("import_fit_ratio", self.import_fit_ratio),
            ("viewport_zoom_ratio", self.viewport_zoom_ratio),
        ];
        for (field, value) in ratios {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("expected a ratio in (0, 1], got {value}"),
                });
            }
        }
        Ok(())
    }
}
