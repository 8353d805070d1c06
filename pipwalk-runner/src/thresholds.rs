//! Distance threshold override file.
//!
//! `{"mean_thresh": 0.9, "max_thresh": 1.8}` written by the sweep and read
//! once at the start of every run. A malformed file is reported and ignored.

use pipwalk_core::engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOverride {
    pub mean_thresh: f64,
    pub max_thresh: f64,
}

impl ThresholdOverride {
    /// Read the override file. `None` when the file is missing, or when it
    /// is unreadable or malformed (logged as a warning).
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read thresholds file; using defaults");
                return None;
            }
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(t) if t.is_valid() => Some(t),
            Ok(t) => {
                tracing::warn!(
                    path = %path.display(),
                    mean_thresh = t.mean_thresh,
                    max_thresh = t.max_thresh,
                    "thresholds must be positive; using defaults"
                );
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed thresholds file; using defaults");
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, json)
    }

    fn is_valid(&self) -> bool {
        self.mean_thresh > 0.0 && self.max_thresh > 0.0
    }

    pub fn apply(&self, config: EngineConfig) -> EngineConfig {
        config.with_thresholds(self.mean_thresh, self.max_thresh)
    }
}

/// Thread the override at `path` (if any) into `config`.
pub fn apply_overrides(config: EngineConfig, path: Option<&Path>) -> EngineConfig {
    match path.and_then(ThresholdOverride::load) {
        Some(t) => {
            tracing::info!(mean_thresh = t.mean_thresh, max_thresh = t.max_thresh, "distance thresholds overridden");
            t.apply(config)
        }
        None => config,
    }
}
