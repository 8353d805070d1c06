//! TOML backtest configuration.
//!
//! ```toml
//! [backtest]
//! instrument = "USD_JPY"
//! start = "2025-04-21"            # local time at utc_offset
//! end = "2025-04-24T23:59:00"
//! utc_offset = 9
//!
//! [strategy]
//! tp_pips = 10.0
//! sl_pips = 10.0
//!
//! [features]
//! file = "selected_features.json"
//!
//! [data]
//! cache_dir = "data/cache"
//! token_env = "OANDA_ACCESS_TOKEN"
//! ```
//!
//! Every section and field has a default; an empty file is a valid config.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use pipwalk_core::engine::{EngineConfig, EngineConfigError};
use pipwalk_core::features::{default_features, FeatureError, FeatureRegistry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid date/time '{value}' (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS])")]
    DateTime { value: String },

    #[error("utc_offset must be within ±14 hours, got {0}")]
    UtcOffset(i32),

    #[error("start {start} is not before end {end}")]
    EmptyRange { start: String, end: String },

    #[error("strategy: {0}")]
    Engine(#[from] EngineConfigError),

    #[error("features: {0}")]
    Feature(#[from] FeatureError),

    #[error("selected features file {path}: {reason}")]
    FeatureFile { path: PathBuf, reason: String },
}

/// Top-level run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub strategy: EngineConfig,
    pub features: FeaturesSection,
    pub data: DataSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub instrument: String,
    /// Local date or date-time; a bare date means 00:00.
    pub start: String,
    /// Local date or date-time, inclusive; a bare date means 23:59.
    pub end: String,
    /// Hours east of UTC in which `start`/`end` are written.
    pub utc_offset: i32,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            instrument: "USD_JPY".into(),
            start: "2025-04-21".into(),
            end: "2025-04-24".into(),
            utc_offset: 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FeaturesSection {
    /// Explicit feature list; takes precedence over `file`.
    pub selected: Option<Vec<String>>,
    /// JSON array of feature names, as written by `eval-features`.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub cache_dir: PathBuf,
    /// CSV fallback when neither cache nor provider has the range.
    pub csv: Option<PathBuf>,
    /// Environment variable holding the API access token.
    pub token_env: String,
    /// Use the practice (demo) endpoint instead of live.
    pub practice: bool,
    /// Distance threshold override written by `sweep`.
    pub thresholds_file: Option<PathBuf>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data/cache"),
            csv: None,
            token_env: "OANDA_ACCESS_TOKEN".into(),
            practice: false,
            thresholds_file: Some(PathBuf::from("thresholds.json")),
        }
    }
}

impl BacktestConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;
        let (start, end) = self.time_range()?;
        if start >= end {
            return Err(ConfigError::EmptyRange {
                start: self.backtest.start.clone(),
                end: self.backtest.end.clone(),
            });
        }
        if let Some(names) = &self.features.selected {
            FeatureRegistry::standard().validate(names)?;
        }
        Ok(())
    }

    /// Simulation range in UTC, both ends inclusive.
    pub fn time_range(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ConfigError> {
        let offset = FixedOffset::east_opt(self.backtest.utc_offset * 3600)
            .filter(|_| self.backtest.utc_offset.abs() <= 14)
            .ok_or(ConfigError::UtcOffset(self.backtest.utc_offset))?;
        let start = parse_local(&self.backtest.start, false, &offset)?;
        let end = parse_local(&self.backtest.end, true, &offset)?;
        Ok((start, end))
    }

    /// Feature names for this run: the explicit list, else the file, else
    /// the default set. An absent or empty file means the default set.
    pub fn resolve_features(&self) -> Result<Vec<String>, ConfigError> {
        let names = match (&self.features.selected, &self.features.file) {
            (Some(names), _) if !names.is_empty() => names.clone(),
            (_, Some(path)) => load_selected_features(path)?,
            _ => default_features(),
        };
        FeatureRegistry::standard().validate(&names)?;
        Ok(names)
    }

    /// Deterministic hash of the full configuration.
    pub fn config_hash(&self) -> String {
        // Every field is a plain value, so serialization cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

/// Read a JSON array of feature names. A missing or empty file yields the
/// default set.
pub fn load_selected_features(path: &Path) -> Result<Vec<String>, ConfigError> {
    if !path.exists() {
        return Ok(default_features());
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FeatureFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let names: Vec<String> = serde_json::from_str(&content).map_err(|e| ConfigError::FeatureFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if names.is_empty() {
        tracing::info!(path = %path.display(), "selected features file empty; using defaults");
        return Ok(default_features());
    }
    Ok(names)
}

fn parse_local(value: &str, end_of_day: bool, offset: &FixedOffset) -> Result<DateTime<Utc>, ConfigError> {
    let err = || ConfigError::DateTime {
        value: value.to_string(),
    };
    let naive = if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        dt
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M") {
        dt
    } else {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| err())?;
        let time = if end_of_day {
            NaiveTime::from_hms_opt(23, 59, 0)
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)
        }
        .ok_or_else(err)?;
        date.and_time(time)
    };
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(err)
}
