//! Engine configuration: every knob of the walk-forward simulation.

use crate::labeling::LabelConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether the training window hides labels that resolve after the decision
/// time. Disabling it leaks future information and exists only for
/// comparison runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakScrub {
    #[default]
    Enabled,
    Disabled,
}

#[derive(Debug, Error, PartialEq)]
pub enum EngineConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("k_ratio must be in (0, 1], got {0}")]
    KRatio(f64),

    #[error("significance_level must be in (0, 1), got {0}")]
    Significance(f64),

    #[error("label_max_minutes must be at least 1")]
    Horizon,
}

/// Configuration for a single simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tp_pips: f64,
    pub sl_pips: f64,
    pub spread_pips: f64,
    /// Price value of one pip (0.01 for JPY-quoted pairs).
    pub pip_size: f64,
    /// Training window length in business days.
    pub days_back: u32,
    /// Fraction of a side's training subset used as the largest neighborhood.
    pub k_ratio: f64,
    pub dist_mean_thresh: f64,
    pub dist_max_thresh: f64,
    /// Added to neighbor distances before inverting them into weights.
    pub epsilon: f64,
    pub significance_level: f64,
    /// Triple-barrier horizon in minutes.
    pub label_max_minutes: usize,
    pub min_train_samples: usize,
    pub leak_scrub: LeakScrub,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tp_pips: 10.0,
            sl_pips: 10.0,
            spread_pips: 0.2,
            pip_size: 0.01,
            days_back: 20,
            k_ratio: 0.10,
            dist_mean_thresh: 1.0,
            dist_max_thresh: 2.0,
            epsilon: 1e-6,
            significance_level: 0.05,
            label_max_minutes: 60,
            min_train_samples: 50,
            leak_scrub: LeakScrub::Enabled,
        }
    }
}

impl EngineConfig {
    /// Breakeven win rate in percent: `100 * sl / (tp + sl)`.
    pub fn threshold(&self) -> f64 {
        100.0 * self.sl_pips / (self.tp_pips + self.sl_pips)
    }

    /// Realized pips of an opened trade given its labeled outcome.
    pub fn profit_pips(&self, win: bool) -> f64 {
        if win {
            self.tp_pips - self.spread_pips
        } else {
            -self.sl_pips - self.spread_pips
        }
    }

    pub fn label_config(&self) -> LabelConfig {
        LabelConfig {
            tp_pips: self.tp_pips,
            sl_pips: self.sl_pips,
            spread_pips: self.spread_pips,
            pip_size: self.pip_size,
            horizon: self.label_max_minutes,
        }
    }

    /// Override the neighbor distance thresholds.
    pub fn with_thresholds(mut self, mean_thresh: f64, max_thresh: f64) -> Self {
        self.dist_mean_thresh = mean_thresh;
        self.dist_max_thresh = max_thresh;
        self
    }

    pub fn validate(&self) -> Result<(), EngineConfigError> {
        for (field, value) in [
            ("tp_pips", self.tp_pips),
            ("sl_pips", self.sl_pips),
            ("pip_size", self.pip_size),
            ("dist_mean_thresh", self.dist_mean_thresh),
            ("dist_max_thresh", self.dist_max_thresh),
            ("epsilon", self.epsilon),
        ] {
            if !(value > 0.0) {
                return Err(EngineConfigError::NotPositive { field, value });
            }
        }
        if self.spread_pips < 0.0 {
            return Err(EngineConfigError::NotPositive {
                field: "spread_pips",
                value: self.spread_pips,
            });
        }
        if !(self.k_ratio > 0.0 && self.k_ratio <= 1.0) {
            return Err(EngineConfigError::KRatio(self.k_ratio));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(EngineConfigError::Significance(self.significance_level));
        }
        if self.label_max_minutes == 0 {
            return Err(EngineConfigError::Horizon);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakeven_threshold() {
        assert_eq!(EngineConfig::default().threshold(), 50.0);
        let cfg = EngineConfig {
            tp_pips: 20.0,
            sl_pips: 10.0,
            ..EngineConfig::default()
        };
        assert!((cfg.threshold() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn profit_includes_spread() {
        let cfg = EngineConfig::default();
        assert!((cfg.profit_pips(true) - 9.8).abs() < 1e-12);
        assert!((cfg.profit_pips(false) + 10.2).abs() < 1e-12);
    }

    #[test]
    fn validation() {
        assert!(EngineConfig::default().validate().is_ok());
        let bad = EngineConfig {
            k_ratio: 0.0,
            ..EngineConfig::default()
        };
        assert_eq!(bad.validate(), Err(EngineConfigError::KRatio(0.0)));
        let bad = EngineConfig {
            tp_pips: -1.0,
            ..EngineConfig::default()
        };
        assert!(matches!(bad.validate(), Err(EngineConfigError::NotPositive { field: "tp_pips", .. })));
    }

    #[test]
    fn deserializes_partial_toml_style_json() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"tp_pips": 15.0, "leak_scrub": "disabled"}"#).unwrap();
        assert_eq!(cfg.tp_pips, 15.0);
        assert_eq!(cfg.leak_scrub, LeakScrub::Disabled);
        assert_eq!(cfg.days_back, 20);
    }
}
