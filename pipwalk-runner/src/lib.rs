//! pipwalk runner: configuration, candle loading, backtest orchestration,
//! outcome metrics, feature evaluation, threshold sweeps, reports.
//!
//! This crate builds on `pipwalk-core` to provide:
//! - TOML configuration and the distance-threshold override file
//! - Candle loading with cache/download/CSV/synthetic fallback
//! - Single-backtest runner and outcome metrics
//! - Holdout feature selection (correlation, VIF, point-biserial)
//! - Parallel threshold sweep
//! - Text summary and on-disk run artifacts

pub mod config;
pub mod data_loader;
pub mod feature_eval;
pub mod metrics;
pub mod reporting;
pub mod runner;
pub mod sweep;
pub mod thresholds;

pub use config::{load_selected_features, BacktestConfig, ConfigError};
pub use data_loader::{generate_synthetic_candles, load_candles, LoadError, LoadOptions, LoadedData};
pub use feature_eval::{evaluate_features, EvalError, EvalThresholds, FeatureEvaluation};
pub use metrics::{OutcomeMetrics, StreakDistribution};
pub use reporting::{render_summary, save_artifacts, ArtifactPaths};
pub use runner::{
    effective_config, evaluate_holdout, prepare, prepare_from_candles, run_prepared, run_single_backtest,
    BacktestResult, PreparedData, RunError, RunFlags,
};
pub use sweep::{run_sweep, SweepPoint, SweepResults, ThresholdGrid};
pub use thresholds::{apply_overrides, ThresholdOverride};
