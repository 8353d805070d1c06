//! Backtest runner: wires together data loading, the feature store, the
//! walk-forward engine, and outcome metrics.
//!
//! Entry points:
//! - `run_single_backtest()`: loads candles (cache/provider/CSV/synthetic), then runs. Used by CLI.
//! - `run_prepared()`: takes a pre-built store. Used by the threshold sweep so
//!   features and labels are computed once per grid.
//! - `evaluate_holdout()`: loads the holdout span and runs feature selection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pipwalk_core::data::{DataProvider, DataSource, ParquetCache};
use pipwalk_core::domain::{Candle, DecisionRecord, Trade};
use pipwalk_core::engine::{simulate, LogProgress, SimulationProgress};
use pipwalk_core::store::{FeatureStore, StoreError};

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_candles, LoadError, LoadOptions};
use crate::feature_eval::{evaluate_candles, holdout_range, EvalError, EvalThresholds, FeatureEvaluation};
use crate::metrics::OutcomeMetrics;
use crate::thresholds::apply_overrides;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("feature evaluation error: {0}")]
    Eval(#[from] EvalError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub instrument: String,
    /// First and last simulated minute, UTC.
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub metrics: OutcomeMetrics,
    pub trades: Vec<Trade>,
    pub decisions: Vec<DecisionRecord>,
    /// Effective configuration, threshold overrides applied.
    pub config: BacktestConfig,
    pub feature_names: Vec<String>,
    pub dataset_hash: String,
    pub source: DataSource,
    pub has_synthetic: bool,
    /// Bars in the store, look-back included.
    pub bar_count: usize,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    /// Cumulative pips after each trade.
    pub fn equity_curve(&self) -> Vec<f64> {
        let profits: Vec<f64> = self.trades.iter().map(|t| t.profit_pips).collect();
        crate::metrics::cumulative(&profits)
    }
}

/// Candles turned into a feature/label store, ready to simulate.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub instrument: String,
    pub store: FeatureStore,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub dataset_hash: String,
    pub source: DataSource,
    pub has_synthetic: bool,
}

/// Loader flags that come from the command line rather than the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    pub offline: bool,
    pub synthetic: bool,
    pub force: bool,
}

/// Build `LoadOptions` for the configured simulation range.
pub fn load_options(config: &BacktestConfig, flags: RunFlags) -> Result<LoadOptions, ConfigError> {
    let (start, end) = config.time_range()?;
    Ok(LoadOptions {
        start,
        end,
        days_back: config.strategy.days_back,
        offline: flags.offline,
        synthetic: flags.synthetic,
        force: flags.force,
        csv: config.data.csv.clone(),
    })
}

/// Apply the thresholds override file named in `config`, if present.
pub fn effective_config(config: &BacktestConfig) -> BacktestConfig {
    let mut effective = config.clone();
    effective.strategy = apply_overrides(config.strategy.clone(), config.data.thresholds_file.as_deref());
    effective
}

/// Run a single backtest from a BacktestConfig.
///
/// The thresholds override file is read once, here, and threaded through
/// the rest of the run as part of the config value.
pub fn run_single_backtest(
    config: &BacktestConfig,
    cache: &ParquetCache,
    provider: Option<&dyn DataProvider>,
    flags: RunFlags,
) -> Result<BacktestResult, RunError> {
    let config = effective_config(config);
    let data = prepare(&config, cache, provider, flags)?;
    Ok(run_prepared(&config, &data, &LogProgress::default()))
}

/// Load candles and build the feature/label store.
pub fn prepare(
    config: &BacktestConfig,
    cache: &ParquetCache,
    provider: Option<&dyn DataProvider>,
    flags: RunFlags,
) -> Result<PreparedData, RunError> {
    let opts = load_options(config, flags)?;
    let instrument = &config.backtest.instrument;
    let loaded = load_candles(instrument, cache, provider, &opts)?;
    prepare_from_candles(config, &loaded.candles, &loaded.dataset_hash, loaded.source)
}

/// Build the store from already-loaded candles: no I/O.
pub fn prepare_from_candles(
    config: &BacktestConfig,
    candles: &[Candle],
    dataset_hash: &str,
    source: DataSource,
) -> Result<PreparedData, RunError> {
    config.strategy.validate().map_err(ConfigError::from)?;
    let (start, end) = config.time_range()?;
    let features = config.resolve_features()?;
    let store = FeatureStore::build(candles, &features, &config.strategy.label_config())?;
    tracing::info!(
        bars = store.len(),
        features = features.len(),
        "feature store built"
    );

    Ok(PreparedData {
        instrument: config.backtest.instrument.clone(),
        store,
        start,
        end,
        dataset_hash: dataset_hash.to_string(),
        source,
        has_synthetic: source == DataSource::Synthetic,
    })
}

/// Simulate and aggregate over a prepared store.
///
/// `config.strategy` is used as given; its feature list must match the
/// store's schema, which holds for any store made by `prepare()` from the
/// same config.
pub fn run_prepared(
    config: &BacktestConfig,
    data: &PreparedData,
    progress: &dyn SimulationProgress,
) -> BacktestResult {
    let sim_bars = data.store.range(data.start, data.end).len();
    if sim_bars == 0 {
        tracing::warn!(start = %data.start, end = %data.end, "no bars inside the simulation range");
    }

    let output = simulate(&data.store, data.start, data.end, &config.strategy, progress);
    let metrics = OutcomeMetrics::compute(&output.trades, &output.decisions, data.start, data.end)
        .with_no_decisions(output.vetoed_unresolved);

    tracing::info!(
        instrument = %data.instrument,
        trades = metrics.num_trades,
        win_rate = metrics.win_rate,
        net_pips = metrics.net_profit,
        "backtest complete"
    );

    BacktestResult {
        schema_version: SCHEMA_VERSION,
        instrument: data.instrument.clone(),
        start: data.start,
        end: data.end,
        metrics,
        trades: output.trades,
        decisions: output.decisions,
        config: config.clone(),
        feature_names: data.store.feature_names().to_vec(),
        dataset_hash: data.dataset_hash.clone(),
        source: data.source,
        has_synthetic: data.has_synthetic,
        bar_count: data.store.len(),
    }
}

/// Load the holdout span that ends `days_back + MAX_BACKTEST_DAYS` business
/// days before `now` and evaluate every candidate feature on it.
pub fn evaluate_holdout(
    config: &BacktestConfig,
    cache: &ParquetCache,
    provider: Option<&dyn DataProvider>,
    flags: RunFlags,
    now: DateTime<Utc>,
    thresholds: &EvalThresholds,
) -> Result<FeatureEvaluation, RunError> {
    let (start, end) = holdout_range(now, config.strategy.days_back);
    tracing::info!(%start, %end, "feature evaluation holdout");
    let opts = LoadOptions {
        start,
        end: end - chrono::Duration::minutes(1),
        days_back: 0,
        offline: flags.offline,
        synthetic: flags.synthetic,
        force: flags.force,
        csv: config.data.csv.clone(),
    };
    let loaded = load_candles(&config.backtest.instrument, cache, provider, &opts)?;
    Ok(evaluate_candles(&loaded.candles, &config.strategy.label_config(), thresholds)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::generate_synthetic_candles;
    use chrono::Duration;
    use pipwalk_core::domain::Signal;
    use pipwalk_core::engine::NoProgress;

    fn small_config() -> BacktestConfig {
        let mut config = BacktestConfig::default();
        config.backtest.start = "2025-04-23T09:00".into();
        config.backtest.end = "2025-04-23T10:59".into();
        config.backtest.utc_offset = 0;
        config.strategy.days_back = 1;
        config.features.selected = Some(vec!["ret_1".into(), "rsi".into()]);
        config.data.thresholds_file = None;
        config
    }

    fn prepared(config: &BacktestConfig) -> PreparedData {
        let (start, end) = config.time_range().unwrap();
        let candles = generate_synthetic_candles("USD_JPY", start - Duration::days(1), end + Duration::minutes(1));
        prepare_from_candles(config, &candles, "hash", DataSource::Synthetic).unwrap()
    }

    #[test]
    fn one_decision_per_simulated_bar() {
        let config = small_config();
        let data = prepared(&config);
        let result = run_prepared(&config, &data, &NoProgress);

        assert_eq!(result.decisions.len(), data.store.range(data.start, data.end).len());
        let opened = result.decisions.iter().filter(|d| d.signal != Signal::None).count();
        assert_eq!(opened, result.trades.len());
        assert_eq!(result.metrics.num_trades, result.trades.len());
        assert!(result.has_synthetic);
        assert_eq!(result.feature_names, vec!["ret_1", "rsi"]);
    }

    #[test]
    fn equity_curve_ends_at_net_profit() {
        let config = small_config();
        let result = run_prepared(&config, &prepared(&config), &NoProgress);
        let curve = result.equity_curve();
        assert_eq!(curve.len(), result.trades.len());
        if let Some(last) = curve.last() {
            assert!((last - result.metrics.net_profit).abs() < 1e-9);
        }
    }

    #[test]
    fn threshold_override_reaches_effective_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");
        std::fs::write(&path, r#"{"mean_thresh": 0.7, "max_thresh": 1.4}"#).unwrap();

        let mut config = small_config();
        config.data.thresholds_file = Some(path);
        let effective = effective_config(&config);
        assert_eq!(effective.strategy.dist_mean_thresh, 0.7);
        assert_eq!(effective.strategy.dist_max_thresh, 1.4);
        assert_eq!(effective.backtest, config.backtest);
    }

    #[test]
    fn unknown_feature_is_a_config_error() {
        let mut config = small_config();
        config.features.selected = Some(vec!["bogus".into()]);
        let err = prepare_from_candles(&config, &[], "h", DataSource::Cache).unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::Feature(_))));
    }
}
