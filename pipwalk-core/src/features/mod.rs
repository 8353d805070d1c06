//! Declarative feature registry.
//!
//! Every feature is a named pure function of candle history. Computing a
//! feature set looks names up in the registry; there is no per-feature
//! branching elsewhere. Values that are NaN or infinite (warmup, zero
//! denominators) surface as `None`.

pub mod transforms;

use crate::domain::Candle;
use crate::indicators::{
    Adx, Aroon, Atr, Bollinger, BollingerBand, Cci, Cmf, Ema, Indicator, Keltner, KeltnerBand,
    Macd, MacdLine, Mfi, Momentum, Obv, Roc, Rsi, Sma, Stochastic, StochasticLine, WilliamsR,
};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;
use transforms::{diff, pct_change, relative_distance, to_options};

/// A feature: candle history in, one raw value per candle out.
pub type FeatureFn = fn(&[Candle]) -> Vec<f64>;

/// Every feature the registry can compute, in canonical order.
pub const ALL_FEATURES: &[&str] = &[
    "rsi",
    "rsi_trend",
    "adx",
    "atr",
    "atr_change",
    "obv",
    "aroon_up",
    "aroon_down",
    "price_pos",
    "range",
    "vol_roc5",
    "vol_roc10",
    "dist_to_sma_5",
    "dist_to_sma_20",
    "dist_to_sma_40",
    "dist_to_sma_240",
    "dist_to_sma_1000",
    "dist_to_ema_5",
    "dist_to_ema_20",
    "dist_to_ema_40",
    "dist_to_ema_240",
    "dist_to_ema_1000",
    "bb_upper",
    "bb_lower",
    "bb_width",
    "bb_percent",
    "kc_upper",
    "kc_lower",
    "kc_width",
    "kc_percent",
    "macd",
    "macd_signal",
    "macd_hist",
    "stoch_k",
    "stoch_d",
    "cci",
    "willr",
    "mfi",
    "cmf",
    "roc_1",
    "roc_5",
    "momentum_5",
    "ret_1",
    "ret_5",
    "hl_ratio",
];

/// Feature set used when no selection is configured.
pub const DEFAULT_FEATURES: &[&str] = &[
    "rsi_trend",
    "adx",
    "atr_change",
    "aroon_down",
    "aroon_up",
    "obv",
    "price_pos",
    "range",
    "vol_roc5",
    "vol_roc10",
];

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("unknown feature '{0}'")]
    Unknown(String),

    #[error("feature '{0}' selected more than once")]
    Duplicate(String),

    #[error("no features selected")]
    Empty,
}

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

fn volumes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.volume as f64).collect()
}

fn dist_to_sma(candles: &[Candle], period: usize) -> Vec<f64> {
    relative_distance(&closes(candles), &Sma::new(period).compute(candles))
}

fn dist_to_ema(candles: &[Candle], period: usize) -> Vec<f64> {
    relative_distance(&closes(candles), &Ema::new(period).compute(candles))
}

/// Name → feature function lookup.
pub struct FeatureRegistry {
    entries: BTreeMap<&'static str, FeatureFn>,
}

impl FeatureRegistry {
    /// The full candidate set.
    pub fn standard() -> &'static FeatureRegistry {
        static REGISTRY: OnceLock<FeatureRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::build)
    }

    fn build() -> Self {
        let mut entries: BTreeMap<&'static str, FeatureFn> = BTreeMap::new();

        entries.insert("rsi", |c| Rsi::new(14).compute(c));
        entries.insert("rsi_trend", |c| diff(&Rsi::new(14).compute(c), 5));
        entries.insert("adx", |c| Adx::new(14).compute(c));
        entries.insert("atr", |c| Atr::new(14).compute(c));
        entries.insert("atr_change", |c| pct_change(&Atr::new(14).compute(c), 1));
        entries.insert("obv", |c| Obv::new().compute(c));
        entries.insert("aroon_up", |c| Aroon::up(14).compute(c));
        entries.insert("aroon_down", |c| Aroon::down(14).compute(c));
        entries.insert("price_pos", |c| {
            c.iter()
                .map(|x| (x.close - x.low) / (x.high - x.low))
                .collect()
        });
        entries.insert("range", |c| c.iter().map(|x| x.high - x.low).collect());
        entries.insert("vol_roc5", |c| pct_change(&volumes(c), 5));
        entries.insert("vol_roc10", |c| pct_change(&volumes(c), 10));

        entries.insert("dist_to_sma_5", |c| dist_to_sma(c, 5));
        entries.insert("dist_to_sma_20", |c| dist_to_sma(c, 20));
        entries.insert("dist_to_sma_40", |c| dist_to_sma(c, 40));
        entries.insert("dist_to_sma_240", |c| dist_to_sma(c, 240));
        entries.insert("dist_to_sma_1000", |c| dist_to_sma(c, 1000));
        entries.insert("dist_to_ema_5", |c| dist_to_ema(c, 5));
        entries.insert("dist_to_ema_20", |c| dist_to_ema(c, 20));
        entries.insert("dist_to_ema_40", |c| dist_to_ema(c, 40));
        entries.insert("dist_to_ema_240", |c| dist_to_ema(c, 240));
        entries.insert("dist_to_ema_1000", |c| dist_to_ema(c, 1000));

        entries.insert("bb_upper", |c| Bollinger::new(20, 2.0, BollingerBand::Upper).compute(c));
        entries.insert("bb_lower", |c| Bollinger::new(20, 2.0, BollingerBand::Lower).compute(c));
        entries.insert("bb_width", |c| Bollinger::new(20, 2.0, BollingerBand::Width).compute(c));
        entries.insert("bb_percent", |c| {
            Bollinger::new(20, 2.0, BollingerBand::Percent).compute(c)
        });
        entries.insert("kc_upper", |c| Keltner::new(20, KeltnerBand::Upper).compute(c));
        entries.insert("kc_lower", |c| Keltner::new(20, KeltnerBand::Lower).compute(c));
        entries.insert("kc_width", |c| Keltner::new(20, KeltnerBand::Width).compute(c));
        entries.insert("kc_percent", |c| Keltner::new(20, KeltnerBand::Percent).compute(c));

        entries.insert("macd", |c| Macd::standard(MacdLine::Macd).compute(c));
        entries.insert("macd_signal", |c| Macd::standard(MacdLine::Signal).compute(c));
        entries.insert("macd_hist", |c| Macd::standard(MacdLine::Hist).compute(c));
        entries.insert("stoch_k", |c| Stochastic::new(14, 3, StochasticLine::K).compute(c));
        entries.insert("stoch_d", |c| Stochastic::new(14, 3, StochasticLine::D).compute(c));
        entries.insert("cci", |c| Cci::new(20).compute(c));
        entries.insert("willr", |c| WilliamsR::new(14).compute(c));
        entries.insert("mfi", |c| Mfi::new(14).compute(c));
        entries.insert("cmf", |c| Cmf::new(20).compute(c));

        entries.insert("roc_1", |c| Roc::new(1).compute(c));
        entries.insert("roc_5", |c| Roc::new(5).compute(c));
        entries.insert("momentum_5", |c| Momentum::new(5).compute(c));
        entries.insert("ret_1", |c| pct_change(&closes(c), 1));
        entries.insert("ret_5", |c| pct_change(&closes(c), 5));
        entries.insert("hl_ratio", |c| {
            c.iter().map(|x| (x.high - x.low) / x.close).collect()
        });

        Self { entries }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Compute one feature column.
    pub fn compute(&self, name: &str, candles: &[Candle]) -> Result<Vec<Option<f64>>, FeatureError> {
        let f = self
            .entries
            .get(name)
            .ok_or_else(|| FeatureError::Unknown(name.to_string()))?;
        Ok(to_options(f(candles)))
    }

    /// Reject unknown, duplicated or empty selections.
    pub fn validate(&self, names: &[String]) -> Result<(), FeatureError> {
        if names.is_empty() {
            return Err(FeatureError::Empty);
        }
        for (i, name) in names.iter().enumerate() {
            if !self.contains(name) {
                return Err(FeatureError::Unknown(name.clone()));
            }
            if names[..i].contains(name) {
                return Err(FeatureError::Duplicate(name.clone()));
            }
        }
        Ok(())
    }
}

/// Default selection as owned names.
pub fn default_features() -> Vec<String> {
    DEFAULT_FEATURES.iter().map(|s| s.to_string()).collect()
}

/// Column-major feature values for a candle series.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    names: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
    len: usize,
}

impl FeatureMatrix {
    pub fn compute(candles: &[Candle], names: &[String]) -> Result<Self, FeatureError> {
        let registry = FeatureRegistry::standard();
        registry.validate(names)?;

        let columns = names
            .iter()
            .map(|name| registry.compute(name, candles))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(features = names.len(), candles = candles.len(), "computed feature matrix");

        Ok(Self {
            names: names.to_vec(),
            columns,
            len: candles.len(),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Feature vector of one candle, in `names()` order.
    pub fn row(&self, index: usize) -> Vec<Option<f64>> {
        self.columns.iter().map(|col| col[index]).collect()
    }
}
