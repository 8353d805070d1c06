//! Technical indicators over minute candles.
//!
//! Indicators are pure functions: candle history in, numeric series out, one
//! value per candle with `f64::NAN` during warmup. The feature registry turns
//! these series into `Option<f64>` feature columns.
//!
//! Multi-series indicators (Aroon, Bollinger, Keltner, MACD, Stochastic) are
//! exposed as separate named instances per line, keeping the single-series
//! `Indicator` trait unchanged.

pub mod adx;
pub mod aroon;
pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod cmf;
pub mod ema;
pub mod keltner;
pub mod macd;
pub mod mfi;
pub mod momentum;
pub mod obv;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod williams_r;

pub use adx::Adx;
pub use aroon::{Aroon, AroonBand};
pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerBand};
pub use cci::Cci;
pub use cmf::Cmf;
pub use ema::Ema;
pub use keltner::{Keltner, KeltnerBand};
pub use macd::{Macd, MacdLine};
pub use mfi::Mfi;
pub use momentum::Momentum;
pub use obv::Obv;
pub use roc::Roc;
pub use rsi::Rsi;
pub use sma::Sma;
pub use stochastic::{Stochastic, StochasticLine};
pub use williams_r::WilliamsR;

use crate::domain::Candle;

/// Trait for indicators.
///
/// Indicators take a full candle series and produce a numeric output series
/// of the same length. The first `lookback()` values are `f64::NAN` (warmup).
///
/// # Look-ahead contamination guard
/// No indicator value at candle t may depend on candle t+1 or later. Every
/// indicator must pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of candles needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire candle series.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Typical price (high + low + close) / 3.
pub fn typical_price(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .map(|c| (c.high + c.low + c.close) / 3.0)
        .collect()
}

/// Rolling highest high and lowest low over `period` candles ending at t.
/// NaN until `period` candles are available.
pub fn rolling_extremes(candles: &[Candle], period: usize) -> (Vec<f64>, Vec<f64>) {
    let n = candles.len();
    let mut highest = vec![f64::NAN; n];
    let mut lowest = vec![f64::NAN; n];
    if period == 0 || n < period {
        return (highest, lowest);
    }
    for i in (period - 1)..n {
        let window = &candles[i + 1 - period..=i];
        highest[i] = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        lowest[i] = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    }
    (highest, lowest)
}

/// Create synthetic minute candles from close prices for testing.
///
/// Generates plausible OHLCV: open = prev_close (or close for the first
/// candle), high = max(open,close) + 0.05, low = min(open,close) - 0.05,
/// volume = 100.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2025, 4, 21, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                time: base + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 0.05,
                low: open.min(close) - 0.05,
                close,
                volume: 100,
            }
        })
        .collect()
}

/// Create candles from explicit (open, high, low, close, volume) tuples.
#[cfg(test)]
pub fn make_ohlcv(data: &[(f64, f64, f64, f64, u64)]) -> Vec<Candle> {
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2025, 4, 21, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, volume))| Candle {
            time: base + chrono::Duration::minutes(i as i64),
            open,
            high,
            low,
            close,
            volume,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
