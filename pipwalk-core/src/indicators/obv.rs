//! On-Balance Volume.
//!
//! OBV[0] = 0; OBV[t] = OBV[t-1] + sign(close[t] - close[t-1]) * volume[t].
//! Lookback: 0.

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone, Default)]
pub struct Obv;

impl Obv {
    pub fn new() -> Self {
        Self
    }
}

impl Indicator for Obv {
    fn name(&self) -> &str {
        "obv"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let mut result = Vec::with_capacity(candles.len());
        let mut total = 0.0;
        for (i, c) in candles.iter().enumerate() {
            if i > 0 {
                let prev = candles[i - 1].close;
                if c.close > prev {
                    total += c.volume as f64;
                } else if c.close < prev {
                    total -= c.volume as f64;
                }
            }
            result.push(total);
        }
        result
    }
}
