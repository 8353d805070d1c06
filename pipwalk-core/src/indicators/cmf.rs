//! Chaikin Money Flow.
//!
//! multiplier = ((close - low) - (high - close)) / (high - low), 0 when high == low
//! CMF = sum(multiplier * volume, period) / sum(volume, period)
//! Lookback: period - 1.

use super::sma::rolling_sum;
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Cmf {
    period: usize,
    name: String,
}

impl Cmf {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "CMF period must be >= 1");
        Self {
            period,
            name: format!("cmf_{period}"),
        }
    }
}

impl Indicator for Cmf {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let mfv: Vec<f64> = candles
            .iter()
            .map(|c| {
                let range = c.high - c.low;
                let mult = if range == 0.0 {
                    0.0
                } else {
                    ((c.close - c.low) - (c.high - c.close)) / range
                };
                mult * c.volume as f64
            })
            .collect();
        let volume: Vec<f64> = candles.iter().map(|c| c.volume as f64).collect();

        let flow = rolling_sum(&mfv, self.period);
        let vol = rolling_sum(&volume, self.period);
        flow.iter().zip(&vol).map(|(f, v)| f / v).collect()
    }
}
