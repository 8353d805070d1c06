//! Commodity Channel Index.
//!
//! CCI = (tp - SMA(tp, period)) / (0.015 * mean_abs_deviation(tp, period))
//! Lookback: period - 1. A flat window has zero deviation and yields a
//! non-finite value.

use super::sma::sma_of_series;
use super::{typical_price, Indicator};
use crate::domain::Candle;

const LAMBERT: f64 = 0.015;

#[derive(Debug, Clone)]
pub struct Cci {
    period: usize,
    name: String,
}

impl Cci {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "CCI period must be >= 1");
        Self {
            period,
            name: format!("cci_{period}"),
        }
    }
}

impl Indicator for Cci {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let tp = typical_price(candles);
        let mean = sma_of_series(&tp, self.period);
        let mut result = vec![f64::NAN; candles.len()];

        for i in self.lookback()..candles.len() {
            let window = &tp[i + 1 - self.period..=i];
            let mad = window.iter().map(|v| (v - mean[i]).abs()).sum::<f64>() / self.period as f64;
            result[i] = (tp[i] - mean[i]) / (LAMBERT * mad);
        }

        result
    }
}
