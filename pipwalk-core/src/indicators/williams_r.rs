//! Williams %R.
//!
//! %R = -100 * (highest_high - close) / (highest_high - lowest_low)
//! Range [-100, 0]. Lookback: period - 1.

use super::{rolling_extremes, Indicator};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct WilliamsR {
    period: usize,
    name: String,
}

impl WilliamsR {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Williams %R period must be >= 1");
        Self {
            period,
            name: format!("willr_{period}"),
        }
    }
}

impl Indicator for WilliamsR {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let (highest, lowest) = rolling_extremes(candles, self.period);
        candles
            .iter()
            .enumerate()
            .map(|(i, c)| -100.0 * (highest[i] - c.close) / (highest[i] - lowest[i]))
            .collect()
    }
}
