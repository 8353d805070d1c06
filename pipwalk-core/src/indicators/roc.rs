//! Rate of Change (ROC).
//!
//! ROC[t] = (close[t] - close[t-period]) / close[t-period] * 100
//! Lookback: period.

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Roc {
    period: usize,
    name: String,
}

impl Roc {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ROC period must be >= 1");
        Self {
            period,
            name: format!("roc_{period}"),
        }
    }
}

impl Indicator for Roc {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];

        for i in self.period..n {
            let prev = candles[i - self.period].close;
            if prev != 0.0 {
                result[i] = (candles[i].close - prev) / prev * 100.0;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn roc_basic() {
        let candles = make_candles(&[100.0, 110.0, 121.0]);
        let result = Roc::new(1).compute(&candles);
        assert!(result[0].is_nan());
        assert_approx(result[1], 10.0, 1e-9);
        assert_approx(result[2], 10.0, 1e-9);
    }

    #[test]
    fn roc_period_2() {
        let candles = make_candles(&[100.0, 50.0, 150.0]);
        assert_approx(Roc::new(2).compute(&candles)[2], 50.0, DEFAULT_EPSILON);
    }
}
