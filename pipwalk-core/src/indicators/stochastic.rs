//! Stochastic oscillator.
//!
//! %K = 100 * (close - lowest_low(period)) / (highest_high(period) - lowest_low(period))
//! %D = SMA(%K, smooth)
//! Lookback: period - 1 for %K, period + smooth - 2 for %D.

use super::sma::sma_of_series;
use super::{rolling_extremes, Indicator};
use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StochasticLine {
    K,
    D,
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    period: usize,
    smooth: usize,
    line: StochasticLine,
    name: String,
}

impl Stochastic {
    pub fn new(period: usize, smooth: usize, line: StochasticLine) -> Self {
        assert!(period >= 1 && smooth >= 1, "Stochastic periods must be >= 1");
        let label = match line {
            StochasticLine::K => "k",
            StochasticLine::D => "d",
        };
        Self {
            period,
            smooth,
            line,
            name: format!("stoch_{label}_{period}_{smooth}"),
        }
    }
}

/// %K series; a zero high-low range yields NaN.
pub fn stochastic_k(candles: &[Candle], period: usize) -> Vec<f64> {
    let (highest, lowest) = rolling_extremes(candles, period);
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let range = highest[i] - lowest[i];
            if range == 0.0 {
                f64::NAN
            } else {
                100.0 * (c.close - lowest[i]) / range
            }
        })
        .collect()
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            StochasticLine::K => self.period - 1,
            StochasticLine::D => self.period + self.smooth - 2,
        }
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let k = stochastic_k(candles, self.period);
        match self.line {
            StochasticLine::K => k,
            StochasticLine::D => sma_of_series(&k, self.smooth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlcv, DEFAULT_EPSILON};

    fn sample() -> Vec<Candle> {
        make_ohlcv(&[
            (10.0, 12.0, 8.0, 11.0, 1),
            (11.0, 14.0, 10.0, 13.0, 1),
            (13.0, 13.5, 9.0, 10.0, 1),
        ])
    }

    #[test]
    fn k_at_window_position() {
        // window 0..=1: HH 14, LL 8, close 13 → 100 * 5/6
        let k = Stochastic::new(2, 2, StochasticLine::K).compute(&sample());
        assert!(k[0].is_nan());
        assert_approx(k[1], 500.0 / 6.0, 1e-9);
        // window 1..=2: HH 14, LL 9, close 10 → 20
        assert_approx(k[2], 20.0, DEFAULT_EPSILON);
    }

    #[test]
    fn d_is_mean_of_k() {
        let d = Stochastic::new(2, 2, StochasticLine::D).compute(&sample());
        assert!(d[1].is_nan());
        assert_approx(d[2], (500.0 / 6.0 + 20.0) / 2.0, 1e-9);
    }
}
