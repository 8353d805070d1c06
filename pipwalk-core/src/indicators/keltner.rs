//! Keltner Channel, classic (Chester Keltner) form.
//!
//! - Middle: SMA(typical price, period)
//! - Upper: SMA((4*high - 2*low + close) / 3, period)
//! - Lower: SMA((-2*high + 4*low + close) / 3, period)
//! - Width: (upper - lower) / middle * 100
//! - Percent: (close - lower) / (upper - lower)
//!
//! Lookback: period - 1.

use super::sma::sma_of_series;
use super::{typical_price, Indicator};
use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeltnerBand {
    Upper,
    Middle,
    Lower,
    Width,
    Percent,
}

#[derive(Debug, Clone)]
pub struct Keltner {
    period: usize,
    band: KeltnerBand,
    name: String,
}

impl Keltner {
    pub fn new(period: usize, band: KeltnerBand) -> Self {
        assert!(period >= 1, "Keltner period must be >= 1");
        let label = match band {
            KeltnerBand::Upper => "upper",
            KeltnerBand::Middle => "middle",
            KeltnerBand::Lower => "lower",
            KeltnerBand::Width => "width",
            KeltnerBand::Percent => "percent",
        };
        Self {
            period,
            band,
            name: format!("keltner_{label}_{period}"),
        }
    }
}

impl Indicator for Keltner {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let mid = sma_of_series(&typical_price(candles), self.period);
        if self.band == KeltnerBand::Middle {
            return mid;
        }

        let up_src: Vec<f64> = candles
            .iter()
            .map(|c| (4.0 * c.high - 2.0 * c.low + c.close) / 3.0)
            .collect();
        let down_src: Vec<f64> = candles
            .iter()
            .map(|c| (-2.0 * c.high + 4.0 * c.low + c.close) / 3.0)
            .collect();
        let upper = sma_of_series(&up_src, self.period);
        let lower = sma_of_series(&down_src, self.period);

        match self.band {
            KeltnerBand::Upper => upper,
            KeltnerBand::Lower => lower,
            KeltnerBand::Width => (0..candles.len())
                .map(|i| (upper[i] - lower[i]) / mid[i] * 100.0)
                .collect(),
            KeltnerBand::Percent => (0..candles.len())
                .map(|i| (candles[i].close - lower[i]) / (upper[i] - lower[i]))
                .collect(),
            KeltnerBand::Middle => mid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlcv, DEFAULT_EPSILON};

    #[test]
    fn single_candle_window() {
        let candles = make_ohlcv(&[(10.0, 12.0, 9.0, 11.0, 1)]);
        // upper (48 - 18 + 11)/3, lower (-24 + 36 + 11)/3, middle 32/3
        assert_approx(
            Keltner::new(1, KeltnerBand::Upper).compute(&candles)[0],
            41.0 / 3.0,
            DEFAULT_EPSILON,
        );
        assert_approx(
            Keltner::new(1, KeltnerBand::Lower).compute(&candles)[0],
            23.0 / 3.0,
            DEFAULT_EPSILON,
        );
        assert_approx(
            Keltner::new(1, KeltnerBand::Middle).compute(&candles)[0],
            32.0 / 3.0,
            DEFAULT_EPSILON,
        );
        assert_approx(
            Keltner::new(1, KeltnerBand::Percent).compute(&candles)[0],
            (11.0 - 23.0 / 3.0) / 6.0,
            1e-12,
        );
    }

    #[test]
    fn upper_above_lower() {
        let candles = make_ohlcv(&[
            (10.0, 12.0, 9.0, 11.0, 1),
            (11.0, 13.0, 10.0, 12.0, 1),
            (12.0, 12.5, 10.5, 11.0, 1),
        ]);
        let upper = Keltner::new(2, KeltnerBand::Upper).compute(&candles);
        let lower = Keltner::new(2, KeltnerBand::Lower).compute(&candles);
        assert!(upper[0].is_nan());
        for i in 1..3 {
            assert!(upper[i] > lower[i]);
        }
    }
}
