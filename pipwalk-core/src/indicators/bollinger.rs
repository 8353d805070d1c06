//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(close, period)
//! - Upper / Lower: middle ± mult * stddev(close, period), population stddev
//! - Width: (upper - lower) / middle * 100
//! - Percent: (close - lower) / (upper - lower)
//!
//! Lookback: period - 1.

use super::sma::{rolling_std, sma_of_series};
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
    Width,
    Percent,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        let label = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
            BollingerBand::Width => "width",
            BollingerBand::Percent => "percent",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bollinger_{label}_{period}_{multiplier}"),
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let mid = sma_of_series(&closes, self.period);
        let std = rolling_std(&closes, self.period);

        (0..candles.len())
            .map(|i| {
                let upper = mid[i] + self.multiplier * std[i];
                let lower = mid[i] - self.multiplier * std[i];
                match self.band {
                    BollingerBand::Middle => mid[i],
                    BollingerBand::Upper => upper,
                    BollingerBand::Lower => lower,
                    BollingerBand::Width => (upper - lower) / mid[i] * 100.0,
                    BollingerBand::Percent => (closes[i] - lower) / (upper - lower),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn bands_around_mean() {
        // closes 1, 3: mean 2, population std 1
        let candles = make_candles(&[1.0, 3.0]);
        assert_approx(
            Bollinger::new(2, 2.0, BollingerBand::Upper).compute(&candles)[1],
            4.0,
            DEFAULT_EPSILON,
        );
        assert_approx(
            Bollinger::new(2, 2.0, BollingerBand::Lower).compute(&candles)[1],
            0.0,
            DEFAULT_EPSILON,
        );
        assert_approx(
            Bollinger::new(2, 2.0, BollingerBand::Width).compute(&candles)[1],
            200.0,
            DEFAULT_EPSILON,
        );
        // close 3 within [0, 4]
        assert_approx(
            Bollinger::new(2, 2.0, BollingerBand::Percent).compute(&candles)[1],
            0.75,
            DEFAULT_EPSILON,
        );
    }

    #[test]
    fn flat_series_percent_is_not_finite() {
        let candles = make_candles(&[5.0, 5.0, 5.0]);
        let pct = Bollinger::new(2, 2.0, BollingerBand::Percent).compute(&candles);
        assert!(!pct[2].is_finite());
    }

    #[test]
    fn warmup_is_nan() {
        let candles = make_candles(&[1.0, 2.0, 3.0]);
        let mid = Bollinger::new(3, 2.0, BollingerBand::Middle).compute(&candles);
        assert!(mid[1].is_nan());
        assert_approx(mid[2], 2.0, DEFAULT_EPSILON);
    }
}
