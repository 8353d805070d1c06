//! Aroon: time since the highest high and lowest low as a percentage.
//!
//! Aroon Up = 100 * (period - candles_since_highest_high) / period
//! Aroon Down = 100 * (period - candles_since_lowest_low) / period
//! Window is the last period + 1 candles. Two bands (separate instances).
//! Lookback: period.

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AroonBand {
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct Aroon {
    period: usize,
    band: AroonBand,
    name: String,
}

impl Aroon {
    pub fn up(period: usize) -> Self {
        assert!(period >= 1, "Aroon period must be >= 1");
        Self {
            period,
            band: AroonBand::Up,
            name: format!("aroon_up_{period}"),
        }
    }

    pub fn down(period: usize) -> Self {
        assert!(period >= 1, "Aroon period must be >= 1");
        Self {
            period,
            band: AroonBand::Down,
            name: format!("aroon_down_{period}"),
        }
    }
}

impl Indicator for Aroon {
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
            let window = &candles[i - self.period..=i];

            // Most recent extreme wins ties.
            let offset = match self.band {
                AroonBand::Up => {
                    let mut best = f64::NEG_INFINITY;
                    let mut at = 0;
                    for (j, c) in window.iter().enumerate() {
                        if c.high >= best {
                            best = c.high;
                            at = j;
                        }
                    }
                    at
                }
                AroonBand::Down => {
                    let mut best = f64::INFINITY;
                    let mut at = 0;
                    for (j, c) in window.iter().enumerate() {
                        if c.low <= best {
                            best = c.low;
                            at = j;
                        }
                    }
                    at
                }
            };

            let since = self.period - offset;
            result[i] = 100.0 * (self.period - since) as f64 / self.period as f64;
        }

        result
    }
}
