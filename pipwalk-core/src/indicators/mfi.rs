//! Money Flow Index: volume-weighted RSI over typical price.
//!
//! Raw flow = tp * volume, signed by the direction of tp versus the previous
//! candle. MFI = 100 - 100 / (1 + positive_flow / negative_flow) over
//! `period` flows. Lookback: period.

use super::{typical_price, Indicator};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Mfi {
    period: usize,
    name: String,
}

impl Mfi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "MFI period must be >= 1");
        Self {
            period,
            name: format!("mfi_{period}"),
        }
    }
}

impl Indicator for Mfi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];
        let tp = typical_price(candles);

        // flow[i] belongs to candle i + 1
        let flows: Vec<f64> = (1..n)
            .map(|i| {
                let raw = tp[i] * candles[i].volume as f64;
                if tp[i] > tp[i - 1] {
                    raw
                } else if tp[i] < tp[i - 1] {
                    -raw
                } else {
                    0.0
                }
            })
            .collect();

        for i in self.period..n {
            let window = &flows[i - self.period..i];
            let pos: f64 = window.iter().filter(|f| **f > 0.0).sum();
            let neg: f64 = -window.iter().filter(|f| **f < 0.0).sum::<f64>();
            result[i] = if neg == 0.0 && pos == 0.0 {
                f64::NAN
            } else if neg == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + pos / neg)
            };
        }

        result
    }
}
