//! Triple-barrier labeling.
//!
//! For each minute i, a BUY entered at `close[i] + half_spread` and a SELL
//! entered at `close[i] - half_spread` each get a take-profit and a stop-loss
//! barrier. The next `horizon` candles are scanned; the first barrier touched
//! decides the label and `j - i` is the time to resolution. A candle that
//! touches both barriers of either side makes the ordering inside that minute
//! unknowable, so the whole timestamp is left unlabeled.

use crate::domain::{BarrierLabels, Candle, Outcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    pub tp_pips: f64,
    pub sl_pips: f64,
    pub spread_pips: f64,
    pub pip_size: f64,
    /// Forward scan length in minutes.
    pub horizon: usize,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            tp_pips: 10.0,
            sl_pips: 10.0,
            spread_pips: 0.2,
            pip_size: 0.01,
            horizon: 60,
        }
    }
}

/// Label every candle. The last `horizon` candles never get labels.
pub fn label_candles(candles: &[Candle], config: &LabelConfig) -> Vec<BarrierLabels> {
    let n = candles.len();
    let mut labels = vec![BarrierLabels::default(); n];
    if n <= config.horizon {
        return labels;
    }

    let half_spread = config.spread_pips / 2.0 * config.pip_size;
    let tp = config.tp_pips * config.pip_size;
    let sl = config.sl_pips * config.pip_size;

    for i in 0..(n - config.horizon) {
        let mid = candles[i].close;
        let entry_b = mid + half_spread;
        let entry_s = mid - half_spread;
        let (tp_b, sl_b) = (entry_b + tp, entry_b - sl);
        let (tp_s, sl_s) = (entry_s - tp, entry_s + sl);

        let mut out = BarrierLabels::default();
        let mut ambiguous = false;

        for j in (i + 1)..=(i + config.horizon) {
            let (h, l) = (candles[j].high, candles[j].low);
            if (h >= tp_b && l <= sl_b) || (l <= tp_s && h >= sl_s) {
                ambiguous = true;
                break;
            }
            let elapsed = (j - i) as u32;
            if out.label_buy.is_none() {
                if h >= tp_b {
                    out.label_buy = Some(Outcome::Win);
                    out.time_buy = Some(elapsed);
                } else if l <= sl_b {
                    out.label_buy = Some(Outcome::Loss);
                    out.time_buy = Some(elapsed);
                }
            }
            if out.label_sell.is_none() {
                if l <= tp_s {
                    out.label_sell = Some(Outcome::Win);
                    out.time_sell = Some(elapsed);
                } else if h >= sl_s {
                    out.label_sell = Some(Outcome::Loss);
                    out.time_sell = Some(elapsed);
                }
            }
            if out.label_buy.is_some() && out.label_sell.is_some() {
                break;
            }
        }

        if !ambiguous {
            labels[i] = out;
        }
    }

    let labeled = labels
        .iter()
        .filter(|l| l.label_buy.is_some() || l.label_sell.is_some())
        .count();
    tracing::debug!(candles = n, labeled, horizon = config.horizon, "triple-barrier labels");

    labels
}
