//! Bar: a candle joined with its feature vector and triple-barrier labels.

use super::candle::Candle;
use super::trade::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resolved outcome of a hypothetical position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    pub fn is_win(self) -> bool {
        matches!(self, Outcome::Win)
    }

    /// 1.0 for a win, 0.0 for a loss (the value used in neighbor votes).
    pub fn as_f64(self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Loss => 0.0,
        }
    }
}

/// Barrier labels for one bar, both directions.
///
/// `None` means unresolved within the label horizon (or invalidated because
/// both barriers of one side were touched by the same forward candle).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierLabels {
    pub label_buy: Option<Outcome>,
    pub label_sell: Option<Outcome>,
    /// Minutes until the BUY barrier resolved.
    pub time_buy: Option<u32>,
    /// Minutes until the SELL barrier resolved.
    pub time_sell: Option<u32>,
}

impl BarrierLabels {
    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn label(&self, side: Side) -> Option<Outcome> {
        match side {
            Side::Buy => self.label_buy,
            Side::Sell => self.label_sell,
        }
    }

    pub fn time(&self, side: Side) -> Option<u32> {
        match side {
            Side::Buy => self.time_buy,
            Side::Sell => self.time_sell,
        }
    }
}

/// A labeled bar as held by the feature/label store.
///
/// `features` follows the schema of the owning store: one slot per selected
/// feature, `None` where the feature is not yet defined (warmup) or not
/// finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub candle: Candle,
    pub features: Vec<Option<f64>>,
    pub labels: BarrierLabels,
}

impl Bar {
    pub fn time(&self) -> DateTime<Utc> {
        self.candle.time
    }

    /// Feature vector with every slot present, or `None` if any is missing.
    pub fn complete_features(&self) -> Option<Vec<f64>> {
        self.features.iter().copied().collect()
    }

    pub fn has_complete_features(&self) -> bool {
        self.features.iter().all(Option::is_some)
    }
}
