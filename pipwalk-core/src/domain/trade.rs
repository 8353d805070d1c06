//! Trade ledger entries and per-timestamp decision records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an opened position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// What the engine decided at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    None,
}

impl From<Side> for Signal {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => Signal::Buy,
            Side::Sell => Signal::Sell,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::None => "NONE",
        };
        f.write_str(s)
    }
}

/// A realized trade: entry time, direction, pips after spread, holding minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_time: DateTime<Utc>,
    pub side: Side,
    pub profit_pips: f64,
    pub holding_minutes: u32,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.profit_pips > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.profit_pips < 0.0
    }
}

/// One record per evaluated timestamp. `profit` is `None` unless a position
/// was opened at `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub time: DateTime<Utc>,
    pub signal: Signal,
    pub profit: Option<f64>,
}

impl DecisionRecord {
    pub fn none(time: DateTime<Utc>) -> Self {
        Self {
            time,
            signal: Signal::None,
            profit: None,
        }
    }

    pub fn opened(trade: &Trade) -> Self {
        Self {
            time: trade.entry_time,
            signal: trade.side.into(),
            profit: Some(trade.profit_pips),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_trade() -> Trade {
        Trade {
            entry_time: Utc.with_ymd_and_hms(2025, 4, 22, 1, 15, 0).unwrap(),
            side: Side::Sell,
            profit_pips: -10.2,
            holding_minutes: 7,
        }
    }

    #[test]
    fn loser_classification() {
        let trade = sample_trade();
        assert!(trade.is_loser());
        assert!(!trade.is_winner());
    }

    #[test]
    fn decision_from_trade_carries_side_and_profit() {
        let record = DecisionRecord::opened(&sample_trade());
        assert_eq!(record.signal, Signal::Sell);
        assert_eq!(record.profit, Some(-10.2));
    }

    #[test]
    fn signal_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Signal::None).unwrap(), "\"NONE\"");
        assert_eq!(Signal::Buy.to_string(), "BUY");
    }
}
