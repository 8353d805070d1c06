//! Outcome metrics: a pure reduction over the trade ledger and decision records.
//!
//! Every statistic is a pure function of its inputs. No dependencies on the
//! runner, data pipeline, or engine state.

use chrono::{DateTime, Utc};
use pipwalk_core::domain::{DecisionRecord, Signal, Trade};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Streak length → number of streaks of that length.
pub type StreakDistribution = BTreeMap<usize, usize>;

/// Aggregate statistics of one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMetrics {
    pub num_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percent of trades with positive profit.
    pub win_rate: f64,
    pub gross_profit: f64,
    /// Positive magnitude of the summed losses.
    pub gross_loss: f64,
    pub net_profit: f64,
    /// `gross_profit / gross_loss`; infinite without losses (JSON `null`).
    #[serde(with = "infinite_as_null")]
    pub profit_factor: f64,
    pub avg_return: f64,
    /// Calendar days spanned by the simulation, inclusive.
    pub days: i64,

    /// Minutes between consecutive entries.
    pub avg_wait: f64,
    pub median_wait: f64,
    pub std_wait: f64,

    /// Holding minutes.
    pub mean_hold: f64,
    pub median_hold: f64,
    pub std_hold: f64,
    pub avg_hold_win: f64,
    pub avg_hold_loss: f64,

    /// Largest fall of cumulative pips from its running peak.
    pub max_drawdown: f64,

    pub win_streaks: StreakDistribution,
    pub loss_streaks: StreakDistribution,
    pub buy_signal_streaks: StreakDistribution,
    pub sell_signal_streaks: StreakDistribution,
    pub buy_loss_streaks: StreakDistribution,
    pub sell_loss_streaks: StreakDistribution,

    /// Entries vetoed because the bar's own outcome was unresolved.
    pub no_decision_count: usize,
    /// `no_decision_count` as a percent of attempted entries.
    pub no_decision_rate: f64,
}

impl OutcomeMetrics {
    pub fn compute(
        trades: &[Trade],
        decisions: &[DecisionRecord],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        let profits: Vec<f64> = trades.iter().map(|t| t.profit_pips).collect();
        let num_trades = trades.len();
        let wins = profits.iter().filter(|p| **p > 0.0).count();
        let losses = profits.iter().filter(|p| **p < 0.0).count();
        let gross_profit: f64 = profits.iter().filter(|p| **p > 0.0).sum();
        let gross_loss: f64 = -profits.iter().filter(|p| **p < 0.0).sum::<f64>();
        let net_profit = gross_profit - gross_loss;

        let waits = wait_minutes(trades);
        let holds: Vec<f64> = trades.iter().map(|t| f64::from(t.holding_minutes)).collect();
        let hold_win: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_winner())
            .map(|t| f64::from(t.holding_minutes))
            .collect();
        let hold_loss: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_loser())
            .map(|t| f64::from(t.holding_minutes))
            .collect();

        let (win_streaks, loss_streaks) = outcome_streaks(&profits);
        let (buy_signal_streaks, sell_signal_streaks) = signal_streaks(decisions);
        let (buy_loss_streaks, sell_loss_streaks) = side_loss_streaks(decisions);

        Self {
            num_trades,
            wins,
            losses,
            win_rate: percent(wins, num_trades),
            gross_profit,
            gross_loss,
            net_profit,
            profit_factor: profit_factor(gross_profit, gross_loss),
            avg_return: if num_trades > 0 {
                net_profit / num_trades as f64
            } else {
                0.0
            },
            days: (end - start).num_days() + 1,
            avg_wait: mean(&waits),
            median_wait: median(&waits),
            std_wait: std_dev(&waits),
            mean_hold: mean(&holds),
            median_hold: median(&holds),
            std_hold: std_dev(&holds),
            avg_hold_win: mean(&hold_win),
            avg_hold_loss: mean(&hold_loss),
            max_drawdown: max_drawdown(&cumulative(&profits)),
            win_streaks,
            loss_streaks,
            buy_signal_streaks,
            sell_signal_streaks,
            buy_loss_streaks,
            sell_loss_streaks,
            no_decision_count: 0,
            no_decision_rate: 0.0,
        }
    }

    /// Attach the count of entries vetoed for an unresolved own label.
    pub fn with_no_decisions(mut self, vetoed: usize) -> Self {
        self.no_decision_count = vetoed;
        self.no_decision_rate = percent(vetoed, vetoed + self.num_trades);
        self
    }

    /// Net pips per simulated day.
    pub fn daily_net_profit(&self) -> f64 {
        if self.days > 0 {
            self.net_profit / self.days as f64
        } else {
            0.0
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// `gross_profit / gross_loss`, `+∞` when there are no losses.
pub fn profit_factor(gross_profit: f64, gross_loss: f64) -> f64 {
    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else {
        f64::INFINITY
    }
}

/// Running sum of per-trade pips (the equity curve in pips).
pub fn cumulative(profits: &[f64]) -> Vec<f64> {
    profits
        .iter()
        .scan(0.0, |acc, p| {
            *acc += p;
            Some(*acc)
        })
        .collect()
}

/// Largest drop from the running peak of `curve`. The peak starts at the
/// first point, so an opening loss is not a drawdown.
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for v in curve {
        peak = peak.max(*v);
        worst = worst.max(peak - v);
    }
    worst
}

/// Minutes between consecutive entry times.
pub fn wait_minutes(trades: &[Trade]) -> Vec<f64> {
    trades
        .windows(2)
        .map(|w| (w[1].entry_time - w[0].entry_time).num_seconds() as f64 / 60.0)
        .collect()
}

/// Runs of consecutive winning and losing trades. A zero-profit trade
/// extends neither run.
pub fn outcome_streaks(profits: &[f64]) -> (StreakDistribution, StreakDistribution) {
    let mut wins = StreakDistribution::new();
    let mut losses = StreakDistribution::new();
    let (mut cw, mut cl) = (0usize, 0usize);
    for p in profits {
        if *p > 0.0 {
            cw += 1;
            if cl > 0 {
                *losses.entry(cl).or_default() += 1;
                cl = 0;
            }
        } else if *p < 0.0 {
            cl += 1;
            if cw > 0 {
                *wins.entry(cw).or_default() += 1;
                cw = 0;
            }
        }
    }
    if cw > 0 {
        *wins.entry(cw).or_default() += 1;
    }
    if cl > 0 {
        *losses.entry(cl).or_default() += 1;
    }
    (wins, losses)
}

/// Runs of consecutive BUY and SELL decision records. NONE ends a run, as
/// does a switch to the other side.
pub fn signal_streaks(decisions: &[DecisionRecord]) -> (StreakDistribution, StreakDistribution) {
    let mut buy = StreakDistribution::new();
    let mut sell = StreakDistribution::new();
    let mut current = Signal::None;
    let mut count = 0usize;

    let mut close = |signal: Signal, count: usize| match signal {
        Signal::Buy => *buy.entry(count).or_default() += 1,
        Signal::Sell => *sell.entry(count).or_default() += 1,
        Signal::None => {}
    };

    for d in decisions {
        if d.signal != Signal::None && d.signal == current {
            count += 1;
            continue;
        }
        close(current, count);
        current = d.signal;
        count = usize::from(d.signal != Signal::None);
    }
    close(current, count);
    (buy, sell)
}

/// Per-side runs of consecutive losing entries. A win on the same side ends
/// the run; entries on the other side do not.
pub fn side_loss_streaks(decisions: &[DecisionRecord]) -> (StreakDistribution, StreakDistribution) {
    let mut buy = StreakDistribution::new();
    let mut sell = StreakDistribution::new();
    let (mut bl, mut sl) = (0usize, 0usize);
    for d in decisions {
        let Some(profit) = d.profit else { continue };
        let (run, dist) = match d.signal {
            Signal::Buy => (&mut bl, &mut buy),
            Signal::Sell => (&mut sl, &mut sell),
            Signal::None => continue,
        };
        if profit < 0.0 {
            *run += 1;
        } else if *run > 0 {
            *dist.entry(*run).or_default() += 1;
            *run = 0;
        }
    }
    if bl > 0 {
        *buy.entry(bl).or_default() += 1;
    }
    if sl > 0 {
        *sell.entry(sl).or_default() += 1;
    }
    (buy, sell)
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Serde adapter writing non-finite floats as `null` and reading `null` back
/// as `+∞`.
pub(crate) mod infinite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_f64(*value)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}
