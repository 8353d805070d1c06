//! Walk-forward simulation with a single-open-position trade lifecycle.
//!
//! Timestamps are processed strictly ascending. While a position is held
//! (`now <= busy_until`) the estimator is not invoked at all and the
//! timestamp is recorded as NONE. Otherwise the causal window is built, the
//! estimator runs, sides whose own label at `now` is unresolved are vetoed,
//! and a surviving side opens a position whose realized outcome is that
//! bar's own triple-barrier label.

use super::config::EngineConfig;
use super::estimator::{estimate, Estimation};
use super::progress::SimulationProgress;
use super::window::build_window;
use crate::domain::{Bar, DecisionRecord, Side, Trade};
use crate::store::FeatureStore;
use chrono::{DateTime, Duration, Utc};
use std::time::Instant;

/// IDLE when `busy_until` is `None`, HOLDING otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionState {
    pub busy_until: Option<DateTime<Utc>>,
}

impl PositionState {
    /// Whether a position blocks entries at `now`. A position whose
    /// `busy_until` has passed is cleared.
    pub fn is_holding(&mut self, now: DateTime<Utc>) -> bool {
        match self.busy_until {
            Some(until) if now <= until => true,
            Some(_) => {
                self.busy_until = None;
                false
            }
            None => false,
        }
    }

    pub fn open(&mut self, now: DateTime<Utc>, holding_minutes: u32) {
        self.busy_until = Some(now + Duration::minutes(i64::from(holding_minutes)));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationOutput {
    pub trades: Vec<Trade>,
    /// Exactly one record per evaluated timestamp, ascending.
    pub decisions: Vec<DecisionRecord>,
    /// Passing sides dropped because the bar's own label was unresolved.
    pub vetoed_unresolved: usize,
}

/// Run the walk-forward simulation over every store timestamp in
/// `[start, end]`.
pub fn simulate(
    store: &FeatureStore,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    config: &EngineConfig,
    progress: &dyn SimulationProgress,
) -> SimulationOutput {
    let bars = store.range(start, end);
    let total = bars.len();
    let started = Instant::now();
    progress.on_start(total);

    let mut state = PositionState::default();
    let mut out = SimulationOutput {
        trades: Vec::new(),
        decisions: Vec::with_capacity(total),
        vetoed_unresolved: 0,
    };

    for (i, bar) in bars.iter().enumerate() {
        let now = bar.time();
        let record = if state.is_holding(now) {
            DecisionRecord::none(now)
        } else {
            match decide(store, bar, config, &mut out.vetoed_unresolved) {
                Some(trade) => {
                    state.open(now, trade.holding_minutes);
                    let record = DecisionRecord::opened(&trade);
                    out.trades.push(trade);
                    record
                }
                None => DecisionRecord::none(now),
            }
        };
        out.decisions.push(record);
        progress.on_step(i + 1, total, started.elapsed());
    }

    progress.on_finish(out.trades.len(), total, started.elapsed());
    out
}

/// Evaluate one idle timestamp; `Some` when a position is opened.
fn decide(
    store: &FeatureStore,
    bar: &Bar,
    config: &EngineConfig,
    vetoed_unresolved: &mut usize,
) -> Option<Trade> {
    let now = bar.time();
    let window = build_window(store, now, config.days_back, config.leak_scrub);
    if !window.is_sufficient(config.min_train_samples) {
        tracing::trace!(%now, bars = window.len(), "insufficient training window");
        return None;
    }

    let estimation = estimate(&window, &bar.features, config);
    log_vetoes(now, &estimation);

    let mut candidates = Vec::with_capacity(2);
    for side in [Side::Buy, Side::Sell] {
        if !estimation.passes(side) {
            continue;
        }
        if bar.labels.label(side).is_none() {
            *vetoed_unresolved += 1;
            tracing::debug!(%now, ?side, "signal vetoed: own label unresolved");
            continue;
        }
        candidates.push(side);
    }

    let side = choose_side(&candidates, &estimation)?;
    let win = bar.labels.label(side).is_some_and(|o| o.is_win());
    let trade = Trade {
        entry_time: now,
        side,
        profit_pips: config.profit_pips(win),
        holding_minutes: bar.labels.time(side).unwrap_or(0),
    };
    tracing::debug!(
        %now,
        ?side,
        profit = trade.profit_pips,
        holding = trade.holding_minutes,
        "position opened"
    );
    Some(trade)
}

/// Higher estimated rate wins; a tie goes to BUY.
fn choose_side(candidates: &[Side], estimation: &Estimation) -> Option<Side> {
    match candidates {
        [] => None,
        [side] => Some(*side),
        _ => {
            let diag = estimation.diagnostics.as_ref()?;
            if diag.sell.rate > diag.buy.rate {
                Some(Side::Sell)
            } else {
                Some(Side::Buy)
            }
        }
    }
}

fn log_vetoes(now: DateTime<Utc>, estimation: &Estimation) {
    if !tracing::enabled!(tracing::Level::TRACE) {
        return;
    }
    let Some(diag) = &estimation.diagnostics else {
        tracing::trace!(%now, "no estimate");
        return;
    };
    for side in [Side::Buy, Side::Sell] {
        let reasons = diag.veto_reasons(side);
        if !reasons.is_empty() {
            let s = diag.side(side);
            let reasons: Vec<String> = reasons.iter().map(ToString::to_string).collect();
            tracing::trace!(
                %now,
                ?side,
                rate = s.rate,
                k = s.k,
                mean_distance = s.mean_distance,
                max_distance = s.max_distance,
                p_value = s.p_value,
                reasons = %reasons.join(", "),
                "side vetoed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BarrierLabels, Candle, Outcome, Signal};
    use crate::engine::estimator::{SideEstimate, SignalEstimate};
    use crate::engine::progress::NoProgress;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 23, 9, 0, 0).unwrap()
    }

    fn side_est(rate: f64) -> SideEstimate {
        SideEstimate {
            rate,
            mean_distance: 0.0,
            max_distance: 0.0,
            k: 10,
            wins: 10,
            p_value: 0.001,
            significant: true,
        }
    }

    fn estimation(buy: f64, sell: f64) -> Estimation {
        Estimation {
            buy: true,
            sell: true,
            diagnostics: Some(SignalEstimate {
                buy: side_est(buy),
                sell: side_est(sell),
                threshold: 50.0,
                dist_mean_thresh: 1.0,
                dist_max_thresh: 2.0,
                significance_level: 0.05,
            }),
        }
    }

    #[test]
    fn position_state_transitions() {
        let mut state = PositionState::default();
        assert!(!state.is_holding(t0()));
        state.open(t0(), 3);
        assert!(state.is_holding(t0() + Duration::minutes(3)));
        assert!(!state.is_holding(t0() + Duration::minutes(4)));
        assert_eq!(state.busy_until, None);
    }

    #[test]
    fn zero_holding_blocks_only_the_entry_minute() {
        let mut state = PositionState::default();
        state.open(t0(), 0);
        assert!(state.is_holding(t0()));
        assert!(!state.is_holding(t0() + Duration::minutes(1)));
    }

    #[test]
    fn higher_rate_wins_tie_goes_to_buy() {
        let both = [Side::Buy, Side::Sell];
        assert_eq!(choose_side(&both, &estimation(60.0, 70.0)), Some(Side::Sell));
        assert_eq!(choose_side(&both, &estimation(70.0, 60.0)), Some(Side::Buy));
        assert_eq!(choose_side(&both, &estimation(65.0, 65.0)), Some(Side::Buy));
        assert_eq!(choose_side(&[Side::Sell], &estimation(90.0, 60.0)), Some(Side::Sell));
        assert_eq!(choose_side(&[], &estimation(90.0, 60.0)), None);
    }

    /// Bars alternate between two feature clusters; cluster A always wins BUY.
    fn clustered_store(n: usize, unresolved_from: usize) -> FeatureStore {
        let bars = (0..n)
            .map(|i| {
                let a = i % 2 == 0;
                let resolved = i < unresolved_from;
                Bar {
                    candle: Candle {
                        time: t0() + Duration::minutes(i as i64),
                        open: 150.0,
                        high: 150.1,
                        low: 149.9,
                        close: 150.0,
                        volume: 10,
                    },
                    features: vec![Some(if a { 0.0 } else { 1.0 })],
                    labels: if resolved {
                        BarrierLabels {
                            label_buy: Some(if a { Outcome::Win } else { Outcome::Loss }),
                            label_sell: Some(if a { Outcome::Loss } else { Outcome::Win }),
                            time_buy: Some(2),
                            time_sell: Some(2),
                        }
                    } else {
                        BarrierLabels::unresolved()
                    },
                }
            })
            .collect();
        FeatureStore::new(vec!["f".into()], bars).unwrap()
    }

    fn config() -> EngineConfig {
        EngineConfig {
            days_back: 1,
            min_train_samples: 20,
            k_ratio: 0.2,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn one_decision_per_timestamp_and_no_overlap() {
        let store = clustered_store(120, 120);
        let start = t0() + Duration::minutes(60);
        let end = t0() + Duration::minutes(119);
        let out = simulate(&store, start, end, &config(), &NoProgress);

        assert_eq!(out.decisions.len(), 60);
        let opened = out.decisions.iter().filter(|d| d.profit.is_some()).count();
        assert_eq!(opened, out.trades.len());
        assert!(!out.trades.is_empty());
        for pair in out.trades.windows(2) {
            let busy_until = pair[0].entry_time + Duration::minutes(i64::from(pair[0].holding_minutes));
            assert!(pair[1].entry_time > busy_until);
        }
        // cluster A bars buy and win, cluster B bars sell and win
        for trade in &out.trades {
            assert!(trade.is_winner());
        }
    }

    #[test]
    fn unresolved_own_label_vetoes_entry() {
        let store = clustered_store(120, 100);
        let start = t0() + Duration::minutes(100);
        let end = t0() + Duration::minutes(119);
        let out = simulate(&store, start, end, &config(), &NoProgress);

        assert!(out.trades.is_empty());
        assert_eq!(out.decisions.len(), 20);
        assert!(out.decisions.iter().all(|d| d.signal == Signal::None));
        assert!(out.vetoed_unresolved > 0);
    }

    #[test]
    fn short_history_records_none() {
        let store = clustered_store(10, 10);
        let out = simulate(&store, t0(), t0() + Duration::minutes(9), &config(), &NoProgress);
        assert_eq!(out.decisions.len(), 10);
        assert!(out.trades.is_empty());
    }
}
