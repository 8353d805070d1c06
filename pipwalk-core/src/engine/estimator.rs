//! Neighborhood signal estimator.
//!
//! For one decision, the BUY and SELL training subsets are standardized
//! together, the query's nearest labeled neighbors are found per side, the
//! neighborhood size is chosen adaptively against the distance thresholds,
//! and a distance-weighted win rate is gated by the breakeven threshold, the
//! distance thresholds and an exact one-sided binomial test.

use super::config::EngineConfig;
use super::stats::binomial_p_greater;
use super::window::TrainingWindow;
use crate::domain::{Outcome, Side};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subsets at least this large compute distances on the rayon pool.
const PARALLEL_MIN_ROWS: usize = 4096;

/// Column-wise standardization (population std; zero-variance columns keep
/// scale 1).
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Scaler {
    /// Fit on a non-empty set of equally long rows.
    pub fn fit<'a>(rows: impl IntoIterator<Item = &'a [f64]>) -> Option<Self> {
        let mut iter = rows.into_iter().peekable();
        let dim = iter.peek()?.len();
        let mut n = 0usize;
        let mut sum = vec![0.0; dim];
        let mut sum_sq = vec![0.0; dim];
        let mut collected: Vec<&[f64]> = Vec::new();
        for row in iter {
            for (j, v) in row.iter().enumerate() {
                sum[j] += v;
            }
            collected.push(row);
            n += 1;
        }
        let mean: Vec<f64> = sum.iter().map(|s| s / n as f64).collect();
        for row in &collected {
            for (j, v) in row.iter().enumerate() {
                let d = v - mean[j];
                sum_sq[j] += d * d;
            }
        }
        let scale = sum_sq
            .iter()
            .map(|ss| {
                let std = (ss / n as f64).sqrt();
                if std > 0.0 && std.is_finite() {
                    std
                } else {
                    1.0
                }
            })
            .collect();
        Some(Self { mean, scale })
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

/// Per-side diagnostics of one estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEstimate {
    /// Distance-weighted win rate in percent.
    pub rate: f64,
    pub mean_distance: f64,
    pub max_distance: f64,
    /// Chosen neighborhood size.
    pub k: usize,
    /// Unweighted wins among the k neighbors.
    pub wins: usize,
    pub p_value: f64,
    pub significant: bool,
}

/// Diagnostics of one decision's estimate, both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEstimate {
    pub buy: SideEstimate,
    pub sell: SideEstimate,
    /// Breakeven win rate in percent.
    pub threshold: f64,
    pub dist_mean_thresh: f64,
    pub dist_max_thresh: f64,
    pub significance_level: f64,
}

/// A failed gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VetoReason {
    BelowThreshold,
    MeanDistance,
    MaxDistance,
    NotSignificant,
}

impl fmt::Display for VetoReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VetoReason::BelowThreshold => "rate below breakeven threshold",
            VetoReason::MeanDistance => "mean distance above threshold",
            VetoReason::MaxDistance => "max distance above threshold",
            VetoReason::NotSignificant => "not statistically significant",
        };
        f.write_str(s)
    }
}

impl SignalEstimate {
    pub fn side(&self, side: Side) -> &SideEstimate {
        match side {
            Side::Buy => &self.buy,
            Side::Sell => &self.sell,
        }
    }

    /// Every gate the side fails; empty means the side passes.
    pub fn veto_reasons(&self, side: Side) -> Vec<VetoReason> {
        let s = self.side(side);
        let mut reasons = Vec::new();
        if s.rate < self.threshold {
            reasons.push(VetoReason::BelowThreshold);
        }
        if s.mean_distance > self.dist_mean_thresh {
            reasons.push(VetoReason::MeanDistance);
        }
        if s.max_distance > self.dist_max_thresh {
            reasons.push(VetoReason::MaxDistance);
        }
        if !s.significant {
            reasons.push(VetoReason::NotSignificant);
        }
        reasons
    }

    pub fn passes(&self, side: Side) -> bool {
        self.veto_reasons(side).is_empty()
    }
}

/// Outcome of `estimate`: which sides pass, plus diagnostics when the
/// estimate got far enough to produce them.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimation {
    pub buy: bool,
    pub sell: bool,
    pub diagnostics: Option<SignalEstimate>,
}

impl Estimation {
    pub fn none() -> Self {
        Self {
            buy: false,
            sell: false,
            diagnostics: None,
        }
    }

    pub fn passes(&self, side: Side) -> bool {
        match side {
            Side::Buy => self.buy,
            Side::Sell => self.sell,
        }
    }
}

/// Euclidean distances from `query` to every row, as (distance, row index).
/// Large inputs run on the rayon pool; the output order is the row order
/// either way.
pub fn distances(rows: &[Vec<f64>], query: &[f64]) -> Vec<(f64, usize)> {
    let dist = |(i, row): (usize, &Vec<f64>)| (euclidean_distance(row, query), i);
    if rows.len() >= PARALLEL_MIN_ROWS {
        rows.par_iter().enumerate().map(dist).collect()
    } else {
        rows.iter().enumerate().map(dist).collect()
    }
}

/// The `k` nearest (distance, index) pairs, ascending, ties broken by index.
pub fn nearest(mut dists: Vec<(f64, usize)>, k: usize) -> Vec<(f64, usize)> {
    let cmp = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
    let k = k.min(dists.len());
    if k == 0 {
        return Vec::new();
    }
    if k < dists.len() {
        dists.select_nth_unstable_by(k - 1, cmp);
        dists.truncate(k);
    }
    dists.sort_unstable_by(cmp);
    dists
}

/// Largest k in `1..=sorted.len()` whose prefix satisfies both distance
/// thresholds, or `None` if no prefix does.
pub fn choose_k(sorted: &[f64], mean_thresh: f64, max_thresh: f64) -> Option<usize> {
    let mut best = None;
    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    for (i, d) in sorted.iter().enumerate() {
        sum += d;
        max = max.max(*d);
        let k = i + 1;
        if sum / k as f64 <= mean_thresh && max <= max_thresh {
            best = Some(k);
        }
    }
    best
}

fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Standardized training subset of one side.
struct SideSubset {
    rows: Vec<Vec<f64>>,
    outcomes: Vec<Outcome>,
}

struct Neighborhood {
    /// Sorted ascending, length k_max.
    nearest: Vec<(f64, usize)>,
    valid_k: Option<usize>,
}

fn neighborhood(subset: &SideSubset, query: &[f64], config: &EngineConfig) -> Neighborhood {
    let k_max = ((subset.rows.len() as f64 * config.k_ratio).floor() as usize).max(1);
    let nearest = nearest(distances(&subset.rows, query), k_max);
    let sorted: Vec<f64> = nearest.iter().map(|(d, _)| *d).collect();
    let valid_k = choose_k(&sorted, config.dist_mean_thresh, config.dist_max_thresh);
    Neighborhood { nearest, valid_k }
}

fn score_side(
    subset: &SideSubset,
    hood: &Neighborhood,
    config: &EngineConfig,
    threshold: f64,
) -> SideEstimate {
    let k = hood.valid_k.unwrap_or(hood.nearest.len());
    let chosen = &hood.nearest[..k];

    let mut weighted_wins = 0.0;
    let mut weight_sum = 0.0;
    let mut wins = 0usize;
    let mut dist_sum = 0.0;
    let mut max_distance = f64::NEG_INFINITY;
    for &(d, idx) in chosen {
        let w = 1.0 / (d + config.epsilon);
        let y = subset.outcomes[idx].as_f64();
        weighted_wins += w * y;
        weight_sum += w;
        if subset.outcomes[idx].is_win() {
            wins += 1;
        }
        dist_sum += d;
        max_distance = max_distance.max(d);
    }

    let p_value = binomial_p_greater(wins as u64, k as u64, threshold / 100.0);
    SideEstimate {
        rate: weighted_wins / weight_sum * 100.0,
        mean_distance: dist_sum / k as f64,
        max_distance,
        k,
        wins,
        p_value,
        significant: p_value < config.significance_level,
    }
}

/// Estimate BUY/SELL viability for `query` from `window`.
///
/// Returns no signal and no diagnostics when the query has a missing
/// feature, when either side has no usable training rows, or when neither
/// side has a neighborhood within the distance thresholds.
pub fn estimate(window: &TrainingWindow, query: &[Option<f64>], config: &EngineConfig) -> Estimation {
    let Some(query) = query.iter().copied().collect::<Option<Vec<f64>>>() else {
        return Estimation::none();
    };

    // Rows with complete features and at least one label
    let usable: Vec<(Vec<f64>, Option<Outcome>, Option<Outcome>)> = window
        .bars()
        .iter()
        .filter(|b| b.labels.label_buy.is_some() || b.labels.label_sell.is_some())
        .filter_map(|b| {
            b.complete_features()
                .map(|f| (f, b.labels.label_buy, b.labels.label_sell))
        })
        .collect();

    let n_buy = usable.iter().filter(|r| r.1.is_some()).count();
    let n_sell = usable.iter().filter(|r| r.2.is_some()).count();
    if n_buy == 0 || n_sell == 0 {
        return Estimation::none();
    }

    let Some(scaler) = Scaler::fit(usable.iter().map(|r| r.0.as_slice())) else {
        return Estimation::none();
    };
    let query = scaler.transform(&query);

    let mut buy = SideSubset {
        rows: Vec::with_capacity(n_buy),
        outcomes: Vec::with_capacity(n_buy),
    };
    let mut sell = SideSubset {
        rows: Vec::with_capacity(n_sell),
        outcomes: Vec::with_capacity(n_sell),
    };
    for (features, label_buy, label_sell) in &usable {
        let scaled = scaler.transform(features);
        if let Some(o) = label_buy {
            buy.rows.push(scaled.clone());
            buy.outcomes.push(*o);
        }
        if let Some(o) = label_sell {
            sell.rows.push(scaled);
            sell.outcomes.push(*o);
        }
    }

    let buy_hood = neighborhood(&buy, &query, config);
    let sell_hood = neighborhood(&sell, &query, config);
    if buy_hood.valid_k.is_none() && sell_hood.valid_k.is_none() {
        return Estimation::none();
    }

    let threshold = config.threshold();
    let diagnostics = SignalEstimate {
        buy: score_side(&buy, &buy_hood, config, threshold),
        sell: score_side(&sell, &sell_hood, config, threshold),
        threshold,
        dist_mean_thresh: config.dist_mean_thresh,
        dist_max_thresh: config.dist_max_thresh,
        significance_level: config.significance_level,
    };

    Estimation {
        buy: diagnostics.passes(Side::Buy),
        sell: diagnostics.passes(Side::Sell),
        diagnostics: Some(diagnostics),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, BarrierLabels, Candle};
    use crate::engine::config::LeakScrub;
    use crate::engine::window::build_window;
    use crate::store::FeatureStore;
    use chrono::{Duration, TimeZone, Utc};

    fn decision() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 23, 12, 0, 0).unwrap()
    }

    /// One feature per bar; each bar labeled (buy, sell), resolved in 1 minute.
    fn window(rows: &[(Option<f64>, Option<Outcome>, Option<Outcome>)]) -> TrainingWindow {
        let t = decision();
        let n = rows.len() as i64;
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, (f, b, s))| Bar {
                candle: Candle {
                    time: t - Duration::minutes(n + 5 - i as i64),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1,
                },
                features: vec![*f],
                labels: BarrierLabels {
                    label_buy: *b,
                    label_sell: *s,
                    time_buy: b.map(|_| 1),
                    time_sell: s.map(|_| 1),
                },
            })
            .collect();
        let store = FeatureStore::new(vec!["x".into()], bars).unwrap();
        build_window(&store, t, 1, LeakScrub::Enabled)
    }

    fn cfg() -> EngineConfig {
        EngineConfig {
            k_ratio: 1.0,
            dist_mean_thresh: 10.0,
            dist_max_thresh: 10.0,
            ..EngineConfig::default()
        }
    }

    const W: Option<Outcome> = Some(Outcome::Win);
    const L: Option<Outcome> = Some(Outcome::Loss);

    #[test]
    fn scaler_population_std_and_constant_columns() {
        let rows = [vec![1.0, 5.0], vec![3.0, 5.0]];
        let s = Scaler::fit(rows.iter().map(|r| r.as_slice())).unwrap();
        assert_eq!(s.transform(&[3.0, 5.0]), vec![1.0, 0.0]);
        assert_eq!(s.transform(&[1.0, 7.0]), vec![-1.0, 2.0]);
        assert!(Scaler::fit(std::iter::empty()).is_none());
    }

    #[test]
    fn nearest_breaks_ties_by_index() {
        let out = nearest(vec![(1.0, 3), (0.5, 2), (1.0, 0), (2.0, 1)], 3);
        assert_eq!(out, vec![(0.5, 2), (1.0, 0), (1.0, 3)]);
    }

    #[test]
    fn choose_k_takes_largest_valid_prefix() {
        // prefix means: 0.1, 0.15, 0.5, 0.575
        let d = [0.1, 0.2, 1.2, 0.8];
        assert_eq!(choose_k(&d, 0.55, 1.5), Some(3));
        assert_eq!(choose_k(&d, 0.6, 1.5), Some(4));
        assert_eq!(choose_k(&d, 0.6, 1.0), Some(2));
        assert_eq!(choose_k(&d, 0.05, 1.0), None);
    }

    #[test]
    fn missing_query_feature_gives_none() {
        let w = window(&[(Some(1.0), W, W); 10]);
        assert_eq!(estimate(&w, &[None], &cfg()), Estimation::none());
    }

    #[test]
    fn empty_side_gives_none() {
        let w = window(&[(Some(1.0), W, None); 10]);
        assert_eq!(estimate(&w, &[Some(1.0)], &cfg()), Estimation::none());
    }

    #[test]
    fn unanimous_winners_pass_buy() {
        let mut rows = vec![(Some(0.0), W, L); 12];
        rows.extend(vec![(Some(1.0), L, W); 2]);
        let w = window(&rows);
        let config = EngineConfig {
            k_ratio: 0.5,
            dist_mean_thresh: 0.1,
            dist_max_thresh: 0.1,
            ..EngineConfig::default()
        };
        let est = estimate(&w, &[Some(0.0)], &config);
        let diag = est.diagnostics.clone().unwrap();
        assert_eq!(diag.buy.k, 7);
        assert_eq!(diag.buy.wins, 7);
        assert!((diag.buy.rate - 100.0).abs() < 1e-9);
        // 0.5^7 < 0.05
        assert!(diag.buy.significant);
        assert!(est.buy);
        assert!(!est.sell);
        assert!(diag.veto_reasons(Side::Sell).contains(&VetoReason::BelowThreshold));
    }

    #[test]
    fn falls_back_to_k_max_for_side_without_valid_k() {
        // BUY rows sit at the query, SELL rows far away
        let mut rows = vec![(Some(0.0), W, None); 10];
        rows.extend(vec![(Some(100.0), None, W); 10]);
        let w = window(&rows);
        let config = EngineConfig {
            k_ratio: 0.5,
            dist_mean_thresh: 0.5,
            dist_max_thresh: 0.5,
            ..EngineConfig::default()
        };
        let est = estimate(&w, &[Some(0.0)], &config);
        let diag = est.diagnostics.unwrap();
        assert_eq!(diag.sell.k, 5);
        assert!(diag.veto_reasons(Side::Sell).contains(&VetoReason::MaxDistance));
        assert!(!est.sell);
    }

    #[test]
    fn no_valid_k_on_either_side_gives_none() {
        let mut rows = vec![(Some(0.0), W, W); 5];
        rows.extend(vec![(Some(10.0), L, L); 5]);
        let w = window(&rows);
        let config = EngineConfig {
            dist_mean_thresh: 1e-3,
            dist_max_thresh: 1e-3,
            ..cfg()
        };
        assert_eq!(estimate(&w, &[Some(5.0)], &config), Estimation::none());
    }

    #[test]
    fn insignificant_sample_is_vetoed() {
        // 3 of 3 wins: p = 0.125 at p0 = 0.5
        let w = window(&[(Some(0.0), W, W); 3]);
        let est = estimate(&w, &[Some(0.0)], &cfg());
        let diag = est.diagnostics.unwrap();
        assert_eq!(diag.buy.k, 3);
        assert_eq!(diag.veto_reasons(Side::Buy), vec![VetoReason::NotSignificant]);
        assert!(!est.buy);
    }

    #[test]
    fn rows_with_missing_features_are_ignored() {
        let mut rows = vec![(None, W, W); 20];
        rows.extend(vec![(Some(0.0), L, L); 10]);
        let w = window(&rows);
        let diag = estimate(&w, &[Some(0.0)], &cfg()).diagnostics.unwrap();
        assert_eq!(diag.buy.k, 10);
        assert_eq!(diag.buy.wins, 0);
    }

    #[test]
    fn parallel_and_serial_distances_agree() {
        let rows: Vec<Vec<f64>> = (0..PARALLEL_MIN_ROWS + 10)
            .map(|i| vec![(i % 97) as f64, (i % 13) as f64])
            .collect();
        let par = distances(&rows, &[3.0, 4.0]);
        let ser: Vec<(f64, usize)> = rows
            .iter()
            .enumerate()
            .map(|(i, r)| (euclidean_distance(r, &[3.0, 4.0]), i))
            .collect();
        assert_eq!(par, ser);
    }
}
