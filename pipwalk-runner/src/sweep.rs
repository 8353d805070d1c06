//! Distance-threshold sweep.
//!
//! Every (mean, max) grid point is an independent full simulation over one
//! shared feature store. Points run in parallel with rayon; each simulation
//! is sequential internally. The objective is profit factor.

use std::cmp::Ordering;
use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;

use pipwalk_core::engine::NoProgress;

use crate::config::BacktestConfig;
use crate::runner::{run_prepared, PreparedData};
use crate::thresholds::ThresholdOverride;

/// Threshold grid. Points with `max < mean` are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdGrid {
    pub mean_thresholds: Vec<f64>,
    pub max_thresholds: Vec<f64>,
}

impl Default for ThresholdGrid {
    /// mean 0.5..=2.0 and max 1.0..=3.0, both in steps of 0.1.
    fn default() -> Self {
        Self {
            mean_thresholds: (5..=20).map(|i| f64::from(i) / 10.0).collect(),
            max_thresholds: (10..=30).map(|i| f64::from(i) / 10.0).collect(),
        }
    }
}

impl ThresholdGrid {
    /// Grid from inclusive ranges and a step.
    pub fn from_ranges(mean: (f64, f64), max: (f64, f64), step: f64) -> Self {
        Self {
            mean_thresholds: steps(mean.0, mean.1, step),
            max_thresholds: steps(max.0, max.1, step),
        }
    }

    pub fn points(&self) -> Vec<(f64, f64)> {
        self.mean_thresholds
            .iter()
            .flat_map(|&mean| {
                self.max_thresholds
                    .iter()
                    .filter(move |&&max| max >= mean)
                    .map(move |&max| (mean, max))
            })
            .collect()
    }

    pub fn size(&self) -> usize {
        self.points().len()
    }
}

fn steps(from: f64, to: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || to < from {
        return vec![from];
    }
    let n = ((to - from) / step + 1e-9).floor() as usize;
    // Snap to 1e-6 to drop accumulated float error.
    (0..=n)
        .map(|i| ((from + i as f64 * step) * 1e6).round() / 1e6)
        .collect()
}

/// Outcome of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint {
    pub mean_thresh: f64,
    pub max_thresh: f64,
    #[serde(with = "crate::metrics::infinite_as_null")]
    pub profit_factor: f64,
    pub num_trades: usize,
    pub net_profit: f64,
    pub win_rate: f64,
}

impl SweepPoint {
    /// Objective value; runs below `min_trades` score −1.
    pub fn score(&self, min_trades: usize) -> f64 {
        if self.num_trades < min_trades.max(1) {
            -1.0
        } else {
            self.profit_factor
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResults {
    /// In grid order.
    pub points: Vec<SweepPoint>,
    pub min_trades: usize,
}

impl SweepResults {
    /// Highest score; ties go to higher net profit, then to the earlier point.
    pub fn best(&self) -> Option<&SweepPoint> {
        self.points.iter().reduce(|best, p| {
            match p
                .score(self.min_trades)
                .total_cmp(&best.score(self.min_trades))
                .then(p.net_profit.total_cmp(&best.net_profit))
            {
                Ordering::Greater => p,
                _ => best,
            }
        })
    }

    /// Points sorted best-first.
    pub fn ranked(&self) -> Vec<&SweepPoint> {
        let mut sorted: Vec<_> = self.points.iter().collect();
        sorted.sort_by(|a, b| {
            b.score(self.min_trades)
                .total_cmp(&a.score(self.min_trades))
                .then(b.net_profit.total_cmp(&a.net_profit))
        });
        sorted
    }

    /// Write the best pair to the thresholds override file.
    pub fn save_best(&self, path: &Path) -> std::io::Result<Option<ThresholdOverride>> {
        let Some(best) = self.best().filter(|b| b.num_trades >= self.min_trades.max(1)) else {
            tracing::warn!("no grid point produced trades; thresholds file left unchanged");
            return Ok(None);
        };
        let thresholds = ThresholdOverride {
            mean_thresh: best.mean_thresh,
            max_thresh: best.max_thresh,
        };
        thresholds.save(path)?;
        tracing::info!(
            path = %path.display(),
            mean_thresh = best.mean_thresh,
            max_thresh = best.max_thresh,
            profit_factor = best.profit_factor,
            "best thresholds saved"
        );
        Ok(Some(thresholds))
    }
}

/// Run every grid point over `data`, reporting each finished point.
pub fn run_sweep<F>(
    config: &BacktestConfig,
    data: &PreparedData,
    grid: &ThresholdGrid,
    min_trades: usize,
    on_point: F,
) -> SweepResults
where
    F: Fn(usize, usize, &SweepPoint) + Send + Sync,
{
    let points = grid.points();
    let total = points.len();
    tracing::info!(points = total, "threshold sweep started");

    let results: Vec<SweepPoint> = points
        .par_iter()
        .enumerate()
        .map(|(idx, &(mean, max))| {
            let mut run_config = config.clone();
            run_config.strategy = config.strategy.clone().with_thresholds(mean, max);
            let result = run_prepared(&run_config, data, &NoProgress);
            let point = SweepPoint {
                mean_thresh: mean,
                max_thresh: max,
                profit_factor: result.metrics.profit_factor,
                num_trades: result.metrics.num_trades,
                net_profit: result.metrics.net_profit,
                win_rate: result.metrics.win_rate,
            };
            on_point(idx, total, &point);
            point
        })
        .collect();

    SweepResults {
        points: results,
        min_trades,
    }
}
