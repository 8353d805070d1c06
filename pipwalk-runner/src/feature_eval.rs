//! Feature selection over a holdout span.
//!
//! Three filters, applied to every candidate feature:
//! 1. For each pair with |Pearson r| above `corr`, drop the member with the
//!    larger VIF (the first one on a tie).
//! 2. Drop every feature with VIF above `vif`.
//! 3. Drop features whose point-biserial correlation with `label_buy` has a
//!    two-sided p-value at or above `pvalue`.
//!
//! VIF is `1 / (1 − R²)` of a least-squares fit of the raw feature on all the
//! others with no intercept term, using the uncentered R². This is the
//! `variance_inflation_factor` convention of statsmodels, so features with a
//! large mean relative to their spread score high even when uncorrelated.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;

use pipwalk_core::calendar::business_days_before;
use pipwalk_core::domain::{BarrierLabels, Candle};
use pipwalk_core::features::{FeatureError, FeatureMatrix, ALL_FEATURES};
use pipwalk_core::labeling::{label_candles, LabelConfig};

use crate::metrics::{mean, std_dev};

/// Business days in the holdout span.
pub const HOLDOUT_DAYS: u32 = 60;
/// Longest simulation the holdout must stay clear of, in business days.
pub const MAX_BACKTEST_DAYS: u32 = 22;

const PIVOT_EPS: f64 = 1e-10;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("feature error: {0}")]
    Feature(#[from] FeatureError),

    #[error("only {rows} complete rows; need more than {needed}")]
    TooFewRows { rows: usize, needed: usize },

    #[error("{labels} labels for {rows} feature rows")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("failed to write {path}: {reason}")]
    Write { path: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalThresholds {
    pub corr: f64,
    pub vif: f64,
    pub pvalue: f64,
}

impl Default for EvalThresholds {
    fn default() -> Self {
        Self {
            corr: 0.8,
            vif: 10.0,
            pvalue: 0.10,
        }
    }
}

/// Point-biserial test of one feature against `label_buy`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetTest {
    pub r: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureEvaluation {
    pub names: Vec<String>,
    /// Rows with every feature present.
    pub rows: usize,
    /// Rows that also carry a resolved `label_buy`.
    pub labeled_rows: usize,
    /// Pearson matrix in `names` order.
    pub correlation: Vec<Vec<f64>>,
    /// Infinite for constant or perfectly collinear features.
    pub vif: Vec<f64>,
    pub target: Vec<TargetTest>,
    pub dropped_collinear: BTreeSet<String>,
    pub dropped_target: BTreeSet<String>,
    /// Kept features in `names` order.
    pub selected: Vec<String>,
}

/// `[start, end)` of the holdout span preceding any backtest window.
pub fn holdout_range(now: DateTime<Utc>, days_back: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = business_days_before(now, days_back + MAX_BACKTEST_DAYS);
    (business_days_before(end, HOLDOUT_DAYS), end)
}

/// Compute every registered feature and triple-barrier labels over
/// `candles`, then evaluate.
pub fn evaluate_candles(
    candles: &[Candle],
    label_config: &LabelConfig,
    thresholds: &EvalThresholds,
) -> Result<FeatureEvaluation, EvalError> {
    let names: Vec<String> = ALL_FEATURES.iter().map(|s| s.to_string()).collect();
    let matrix = FeatureMatrix::compute(candles, &names)?;
    let labels = label_candles(candles, label_config);
    evaluate_features(&matrix, &labels, thresholds)
}

pub fn evaluate_features(
    matrix: &FeatureMatrix,
    labels: &[BarrierLabels],
    thresholds: &EvalThresholds,
) -> Result<FeatureEvaluation, EvalError> {
    if labels.len() != matrix.len() {
        return Err(EvalError::LengthMismatch {
            rows: matrix.len(),
            labels: labels.len(),
        });
    }
    let names = matrix.names().to_vec();
    let dims = names.len();

    // Complete rows, column-major.
    let complete: Vec<usize> = (0..matrix.len())
        .filter(|&i| matrix.row(i).iter().all(Option::is_some))
        .collect();
    if complete.len() <= dims + 1 {
        return Err(EvalError::TooFewRows {
            rows: complete.len(),
            needed: dims + 1,
        });
    }
    let columns: Vec<Vec<f64>> = names
        .iter()
        .map(|name| {
            let col = matrix.column(name).unwrap_or(&[]);
            complete.iter().map(|&i| col[i].unwrap_or(f64::NAN)).collect()
        })
        .collect();

    let correlation = correlation_matrix(&columns);
    let vif = vif_uncentered(&columns);

    // Target test on rows with a resolved label.
    let labeled: Vec<usize> = complete
        .iter()
        .enumerate()
        .filter(|&(_, &row)| labels[row].label_buy.is_some())
        .map(|(k, _)| k)
        .collect();
    let y: Vec<f64> = labeled
        .iter()
        .filter_map(|&k| labels[complete[k]].label_buy.map(|o| o.as_f64()))
        .collect();
    let target: Vec<TargetTest> = columns
        .iter()
        .map(|col| {
            let x: Vec<f64> = labeled.iter().map(|&k| col[k]).collect();
            point_biserial(&x, &y)
        })
        .collect();

    let mut dropped_collinear = BTreeSet::new();
    for i in 0..dims {
        for j in (i + 1)..dims {
            if correlation[i][j].abs() > thresholds.corr {
                let drop = if vif[i] >= vif[j] { i } else { j };
                dropped_collinear.insert(names[drop].clone());
            }
        }
    }
    for (name, v) in names.iter().zip(&vif) {
        if *v > thresholds.vif {
            dropped_collinear.insert(name.clone());
        }
    }

    let dropped_target: BTreeSet<String> = names
        .iter()
        .zip(&target)
        .filter(|(_, t)| t.p_value >= thresholds.pvalue)
        .map(|(n, _)| n.clone())
        .collect();

    let selected: Vec<String> = names
        .iter()
        .filter(|n| !dropped_collinear.contains(*n) && !dropped_target.contains(*n))
        .cloned()
        .collect();

    tracing::info!(
        candidates = dims,
        rows = complete.len(),
        collinear = dropped_collinear.len(),
        target = dropped_target.len(),
        selected = selected.len(),
        "feature evaluation complete"
    );

    Ok(FeatureEvaluation {
        names,
        rows: complete.len(),
        labeled_rows: y.len(),
        correlation,
        vif,
        target,
        dropped_collinear,
        dropped_target,
        selected,
    })
}

impl FeatureEvaluation {
    /// Write the selected list as a JSON array of names.
    pub fn save_selected(&self, path: &Path) -> Result<(), EvalError> {
        let write_err = |reason: String| EvalError::Write {
            path: path.display().to_string(),
            reason,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(&self.selected).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| write_err(e.to_string()))
    }

    /// Write `feature_correlation.csv` and `feature_vif.csv` into `dir`.
    pub fn write_reports(&self, dir: &Path) -> Result<(), EvalError> {
        let write_err = |path: &Path, reason: String| EvalError::Write {
            path: path.display().to_string(),
            reason,
        };
        std::fs::create_dir_all(dir).map_err(|e| write_err(dir, e.to_string()))?;

        let corr_path = dir.join("feature_correlation.csv");
        let mut w = csv::Writer::from_path(&corr_path).map_err(|e| write_err(&corr_path, e.to_string()))?;
        let header: Vec<&str> = std::iter::once("").chain(self.names.iter().map(String::as_str)).collect();
        w.write_record(&header).map_err(|e| write_err(&corr_path, e.to_string()))?;
        for (name, row) in self.names.iter().zip(&self.correlation) {
            let record: Vec<String> = std::iter::once(name.clone())
                .chain(row.iter().map(|v| v.to_string()))
                .collect();
            w.write_record(&record).map_err(|e| write_err(&corr_path, e.to_string()))?;
        }
        w.flush().map_err(|e| write_err(&corr_path, e.to_string()))?;

        let vif_path = dir.join("feature_vif.csv");
        let mut w = csv::Writer::from_path(&vif_path).map_err(|e| write_err(&vif_path, e.to_string()))?;
        w.write_record(["feature", "vif", "r_label_buy", "p_value"])
            .map_err(|e| write_err(&vif_path, e.to_string()))?;
        for ((name, vif), t) in self.names.iter().zip(&self.vif).zip(&self.target) {
            w.write_record([name.clone(), vif.to_string(), t.r.to_string(), t.p_value.to_string()])
                .map_err(|e| write_err(&vif_path, e.to_string()))?;
        }
        w.flush().map_err(|e| write_err(&vif_path, e.to_string()))
    }
}

// ─── Statistics ─────────────────────────────────────────────────────

/// Pearson r; zero when either series is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let (sx, sy) = (std_dev(x), std_dev(y));
    if x.len() != y.len() || x.is_empty() || sx == 0.0 || sy == 0.0 {
        return 0.0;
    }
    let (mx, my) = (mean(x), mean(y));
    let cov = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum::<f64>() / x.len() as f64;
    (cov / (sx * sy)).clamp(-1.0, 1.0)
}

/// Pearson correlation of every column pair; diagonal is 1.
pub fn correlation_matrix(columns: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = columns.len();
    (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| if i == j { 1.0 } else { pearson(&columns[i], &columns[j]) })
                .collect()
        })
        .collect()
}

/// Uncentered cosine similarity of every column pair: `Σ xᵢxⱼ / (‖xᵢ‖ ‖xⱼ‖)`.
/// Pairs involving an all-zero column are 0.
pub fn cosine_matrix(columns: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let norms: Vec<f64> = columns.iter().map(|c| c.iter().map(|v| v * v).sum::<f64>().sqrt()).collect();
    let n = columns.len();
    (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| {
                    if norms[i] == 0.0 || norms[j] == 0.0 {
                        return if i == j { 1.0 } else { 0.0 };
                    }
                    let dot: f64 = columns[i].iter().zip(&columns[j]).map(|(a, b)| a * b).sum();
                    (dot / (norms[i] * norms[j])).clamp(-1.0, 1.0)
                })
                .collect()
        })
        .collect()
}

/// No-intercept VIF per column. All-zero and perfectly collinear columns get
/// `+∞`.
pub fn vif_uncentered(columns: &[Vec<f64>]) -> Vec<f64> {
    let gram = cosine_matrix(columns);
    let n = gram.len();
    (0..n)
        .map(|i| {
            if columns[i].iter().all(|v| *v == 0.0) {
                return f64::INFINITY;
            }
            let others: Vec<usize> = (0..n).filter(|&j| j != i).collect();
            let a: Vec<Vec<f64>> = others
                .iter()
                .map(|&r| others.iter().map(|&c| gram[r][c]).collect())
                .collect();
            let b: Vec<f64> = others.iter().map(|&r| gram[r][i]).collect();
            let beta = solve_normal_equations(a, b.clone());
            let r2: f64 = beta.iter().zip(&b).map(|(x, y)| x * y).sum();
            let resid = 1.0 - r2;
            if resid <= PIVOT_EPS {
                f64::INFINITY
            } else {
                1.0 / resid
            }
        })
        .collect()
}

/// Solve `A x = b` for symmetric positive semi-definite `A` by Gaussian
/// elimination with partial pivoting. Columns without a usable pivot are
/// redundant and get coefficient 0.
fn solve_normal_equations(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let n = b.len();
    let mut pivot_col: Vec<Option<usize>> = vec![None; n];
    let mut row = 0;
    for col in 0..n {
        if row >= n {
            break;
        }
        let best = (row..n).max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()));
        let Some(best) = best else { break };
        if a[best][col].abs() < PIVOT_EPS {
            continue;
        }
        a.swap(row, best);
        b.swap(row, best);
        for r in 0..n {
            if r == row {
                continue;
            }
            let factor = a[r][col] / a[row][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..n {
                a[r][c] -= factor * a[row][c];
            }
            b[r] -= factor * b[row];
        }
        pivot_col[row] = Some(col);
        row += 1;
    }

    let mut x = vec![0.0; n];
    for (r, col) in pivot_col.iter().enumerate() {
        if let Some(c) = col {
            x[*c] = b[r] / a[r][*c];
        }
    }
    x
}

/// Point-biserial correlation of `x` with a 0/1 target and its two-sided
/// p-value. Undefined correlations report `p = 1`.
pub fn point_biserial(x: &[f64], y: &[f64]) -> TargetTest {
    let n = x.len();
    if n < 3 || std_dev(x) == 0.0 || std_dev(y) == 0.0 {
        return TargetTest { r: 0.0, p_value: 1.0 };
    }
    let r = pearson(x, y);
    let df = (n - 2) as f64;
    if r.abs() >= 1.0 {
        return TargetTest { r, p_value: 0.0 };
    }
    let t = r * (df / (1.0 - r * r)).sqrt();
    let p_value = match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => 2.0 * (1.0 - dist.cdf(t.abs())),
        Err(_) => 1.0,
    };
    TargetTest {
        r,
        p_value: p_value.clamp(0.0, 1.0),
    }
}
