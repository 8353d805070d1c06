//! Artifact writer for persisting run outputs.

mod equity;
mod ledger;
mod manifest;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::runner::BacktestResult;

pub use manifest::RunManifest;

/// Artifact paths returned after export.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub run_dir: PathBuf,
    pub manifest: PathBuf,
    pub metrics_json: PathBuf,
    pub trades_csv: PathBuf,
    pub decisions_csv: PathBuf,
    pub equity_csv: PathBuf,
}

/// Write every artifact of `result` into `output_dir/<config hash>/`.
///
/// Re-running an identical configuration overwrites the same directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<ArtifactPaths> {
    let hash = result.config.config_hash();
    let run_dir = output_dir.join(&hash[..16.min(hash.len())]);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create run artifact directory {}", run_dir.display()))?;

    let manifest = run_dir.join("manifest.json");
    manifest::write_manifest(&manifest, result, &hash)?;

    let metrics_json = run_dir.join("metrics.json");
    let json = serde_json::to_string_pretty(&result.metrics).context("Failed to serialize metrics")?;
    std::fs::write(&metrics_json, json)
        .with_context(|| format!("Failed to write metrics to {}", metrics_json.display()))?;

    let trades_csv = run_dir.join("trades.csv");
    ledger::write_trades_csv(&trades_csv, &result.trades)?;

    let decisions_csv = run_dir.join("decisions.csv");
    ledger::write_decisions_csv(&decisions_csv, &result.decisions)?;

    let equity_csv = run_dir.join("equity.csv");
    equity::write_equity_csv(&equity_csv, result)?;

    tracing::info!(dir = %run_dir.display(), "artifacts saved");

    Ok(ArtifactPaths {
        run_dir,
        manifest,
        metrics_json,
        trades_csv,
        decisions_csv,
        equity_csv,
    })
}
