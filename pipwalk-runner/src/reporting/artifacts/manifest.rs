//! Run manifest export (JSON).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::BacktestConfig;
use crate::runner::BacktestResult;
use pipwalk_core::data::DataSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub config_hash: String,
    pub created_at: DateTime<Utc>,
    pub instrument: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub dataset_hash: String,
    pub source: DataSource,
    pub has_synthetic: bool,
    pub bar_count: usize,
    pub feature_names: Vec<String>,
    pub config: BacktestConfig,
}

pub fn write_manifest(path: &Path, result: &BacktestResult, config_hash: &str) -> Result<()> {
    let manifest = RunManifest {
        schema_version: result.schema_version,
        config_hash: config_hash.to_string(),
        created_at: Utc::now(),
        instrument: result.instrument.clone(),
        start: result.start,
        end: result.end,
        dataset_hash: result.dataset_hash.clone(),
        source: result.source,
        has_synthetic: result.has_synthetic,
        bar_count: result.bar_count,
        feature_names: result.feature_names.clone(),
        config: result.config.clone(),
    };

    let json = serde_json::to_string_pretty(&manifest).context("Failed to serialize run manifest")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write manifest to {}", path.display()))?;
    Ok(())
}
