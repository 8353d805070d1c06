//! Parquet candle cache with Hive-style monthly partitions.
//!
//! Layout: `{cache_dir}/instrument={NAME}/{YYYY-MM}.parquet`
//!
//! - Writes merge into existing partitions and are atomic (tmp + rename).
//! - Loads validate schema and row count; corrupt partitions are renamed to
//!   `{file}.quarantined` and skipped.
//! - `meta.json` per instrument records the covered time range, candle count,
//!   the spans known to be complete and a BLAKE3 hash of the cached series.
//!
//! A span is complete when a provider fetch for it succeeded, or when the
//! cached candles inside it have no weekday hole longer than
//! `MAX_GAP_MINUTES`. Coverage checks use spans, so a cache with an interior
//! hole never reports a range across that hole as covered.

use super::ingest::ingest;
use crate::calendar::weekday_minutes_between;
use super::provider::DataError;
use crate::domain::Candle;
use chrono::{DateTime, Datelike, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const COLUMNS: [&str; 6] = ["time", "open", "high", "low", "close", "volume"];

/// Longest run of missing weekday minutes still treated as contiguous data.
/// Covers the Friday-evening to Sunday-evening close and thin-liquidity gaps.
pub const MAX_GAP_MINUTES: i64 = 240;

/// Half-open time span `[start, end)` known to be fully cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CachedSpan {
    pub fn contains(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start <= start && self.end >= end
    }
}

/// Metadata sidecar for a cached instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub instrument: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub candle_count: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: DateTime<Utc>,
    /// Sorted, non-overlapping complete spans.
    #[serde(default)]
    pub spans: Vec<CachedSpan>,
}

impl CacheMeta {
    /// Complete spans, falling back to the first..last range for sidecars
    /// written before spans were tracked.
    pub fn covered_spans(&self) -> Vec<CachedSpan> {
        if self.spans.is_empty() {
            vec![CachedSpan {
                start: self.start,
                end: self.end + chrono::Duration::minutes(1),
            }]
        } else {
            self.spans.clone()
        }
    }
}

/// Cache status for a single instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub instrument: String,
    pub cached: bool,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub candle_count: Option<usize>,
}

/// How well the cache covers a requested range.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: DateTime<Utc>,
        cached_end: DateTime<Utc>,
    },
}

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn instrument_dir(&self, instrument: &str) -> PathBuf {
        self.cache_dir.join(format!("instrument={instrument}"))
    }

    fn month_path(&self, instrument: &str, year: i32, month: u32) -> PathBuf {
        self.instrument_dir(instrument)
            .join(format!("{year:04}-{month:02}.parquet"))
    }

    fn meta_path(&self, instrument: &str) -> PathBuf {
        self.instrument_dir(instrument).join("meta.json")
    }

    /// Write candles into the cache, merging with any partitions already on
    /// disk. On a timestamp collision the incoming candle wins.
    ///
    /// Only the gap-free stretches of `candles` are recorded as complete.
    pub fn write(&self, instrument: &str, candles: &[Candle], source: &str) -> Result<(), DataError> {
        self.write_spans(instrument, candles, source, None)
    }

    /// Write the result of a successful fetch of `[start, end)`. The whole
    /// requested span is recorded as complete, holidays included.
    pub fn write_range(
        &self,
        instrument: &str,
        candles: &[Candle],
        source: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), DataError> {
        self.write_spans(instrument, candles, source, Some(CachedSpan { start, end }))
    }

    fn write_spans(
        &self,
        instrument: &str,
        candles: &[Candle],
        source: &str,
        fetched: Option<CachedSpan>,
    ) -> Result<(), DataError> {
        if candles.is_empty() {
            return Err(DataError::CacheError("no candles to cache".into()));
        }

        let dir = self.instrument_dir(instrument);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut by_month: BTreeMap<(i32, u32), Vec<Candle>> = BTreeMap::new();
        for c in candles {
            by_month
                .entry((c.time.year(), c.time.month()))
                .or_default()
                .push(c.clone());
        }

        for ((year, month), mut fresh) in by_month {
            let path = self.month_path(instrument, year, month);
            if path.exists() {
                match load_and_validate_parquet(&path) {
                    Ok(existing) => fresh.extend(existing),
                    Err(e) => quarantine(&path, &e),
                }
            }
            let merged = ingest(fresh).candles;
            let df = candles_to_dataframe(&merged)?;
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&df, &tmp_path)?;

            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::CacheError(format!("atomic rename failed: {e}"))
            })?;
        }

        let mut spans = self.get_meta(instrument).map(|m| m.spans).unwrap_or_default();
        spans.extend(contiguous_spans(candles));
        spans.extend(fetched);
        let spans = merge_spans(spans);

        let all = self.load(instrument)?;
        self.write_meta(instrument, &all, source, spans)?;

        tracing::info!(instrument, candles = all.len(), "cache updated");
        Ok(())
    }

    fn write_meta(
        &self,
        instrument: &str,
        candles: &[Candle],
        source: &str,
        spans: Vec<CachedSpan>,
    ) -> Result<(), DataError> {
        let (first, last) = match (candles.first(), candles.last()) {
            (Some(f), Some(l)) => (f.time, l.time),
            _ => return Err(DataError::CacheError("no candles to describe".into())),
        };
        let meta = CacheMeta {
            instrument: instrument.to_string(),
            start: first,
            end: last,
            candle_count: candles.len(),
            data_hash: hash_candles(candles)?,
            source: source.to_string(),
            cached_at: Utc::now(),
            spans,
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(instrument), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))
    }

    /// Load every cached candle for an instrument, ascending by time.
    pub fn load(&self, instrument: &str) -> Result<Vec<Candle>, DataError> {
        let dir = self.instrument_dir(instrument);
        if !dir.exists() {
            return Err(DataError::NoCachedData {
                instrument: instrument.to_string(),
            });
        }

        let entries =
            fs::read_dir(&dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut candles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(&path) {
                Ok(part) => candles.extend(part),
                Err(e) => quarantine(&path, &e),
            }
        }

        if candles.is_empty() {
            return Err(DataError::NoCachedData {
                instrument: instrument.to_string(),
            });
        }

        candles.sort_by_key(|c| c.time);
        Ok(candles)
    }

    /// Load cached candles with `start <= time < end`.
    pub fn load_range(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        let mut candles = self.load(instrument)?;
        candles.retain(|c| c.time >= start && c.time < end);
        Ok(candles)
    }

    pub fn get_meta(&self, instrument: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(instrument)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Every instrument with a partition directory under the cache root.
    pub fn instruments(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_prefix("instrument="))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        names
    }

    pub fn status(&self, instruments: &[&str]) -> Vec<CacheStatus> {
        instruments
            .iter()
            .map(|name| {
                let meta = self.get_meta(name);
                CacheStatus {
                    instrument: name.to_string(),
                    cached: meta.is_some(),
                    start: meta.as_ref().map(|m| m.start),
                    end: meta.as_ref().map(|m| m.end),
                    candle_count: meta.as_ref().map(|m| m.candle_count),
                }
            })
            .collect()
    }

    /// Whether one complete span holds all of `[start, end)`.
    pub fn covers_range(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoverageResult {
        match self.get_meta(instrument) {
            None => CoverageResult::NotCached,
            Some(meta) => {
                if meta.covered_spans().iter().any(|s| s.contains(start, end)) {
                    CoverageResult::FullyCovered
                } else {
                    CoverageResult::PartiallyCovered {
                        cached_start: meta.start,
                        cached_end: meta.end,
                    }
                }
            }
        }
    }
}

/// Split a candle series at weekday holes longer than `MAX_GAP_MINUTES`.
/// Each span ends one minute after its last candle.
fn contiguous_spans(candles: &[Candle]) -> Vec<CachedSpan> {
    let one = chrono::Duration::minutes(1);
    let mut times: Vec<DateTime<Utc>> = candles.iter().map(|c| c.time).collect();
    times.sort();

    let mut spans: Vec<CachedSpan> = Vec::new();
    for t in times {
        match spans.last_mut() {
            Some(last) if weekday_minutes_between(last.end, t) <= MAX_GAP_MINUTES => {
                last.end = last.end.max(t + one);
            }
            _ => spans.push(CachedSpan { start: t, end: t + one }),
        }
    }
    spans
}

/// Sort spans and join those that overlap or touch.
fn merge_spans(mut spans: Vec<CachedSpan>) -> Vec<CachedSpan> {
    spans.sort_by_key(|s| s.start);
    let mut merged: Vec<CachedSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

/// BLAKE3 hash over the JSON encoding of a candle series.
pub fn hash_candles(candles: &[Candle]) -> Result<String, DataError> {
    let bytes = serde_json::to_vec(candles)
        .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

fn quarantine(path: &Path, err: &DataError) {
    let target = path.with_extension("parquet.quarantined");
    tracing::warn!(path = %path.display(), error = %err, "quarantining corrupt cache file");
    let _ = fs::rename(path, target);
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn candles_to_dataframe(candles: &[Candle]) -> Result<DataFrame, DataError> {
    let times: Vec<i64> = candles.iter().map(|c| c.time.timestamp_millis()).collect();
    let opens: Vec<f64> = candles.iter().map(|c| c.open).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<u64> = candles.iter().map(|c| c.volume).collect();

    DataFrame::new(vec![
        Column::new("time".into(), times),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<Candle>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    for col_name in COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::ValidationError(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    dataframe_to_candles(&df)
}

fn dataframe_to_candles(df: &DataFrame) -> Result<Vec<Candle>, DataError> {
    let col = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::ParquetError(format!("column read: {e}")))
    };
    let type_err = |name: &str, e: PolarsError| {
        DataError::ParquetError(format!("{name} column type: {e}"))
    };

    let time_col = col("time")?;
    let open_col = col("open")?;
    let high_col = col("high")?;
    let low_col = col("low")?;
    let close_col = col("close")?;
    let volume_col = col("volume")?;

    let time_ca = time_col.i64().map_err(|e| type_err("time", e))?;
    let open_ca = open_col.f64().map_err(|e| type_err("open", e))?;
    let high_ca = high_col.f64().map_err(|e| type_err("high", e))?;
    let low_ca = low_col.f64().map_err(|e| type_err("low", e))?;
    let close_ca = close_col.f64().map_err(|e| type_err("close", e))?;
    let vol_ca = volume_col.u64().map_err(|e| type_err("volume", e))?;

    let n = df.height();
    let mut candles = Vec::with_capacity(n);
    for i in 0..n {
        let millis = time_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null time at row {i}")))?;
        let time = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| DataError::ParquetError(format!("time out of range at row {i}")))?;

        candles.push(Candle {
            time,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
        });
    }

    Ok(candles)
}
