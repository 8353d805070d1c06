//! Data provider trait and structured error types.
//!
//! `DataProvider` abstracts over candle sources (OANDA REST, CSV import) so
//! the runner can swap implementations and tests can use in-memory fakes.

use crate::domain::Candle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error types for data operations.
///
/// Every variant is a hard failure for a backtest run: the engine never
/// proceeds on partial data silently filled with defaults.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("instrument not found: {instrument}")]
    InstrumentNotFound { instrument: String },

    #[error("no candles returned for {instrument} between {start} and {end}")]
    Empty {
        instrument: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("csv import error: {0}")]
    CsvError(String),

    #[error("no cached data for instrument '{instrument}'; run `download {instrument}` first")]
    NoCachedData { instrument: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Result of a successful fetch for one instrument.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub instrument: String,
    pub candles: Vec<Candle>,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Oanda,
    CsvImport,
    Cache,
    Synthetic,
}

/// Trait for candle providers.
///
/// Implementations handle the specifics of one source. The cache layer sits
/// above this trait; providers don't know about the cache.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch minute candles for `instrument` with `start <= time < end`.
    fn fetch(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FetchResult, DataError>;

    /// Whether the provider can currently be used (credentials present, etc.).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-instrument downloads.
pub trait DownloadProgress: Send {
    fn on_start(&self, instrument: &str, index: usize, total: usize);

    fn on_complete(
        &self,
        instrument: &str,
        index: usize,
        total: usize,
        result: &Result<usize, DataError>,
    );

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Reports download progress through `tracing`.
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn on_start(&self, instrument: &str, index: usize, total: usize) {
        tracing::info!("[{}/{}] fetching {instrument}", index + 1, total);
    }

    fn on_complete(
        &self,
        instrument: &str,
        _index: usize,
        _total: usize,
        result: &Result<usize, DataError>,
    ) {
        match result {
            Ok(candles) => tracing::info!(instrument, candles, "download ok"),
            Err(e) => tracing::error!(instrument, error = %e, "download failed"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!(succeeded, failed, total, "download complete");
    }
}
