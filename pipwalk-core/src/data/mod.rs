//! Market data acquisition, cleaning and caching.

pub mod cache;
pub mod csv_import;
pub mod download;
pub mod ingest;
pub mod oanda;
pub mod provider;

pub use cache::{hash_candles, CacheMeta, CacheStatus, CachedSpan, CoverageResult, ParquetCache, MAX_GAP_MINUTES};
pub use csv_import::{read_candles, read_candles_file, write_candles};
pub use download::{download_instruments, download_single, DownloadSummary};
pub use ingest::{ingest, IngestReport};
pub use oanda::{OandaProvider, LIVE_BASE_URL, PRACTICE_BASE_URL};
pub use provider::{DataError, DataProvider, DataSource, DownloadProgress, FetchResult, LogProgress};
