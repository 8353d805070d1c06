//! Batch download: fetch → ingest → cache, one instrument at a time.

use super::cache::{CoverageResult, ParquetCache};
use super::ingest::ingest;
use super::provider::{DataError, DataProvider, DownloadProgress};
use chrono::{DateTime, Utc};

/// Download several instruments into the cache.
///
/// An instrument whose cached range already covers `[start, end)` is skipped
/// unless `force` is set. Failures are collected per instrument; an
/// authentication failure stops the batch since every later request would
/// fail the same way.
pub fn download_instruments(
    provider: &dyn DataProvider,
    cache: &ParquetCache,
    instruments: &[&str],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    force: bool,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = instruments.len();
    let mut succeeded = 0;
    let mut errors: Vec<(String, DataError)> = Vec::new();

    for (i, instrument) in instruments.iter().enumerate() {
        progress.on_start(instrument, i, total);

        if !force {
            if let CoverageResult::FullyCovered = cache.covers_range(instrument, start, end) {
                let cached = cache.get_meta(instrument).map_or(0, |m| m.candle_count);
                progress.on_complete(instrument, i, total, &Ok(cached));
                succeeded += 1;
                continue;
            }
        }

        let result = download_single(provider, cache, instrument, start, end);
        progress.on_complete(instrument, i, total, &result);

        match result {
            Ok(_) => succeeded += 1,
            Err(DataError::AuthenticationRequired(msg)) => {
                for rest in &instruments[i..] {
                    errors.push((rest.to_string(), DataError::AuthenticationRequired(msg.clone())));
                }
                break;
            }
            Err(e) => errors.push((instrument.to_string(), e)),
        }
    }

    let failed = errors.len();
    progress.on_batch_complete(succeeded, failed, total);

    DownloadSummary {
        total,
        succeeded,
        failed,
        errors,
    }
}

/// Fetch, clean and cache one instrument. Returns the number of candles cached.
pub fn download_single(
    provider: &dyn DataProvider,
    cache: &ParquetCache,
    instrument: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<usize, DataError> {
    let fetched = provider.fetch(instrument, start, end)?;
    let report = ingest(fetched.candles);
    if report.candles.is_empty() {
        return Err(DataError::Empty {
            instrument: instrument.to_string(),
            start,
            end,
        });
    }
    cache.write_range(instrument, &report.candles, provider.name(), start, end)?;
    Ok(report.candles.len())
}

#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{DataSource, FetchResult};
    use crate::domain::Candle;
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    struct FakeProvider {
        fail_with_auth: bool,
    }

    impl DataProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        fn fetch(
            &self,
            instrument: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<FetchResult, DataError> {
            if self.fail_with_auth {
                return Err(DataError::AuthenticationRequired("bad token".into()));
            }
            let mut candles = Vec::new();
            let mut t = start;
            while t < end {
                candles.push(Candle {
                    time: t,
                    open: 1.0,
                    high: 1.1,
                    low: 0.9,
                    close: 1.0,
                    volume: 1,
                });
                t += Duration::minutes(1);
            }
            Ok(FetchResult {
                instrument: instrument.to_string(),
                candles,
                source: DataSource::Oanda,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl DownloadProgress for Recorder {
        fn on_start(&self, instrument: &str, _: usize, _: usize) {
            self.events.lock().unwrap().push(format!("start {instrument}"));
        }
        fn on_complete(&self, instrument: &str, _: usize, _: usize, r: &Result<usize, DataError>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {instrument} {}", r.is_ok()));
        }
        fn on_batch_complete(&self, s: usize, f: usize, _: usize) {
            self.events.lock().unwrap().push(format!("batch {s}/{f}"));
        }
    }

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("pipwalk_dl_{tag}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn downloads_then_skips_covered() {
        let dir = temp_dir("skip");
        let cache = ParquetCache::new(&dir);
        let start = Utc.with_ymd_and_hms(2025, 4, 21, 0, 0, 0).unwrap();
        let end = start + Duration::minutes(30);
        let provider = FakeProvider { fail_with_auth: false };

        let rec = Recorder::default();
        let summary = download_instruments(&provider, &cache, &["USD_JPY"], start, end, false, &rec);
        assert!(summary.all_succeeded());
        assert_eq!(cache.get_meta("USD_JPY").unwrap().candle_count, 30);

        let summary = download_instruments(&provider, &cache, &["USD_JPY"], start, end, false, &rec);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(rec.events.lock().unwrap().last().unwrap(), "batch 1/0");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn auth_failure_stops_batch() {
        let dir = temp_dir("auth");
        let cache = ParquetCache::new(&dir);
        let start = Utc.with_ymd_and_hms(2025, 4, 21, 0, 0, 0).unwrap();
        let provider = FakeProvider { fail_with_auth: true };
        let rec = Recorder::default();

        let summary = download_instruments(
            &provider,
            &cache,
            &["USD_JPY", "EUR_USD"],
            start,
            start + Duration::minutes(5),
            false,
            &rec,
        );
        assert_eq!(summary.failed, 2);
        assert_eq!(rec.events.lock().unwrap().iter().filter(|e| e.starts_with("start")).count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
