//! Candle ingestion: order, deduplicate and validate raw provider output.
//!
//! Provider pages can overlap and minute series have gaps (weekends, thin
//! liquidity). Gaps are kept as-is; the engine works on timestamps, not on
//! a dense minute grid.

use crate::domain::Candle;

/// Cleaned candles plus what was removed on the way.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub candles: Vec<Candle>,
    pub duplicates_dropped: usize,
    pub insane_dropped: usize,
}

/// Drop candles that fail the OHLC sanity check, sort ascending by time and
/// keep the first remaining candle for each timestamp.
///
/// Sanity filtering runs first so a bad duplicate never displaces a good one.
pub fn ingest(mut candles: Vec<Candle>) -> IngestReport {
    let before = candles.len();
    candles.retain(Candle::is_sane);
    let insane_dropped = before - candles.len();

    // Stable sort keeps provider order among equal timestamps.
    candles.sort_by_key(|c| c.time);

    let before = candles.len();
    candles.dedup_by_key(|c| c.time);
    let duplicates_dropped = before - candles.len();

    if duplicates_dropped > 0 || insane_dropped > 0 {
        tracing::warn!(
            duplicates_dropped,
            insane_dropped,
            kept = candles.len(),
            "ingest removed candles"
        );
    }

    IngestReport {
        candles,
        duplicates_dropped,
        insane_dropped,
    }
}
