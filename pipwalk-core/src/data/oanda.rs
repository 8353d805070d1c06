//! OANDA v3 instrument-candles provider.
//!
//! Pages through `/v3/instruments/{instrument}/candles` with `granularity=M1`,
//! `price=M` and `count=500`, starting at the requested `from` time and
//! advancing the cursor to one minute past the last complete candle of each
//! page. Only complete candles are kept. Transient failures (connect errors,
//! timeouts, 429 and 5xx responses) are retried with exponential backoff; any
//! other failure aborts the fetch.

use super::provider::{DataError, DataProvider, DataSource, FetchResult};
use crate::domain::Candle;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration;

pub const LIVE_BASE_URL: &str = "https://api-fxtrade.oanda.com";
pub const PRACTICE_BASE_URL: &str = "https://api-fxpractice.oanda.com";

/// Maximum candles OANDA returns for one request.
const PAGE_SIZE: u32 = 500;

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    #[serde(default)]
    candles: Vec<CandleData>,
}

#[derive(Debug, Deserialize)]
struct CandleData {
    #[serde(default)]
    complete: bool,
    volume: u64,
    time: DateTime<Utc>,
    mid: Option<MidPrices>,
}

/// OANDA encodes prices as decimal strings.
#[derive(Debug, Deserialize)]
struct MidPrices {
    o: String,
    h: String,
    l: String,
    c: String,
}

/// One parsed page: the complete candles and whether the page held any candle at all.
#[derive(Debug)]
struct Page {
    complete: Vec<Candle>,
    any_candles: bool,
}

/// OANDA REST provider for minute mid candles.
pub struct OandaProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    access_token: String,
    max_retries: u32,
    base_delay: Duration,
    page_delay: Duration,
}

impl OandaProvider {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            access_token: access_token.into(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            page_delay: Duration::from_millis(200),
        })
    }

    fn candles_url(&self, instrument: &str) -> String {
        format!(
            "{}/v3/instruments/{instrument}/candles",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Convert one response page into candles. Incomplete candles are dropped;
    /// the `end` bound is applied by the caller after the cursor moves.
    fn parse_page(resp: CandlesResponse) -> Result<Page, DataError> {
        let any_candles = !resp.candles.is_empty();
        let mut complete = Vec::with_capacity(resp.candles.len());

        for c in resp.candles {
            if !c.complete {
                continue;
            }
            let mid = c.mid.ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("candle at {} has no mid prices", c.time))
            })?;
            complete.push(Candle {
                time: c.time,
                open: parse_price(&mid.o)?,
                high: parse_price(&mid.h)?,
                low: parse_price(&mid.l)?,
                close: parse_price(&mid.c)?,
                volume: c.volume,
            });
        }

        Ok(Page {
            complete,
            any_candles,
        })
    }

    /// Fetch one page with retry and backoff.
    fn fetch_page(
        &self,
        instrument: &str,
        from: DateTime<Utc>,
    ) -> Result<Page, DataError> {
        let url = self.candles_url(instrument);
        let from_param = from.to_rfc3339_opts(SecondsFormat::Secs, true);
        let count_param = PAGE_SIZE.to_string();
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            let sent = self
                .client
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&[
                    ("from", from_param.as_str()),
                    ("granularity", "M1"),
                    ("count", count_param.as_str()),
                    ("price", "M"),
                ])
                .send();

            match sent {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(DataError::AuthenticationRequired(format!(
                            "OANDA rejected the access token (HTTP {status})"
                        )));
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::InstrumentNotFound {
                            instrument: instrument.to_string(),
                        });
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(1);
                        tracing::warn!(instrument, retry_after, "rate limited by OANDA");
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status.is_server_error() {
                        last_error = Some(DataError::Other(format!("HTTP {status} for {instrument}")));
                        continue;
                    }

                    if !status.is_success() {
                        return Err(DataError::Other(format!("HTTP {status} for {instrument}")));
                    }

                    let body: CandlesResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse candles for {instrument}: {e}"
                        ))
                    })?;
                    return Self::parse_page(body);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        tracing::warn!(instrument, attempt, error = %e, "candle request failed, retrying");
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

/// Move the cursor past one page and collect its candles before `end`.
///
/// The cursor follows the last complete candle even when that candle is past
/// `end`, so a range ending inside a market-closed gap finishes in one step.
/// Returns `None` when upstream has nothing left.
fn advance(
    cursor: DateTime<Utc>,
    page: Page,
    end: DateTime<Utc>,
    out: &mut Vec<Candle>,
) -> Option<DateTime<Utc>> {
    match page.complete.last().map(|c| c.time) {
        Some(last_time) => {
            out.extend(page.complete.into_iter().filter(|c| c.time < end));
            Some(last_time + ChronoDuration::minutes(1))
        }
        // Page held only the still-forming candle: step past it.
        None if page.any_candles => Some(cursor + ChronoDuration::minutes(1)),
        None => None,
    }
}

fn parse_price(raw: &str) -> Result<f64, DataError> {
    raw.parse::<f64>()
        .map_err(|e| DataError::ResponseFormatChanged(format!("bad price '{raw}': {e}")))
}

impl DataProvider for OandaProvider {
    fn name(&self) -> &str {
        "oanda"
    }

    fn fetch(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FetchResult, DataError> {
        let mut cursor = start;
        let mut candles = Vec::new();
        let mut pages = 0usize;

        while cursor < end {
            let page = self.fetch_page(instrument, cursor)?;
            pages += 1;

            match advance(cursor, page, end, &mut candles) {
                Some(next) => cursor = next,
                None => break,
            }

            std::thread::sleep(self.page_delay);
        }

        tracing::info!(instrument, pages, candles = candles.len(), "fetched minute candles");

        if candles.is_empty() {
            return Err(DataError::Empty {
                instrument: instrument.to_string(),
                start,
                end,
            });
        }

        Ok(FetchResult {
            instrument: instrument.to_string(),
            candles,
            source: DataSource::Oanda,
        })
    }

    fn is_available(&self) -> bool {
        !self.access_token.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PAGE: &str = r#"{
        "instrument": "USD_JPY",
        "granularity": "M1",
        "candles": [
            {"complete": true, "volume": 41, "time": "2025-04-21T00:00:00.000000000Z",
             "mid": {"o": "142.101", "h": "142.130", "l": "142.090", "c": "142.120"}},
            {"complete": true, "volume": 17, "time": "2025-04-21T00:01:00.000000000Z",
             "mid": {"o": "142.120", "h": "142.125", "l": "142.100", "c": "142.105"}},
            {"complete": false, "volume": 3, "time": "2025-04-21T00:02:00.000000000Z",
             "mid": {"o": "142.105", "h": "142.110", "l": "142.100", "c": "142.108"}}
        ]
    }"#;

    fn far_end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn parse_keeps_only_complete_candles() {
        let resp: CandlesResponse = serde_json::from_str(PAGE).unwrap();
        let page = OandaProvider::parse_page(resp).unwrap();
        assert!(page.any_candles);
        assert_eq!(page.complete.len(), 2);
        assert_eq!(page.complete[0].open, 142.101);
        assert_eq!(page.complete[1].volume, 17);
        assert_eq!(
            page.complete[1].time,
            Utc.with_ymd_and_hms(2025, 4, 21, 0, 1, 0).unwrap()
        );
    }

    fn candle_at(time: DateTime<Utc>) -> Candle {
        Candle {
            time,
            open: 142.1,
            high: 142.2,
            low: 142.0,
            close: 142.1,
            volume: 1,
        }
    }

    #[test]
    fn advance_collects_only_candles_before_end() {
        let resp: CandlesResponse = serde_json::from_str(PAGE).unwrap();
        let page = OandaProvider::parse_page(resp).unwrap();
        let cursor = Utc.with_ymd_and_hms(2025, 4, 21, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 4, 21, 0, 1, 0).unwrap();

        let mut out = Vec::new();
        let next = advance(cursor, page, end, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 4, 21, 0, 2, 0).unwrap());
    }

    #[test]
    fn range_ending_in_weekend_gap_finishes_in_one_step() {
        // Friday close, end on Saturday, next page starts Sunday evening.
        let cursor = Utc.with_ymd_and_hms(2025, 4, 18, 22, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 4, 19, 12, 0, 0).unwrap();
        let sunday = Utc.with_ymd_and_hms(2025, 4, 20, 21, 0, 0).unwrap();
        let page = Page {
            complete: (0..5).map(|i| candle_at(sunday + ChronoDuration::minutes(i))).collect(),
            any_candles: true,
        };

        let mut out = Vec::new();
        let next = advance(cursor, page, end, &mut out).unwrap();
        assert!(out.is_empty());
        assert!(next >= end);
        assert_eq!(next, sunday + ChronoDuration::minutes(5));
    }

    #[test]
    fn forming_candle_only_steps_one_minute() {
        let cursor = Utc.with_ymd_and_hms(2025, 4, 21, 0, 2, 0).unwrap();
        let page = Page {
            complete: Vec::new(),
            any_candles: true,
        };
        let mut out = Vec::new();
        assert_eq!(
            advance(cursor, page, far_end(), &mut out),
            Some(cursor + ChronoDuration::minutes(1))
        );

        let empty = Page {
            complete: Vec::new(),
            any_candles: false,
        };
        assert_eq!(advance(cursor, empty, far_end(), &mut out), None);
    }

    #[test]
    fn parse_rejects_non_numeric_price() {
        let body = r#"{"candles": [{"complete": true, "volume": 1,
            "time": "2025-04-21T00:00:00Z", "mid": {"o": "x", "h": "1", "l": "1", "c": "1"}}]}"#;
        let resp: CandlesResponse = serde_json::from_str(body).unwrap();
        let err = OandaProvider::parse_page(resp).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn empty_page_has_no_candles() {
        let resp: CandlesResponse = serde_json::from_str(r#"{"candles": []}"#).unwrap();
        let page = OandaProvider::parse_page(resp).unwrap();
        assert!(!page.any_candles);
        assert!(page.complete.is_empty());
    }

    #[test]
    fn url_joins_without_double_slash() {
        let provider = OandaProvider::new("https://example.test/", "token").unwrap();
        assert_eq!(
            provider.candles_url("USD_JPY"),
            "https://example.test/v3/instruments/USD_JPY/candles"
        );
        assert!(provider.is_available());
    }
}
