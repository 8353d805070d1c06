//! Business-day arithmetic for look-back windows.
//!
//! Business days are Monday through Friday; holidays are not modeled. Time of
//! day is preserved, so a 20-business-day look-back from 09:31 lands on 09:31.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

fn is_weekend(ts: &DateTime<Utc>) -> bool {
    matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Step back `n` business days from `ts`.
///
/// Each step moves one calendar day back and then skips over weekend days,
/// so a Saturday or Sunday start rolls to the preceding Friday on the first
/// step. `n == 0` returns `ts` unchanged.
pub fn business_days_before(ts: DateTime<Utc>, n: u32) -> DateTime<Utc> {
    let mut cur = ts;
    for _ in 0..n {
        cur -= Duration::days(1);
        while is_weekend(&cur) {
            cur -= Duration::days(1);
        }
    }
    cur
}

/// Minutes in `[from, to)` that fall on a weekday. Zero when `to <= from`.
pub fn weekday_minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let mut minutes = 0;
    let mut cur = from;
    while cur < to {
        let next_midnight = (cur.date_naive() + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc())
            .unwrap_or(to);
        let next = next_midnight.min(to);
        if !is_weekend(&cur) {
            minutes += (next - cur).num_minutes();
        }
        cur = next;
    }
    minutes
}
