//! Causal training window.
//!
//! The window for decision time `t` holds copies of every bar in
//! `[business_days_before(t, days_back), t - 1 minute]`. A bar's label is only
//! known at `t` if it resolved within the minutes elapsed since that bar, so
//! labels resolving later are cleared in the copy.

use super::config::LeakScrub;
use crate::calendar::business_days_before;
use crate::domain::Bar;
use crate::store::FeatureStore;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct TrainingWindow {
    pub decision_time: DateTime<Utc>,
    pub train_start: DateTime<Utc>,
    bars: Vec<Bar>,
    scrubbed_buy: usize,
    scrubbed_sell: usize,
}

impl TrainingWindow {
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Whether the window holds enough bars to estimate from. An
    /// insufficient window is not an error; the decision is NONE.
    pub fn is_sufficient(&self, min_train_samples: usize) -> bool {
        self.bars.len() >= min_train_samples
    }

    /// Number of (buy, sell) labels hidden by the leak scrub.
    pub fn scrubbed(&self) -> (usize, usize) {
        (self.scrubbed_buy, self.scrubbed_sell)
    }
}

/// Build the training window for `decision_time`.
pub fn build_window(
    store: &FeatureStore,
    decision_time: DateTime<Utc>,
    days_back: u32,
    leak_scrub: LeakScrub,
) -> TrainingWindow {
    let train_start = business_days_before(decision_time, days_back);
    let train_end = decision_time - Duration::minutes(1);
    let mut bars = store.range(train_start, train_end).to_vec();

    let mut scrubbed_buy = 0;
    let mut scrubbed_sell = 0;
    if leak_scrub == LeakScrub::Enabled {
        for bar in &mut bars {
            let elapsed = (decision_time - bar.time()).num_minutes();
            let labels = &mut bar.labels;
            if labels.label_buy.is_some() && labels.time_buy.is_some_and(|t| i64::from(t) > elapsed) {
                labels.label_buy = None;
                scrubbed_buy += 1;
            }
            if labels.label_sell.is_some() && labels.time_sell.is_some_and(|t| i64::from(t) > elapsed) {
                labels.label_sell = None;
                scrubbed_sell += 1;
            }
        }
    }

    tracing::trace!(
        %decision_time,
        %train_start,
        bars = bars.len(),
        scrubbed_buy,
        scrubbed_sell,
        "training window"
    );

    TrainingWindow {
        decision_time,
        train_start,
        bars,
        scrubbed_buy,
        scrubbed_sell,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BarrierLabels, Candle, Outcome};
    use chrono::TimeZone;

    fn bar(time: DateTime<Utc>, time_buy: Option<u32>, time_sell: Option<u32>) -> Bar {
        Bar {
            candle: Candle {
                time,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1,
            },
            features: vec![Some(0.0)],
            labels: BarrierLabels {
                label_buy: time_buy.map(|_| Outcome::Win),
                label_sell: time_sell.map(|_| Outcome::Loss),
                time_buy,
                time_sell,
            },
        }
    }

    fn decision() -> DateTime<Utc> {
        // Wednesday
        Utc.with_ymd_and_hms(2025, 4, 23, 10, 0, 0).unwrap()
    }

    #[test]
    fn excludes_decision_minute_and_future() {
        let t = decision();
        let store = FeatureStore::new(
            vec!["f".into()],
            vec![
                bar(t - Duration::minutes(2), None, None),
                bar(t - Duration::minutes(1), None, None),
                bar(t, None, None),
                bar(t + Duration::minutes(1), None, None),
            ],
        )
        .unwrap();
        let w = build_window(&store, t, 1, LeakScrub::Enabled);
        assert_eq!(w.len(), 2);
        assert!(w.bars().iter().all(|b| b.time() < t));
    }

    #[test]
    fn window_starts_business_days_back() {
        let t = decision();
        let store = FeatureStore::new(
            vec!["f".into()],
            vec![
                bar(t - Duration::days(2) - Duration::minutes(1), None, None),
                bar(t - Duration::days(2), None, None),
                bar(t - Duration::hours(1), None, None),
            ],
        )
        .unwrap();
        let w = build_window(&store, t, 2, LeakScrub::Enabled);
        assert_eq!(w.train_start, t - Duration::days(2));
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn scrub_hides_labels_resolving_after_decision() {
        let t = decision();
        let store = FeatureStore::new(
            vec!["f".into()],
            vec![
                // 10 minutes old; buy resolved after 5 (known), sell after 12 (unknown)
                bar(t - Duration::minutes(10), Some(5), Some(12)),
                // 3 minutes old; buy resolved exactly at 3 (known)
                bar(t - Duration::minutes(3), Some(3), Some(4)),
            ],
        )
        .unwrap();

        let w = build_window(&store, t, 1, LeakScrub::Enabled);
        assert_eq!(w.bars()[0].labels.label_buy, Some(Outcome::Win));
        assert_eq!(w.bars()[0].labels.label_sell, None);
        assert_eq!(w.bars()[1].labels.label_buy, Some(Outcome::Win));
        assert_eq!(w.bars()[1].labels.label_sell, None);
        assert_eq!(w.scrubbed(), (0, 2));

        // the store itself is untouched
        assert_eq!(store.bars()[0].labels.label_sell, Some(Outcome::Loss));
    }

    #[test]
    fn disabled_scrub_keeps_labels() {
        let t = decision();
        let store = FeatureStore::new(vec!["f".into()], vec![bar(t - Duration::minutes(1), Some(30), None)]).unwrap();
        let w = build_window(&store, t, 1, LeakScrub::Disabled);
        assert_eq!(w.bars()[0].labels.label_buy, Some(Outcome::Win));
        assert_eq!(w.scrubbed(), (0, 0));
    }

    #[test]
    fn sufficiency_threshold() {
        let t = decision();
        let bars = (1..=3).map(|m| bar(t - Duration::minutes(m), None, None)).rev().collect();
        let store = FeatureStore::new(vec!["f".into()], bars).unwrap();
        let w = build_window(&store, t, 1, LeakScrub::Enabled);
        assert!(w.is_sufficient(3));
        assert!(!w.is_sufficient(4));
    }
}
