//! Feature/label store: the immutable, time-ordered bar table the engine reads.

use crate::domain::{Bar, Candle};
use crate::features::{FeatureError, FeatureMatrix};
use crate::labeling::{label_candles, LabelConfig};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("bars out of order at index {index}")]
    Unsorted { index: usize },

    #[error("duplicate timestamp {time}")]
    DuplicateTimestamp { time: DateTime<Utc> },

    #[error("bar {index} has {found} features, schema has {expected}")]
    SchemaMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Feature(#[from] FeatureError),
}

/// Ordered bars plus their feature schema. Timestamps are strictly ascending.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    feature_names: Vec<String>,
    bars: Vec<Bar>,
}

impl FeatureStore {
    pub fn new(feature_names: Vec<String>, bars: Vec<Bar>) -> Result<Self, StoreError> {
        for (index, bar) in bars.iter().enumerate() {
            if bar.features.len() != feature_names.len() {
                return Err(StoreError::SchemaMismatch {
                    index,
                    expected: feature_names.len(),
                    found: bar.features.len(),
                });
            }
            if index > 0 {
                let prev = bars[index - 1].time();
                if bar.time() == prev {
                    return Err(StoreError::DuplicateTimestamp { time: prev });
                }
                if bar.time() < prev {
                    return Err(StoreError::Unsorted { index });
                }
            }
        }
        Ok(Self { feature_names, bars })
    }

    /// Compute features and triple-barrier labels for cleaned candles.
    pub fn build(
        candles: &[Candle],
        feature_names: &[String],
        label_config: &LabelConfig,
    ) -> Result<Self, StoreError> {
        let matrix = FeatureMatrix::compute(candles, feature_names)?;
        let labels = label_candles(candles, label_config);

        let bars = candles
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(i, (candle, labels))| Bar {
                candle: candle.clone(),
                features: matrix.row(i),
                labels,
            })
            .collect();

        Self::new(feature_names.to_vec(), bars)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_time(&self) -> Option<DateTime<Utc>> {
        self.bars.first().map(Bar::time)
    }

    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.bars.last().map(Bar::time)
    }

    /// Bars with `from <= time <= to`.
    pub fn range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> &[Bar] {
        if from > to {
            return &[];
        }
        let lo = self.bars.partition_point(|b| b.time() < from);
        let hi = self.bars.partition_point(|b| b.time() <= to);
        &self.bars[lo..hi]
    }

    pub fn get(&self, time: DateTime<Utc>) -> Option<&Bar> {
        self.bars
            .binary_search_by_key(&time, Bar::time)
            .ok()
            .map(|i| &self.bars[i])
    }

    /// Store timestamps within `[start, end]`, ascending.
    pub fn timestamps_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.range(start, end).iter().map(Bar::time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BarrierLabels;
    use crate::indicators::make_candles;
    use chrono::Duration;

    fn bars(minutes: &[i64]) -> Vec<Bar> {
        let base = make_candles(&[1.0])[0].clone();
        minutes
            .iter()
            .map(|m| {
                let mut candle = base.clone();
                candle.time += Duration::minutes(*m);
                Bar {
                    candle,
                    features: vec![Some(*m as f64)],
                    labels: BarrierLabels::unresolved(),
                }
            })
            .collect()
    }

    fn store(minutes: &[i64]) -> FeatureStore {
        FeatureStore::new(vec!["f".into()], bars(minutes)).unwrap()
    }

    #[test]
    fn rejects_unsorted_and_duplicates() {
        let names = vec!["f".to_string()];
        assert_eq!(
            FeatureStore::new(names.clone(), bars(&[0, 2, 1])).unwrap_err(),
            StoreError::Unsorted { index: 2 }
        );
        assert!(matches!(
            FeatureStore::new(names, bars(&[0, 1, 1])).unwrap_err(),
            StoreError::DuplicateTimestamp { .. }
        ));
    }

    #[test]
    fn rejects_schema_mismatch() {
        let err = FeatureStore::new(vec!["a".into(), "b".into()], bars(&[0])).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn range_is_inclusive_and_gap_tolerant() {
        let s = store(&[0, 1, 5, 9]);
        let t0 = s.first_time().unwrap();
        let got: Vec<f64> = s
            .range(t0 + Duration::minutes(1), t0 + Duration::minutes(5))
            .iter()
            .map(|b| b.features[0].unwrap())
            .collect();
        assert_eq!(got, vec![1.0, 5.0]);
        assert!(s.range(t0 + Duration::minutes(2), t0 + Duration::minutes(4)).is_empty());
        assert!(s.range(t0 + Duration::minutes(5), t0).is_empty());
    }

    #[test]
    fn get_and_timestamps_between() {
        let s = store(&[0, 3, 4]);
        let t0 = s.first_time().unwrap();
        assert!(s.get(t0 + Duration::minutes(3)).is_some());
        assert!(s.get(t0 + Duration::minutes(2)).is_none());
        assert_eq!(s.timestamps_between(t0, t0 + Duration::minutes(3)).count(), 2);
    }

    #[test]
    fn build_attaches_features_and_labels() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 * 0.02).collect();
        let candles = make_candles(&closes);
        let cfg = LabelConfig {
            horizon: 10,
            ..LabelConfig::default()
        };
        let s = FeatureStore::build(&candles, &["range".to_string()], &cfg).unwrap();
        assert_eq!(s.len(), 80);
        assert_eq!(s.feature_names(), &["range".to_string()]);
        assert!(s.bars()[0].features[0].is_some());
        // a steady 2-pip/minute climb hits the 10-pip BUY target
        assert!(s.bars()[0].labels.label_buy.is_some());
        assert_eq!(s.bars()[79].labels, BarrierLabels::unresolved());
    }
}
