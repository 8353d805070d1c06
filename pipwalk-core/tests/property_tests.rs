//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Monotone k-selection: a longer candidate prefix, or a larger k_ratio,
//!    never shrinks the chosen neighborhood
//! 2. Single position: no trade opens while a previous one is still held
//! 3. Cardinality: one decision per evaluated timestamp, one trade per
//!    decision with a profit
//! 4. Idempotence: the estimator is a pure function of its inputs

use chrono::{DateTime, Duration, TimeZone, Utc};
use pipwalk_core::domain::{Bar, BarrierLabels, Candle, Outcome, Signal};
use pipwalk_core::engine::{
    build_window, choose_k, estimate, simulate, EngineConfig, LeakScrub, NoProgress,
};
use pipwalk_core::store::FeatureStore;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_sorted_distances() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0..3.0_f64, 1..60).prop_map(|mut d| {
        d.sort_by(f64::total_cmp);
        d
    })
}

fn arb_outcome() -> impl Strategy<Value = Option<Outcome>> {
    prop_oneof![
        3 => Just(Some(Outcome::Win)),
        3 => Just(Some(Outcome::Loss)),
        1 => Just(None),
    ]
}

/// (feature a, feature b, label_buy, label_sell, time_buy, time_sell)
type BarSpec = (f64, f64, Option<Outcome>, Option<Outcome>, u32, u32);

fn arb_bar_spec() -> impl Strategy<Value = BarSpec> {
    (
        -2.0..2.0_f64,
        -2.0..2.0_f64,
        arb_outcome(),
        arb_outcome(),
        1..20_u32,
        1..20_u32,
    )
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 23, 0, 0, 0).unwrap()
}

fn store_from(specs: &[BarSpec]) -> FeatureStore {
    let bars = specs
        .iter()
        .enumerate()
        .map(|(i, &(a, b, lb, ls, tb, ts))| Bar {
            candle: Candle {
                time: t0() + Duration::minutes(i as i64),
                open: 150.0,
                high: 150.0,
                low: 150.0,
                close: 150.0,
                volume: 1,
            },
            // round to a coarse grid so exact neighbors are common
            features: vec![Some((a * 4.0).round() / 4.0), Some((b * 4.0).round() / 4.0)],
            labels: BarrierLabels {
                label_buy: lb,
                label_sell: ls,
                time_buy: lb.map(|_| tb),
                time_sell: ls.map(|_| ts),
            },
        })
        .collect();
    FeatureStore::new(vec!["a".into(), "b".into()], bars).unwrap()
}

fn permissive_config() -> EngineConfig {
    EngineConfig {
        days_back: 1,
        min_train_samples: 20,
        significance_level: 0.5,
        dist_mean_thresh: 1.5,
        dist_max_thresh: 2.5,
        ..EngineConfig::default()
    }
}

// ── 1. Monotone k-selection ──────────────────────────────────────────

proptest! {
    /// Extending the candidate prefix never lowers the chosen k.
    #[test]
    fn choose_k_monotone_in_prefix(
        d in arb_sorted_distances(),
        mean_t in 0.1..2.0_f64,
        max_t in 0.1..3.0_f64,
        split in 0.0..1.0_f64,
    ) {
        let short = ((d.len() as f64 * split) as usize).max(1);
        let k_short = choose_k(&d[..short], mean_t, max_t).unwrap_or(short);
        let k_long = choose_k(&d, mean_t, max_t).unwrap_or(d.len());
        prop_assert!(k_long >= k_short);
    }

    /// The chosen k always satisfies both distance thresholds.
    #[test]
    fn chosen_k_is_within_thresholds(
        d in arb_sorted_distances(),
        mean_t in 0.1..2.0_f64,
        max_t in 0.1..3.0_f64,
    ) {
        if let Some(k) = choose_k(&d, mean_t, max_t) {
            let prefix = &d[..k];
            let mean = prefix.iter().sum::<f64>() / k as f64;
            prop_assert!(mean <= mean_t);
            prop_assert!(prefix.iter().all(|x| *x <= max_t));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Raising k_ratio never lowers the k chosen by the estimator.
    #[test]
    fn estimator_k_monotone_in_k_ratio(
        specs in prop::collection::vec(arb_bar_spec(), 40..90),
        qa in -2.0..2.0_f64,
        qb in -2.0..2.0_f64,
        low in 0.05..0.5_f64,
        bump in 0.0..0.5_f64,
    ) {
        let store = store_from(&specs);
        let decision = t0() + Duration::minutes(specs.len() as i64 + 30);
        let window = build_window(&store, decision, 1, LeakScrub::Enabled);
        let query = [Some(qa), Some(qb)];

        let small = EngineConfig { k_ratio: low, ..permissive_config() };
        let large = EngineConfig { k_ratio: (low + bump).min(1.0), ..permissive_config() };
        let a = estimate(&window, &query, &small).diagnostics;
        let b = estimate(&window, &query, &large).diagnostics;
        if let (Some(a), Some(b)) = (a, b) {
            prop_assert!(b.buy.k >= a.buy.k);
            prop_assert!(b.sell.k >= a.sell.k);
        }
    }

    /// Equal inputs give equal estimates.
    #[test]
    fn estimator_is_idempotent(
        specs in prop::collection::vec(arb_bar_spec(), 30..80),
        qa in -2.0..2.0_f64,
        qb in -2.0..2.0_f64,
    ) {
        let store = store_from(&specs);
        let decision = t0() + Duration::minutes(specs.len() as i64);
        let window = build_window(&store, decision, 1, LeakScrub::Enabled);
        let query = [Some(qa), Some(qb)];
        let config = permissive_config();
        prop_assert_eq!(estimate(&window, &query, &config), estimate(&window, &query, &config));
    }
}

// ── 2 & 3. Lifecycle invariants ──────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn single_position_and_cardinality(
        specs in prop::collection::vec(arb_bar_spec(), 60..140),
    ) {
        let store = store_from(&specs);
        let start = t0() + Duration::minutes(30);
        let end = store.last_time().unwrap();
        let out = simulate(&store, start, end, &permissive_config(), &NoProgress);

        // one record per evaluated timestamp, ascending
        prop_assert_eq!(out.decisions.len(), store.range(start, end).len());
        for pair in out.decisions.windows(2) {
            prop_assert!(pair[0].time < pair[1].time);
        }

        // trades match the decisions carrying a profit
        let opened: Vec<_> = out.decisions.iter().filter(|d| d.profit.is_some()).collect();
        prop_assert_eq!(opened.len(), out.trades.len());
        for (record, trade) in opened.iter().zip(&out.trades) {
            prop_assert_eq!(record.time, trade.entry_time);
            prop_assert_eq!(record.signal, Signal::from(trade.side));
        }

        // no entry while the previous position is held
        for pair in out.trades.windows(2) {
            let busy_until = pair[0].entry_time
                + Duration::minutes(i64::from(pair[0].holding_minutes));
            prop_assert!(pair[1].entry_time > busy_until);
        }

        // every entry's own label was resolved
        for trade in &out.trades {
            let bar = store.get(trade.entry_time).unwrap();
            prop_assert!(bar.labels.label(trade.side).is_some());
        }
    }
}
