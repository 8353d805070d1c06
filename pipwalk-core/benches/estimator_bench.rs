//! Criterion benchmarks for pipwalk hot paths.
//!
//! Benchmarks:
//! 1. Estimator on windows of increasing size (serial and rayon distance paths)
//! 2. Window construction with the leak scrub
//! 3. Feature matrix for the default feature set

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pipwalk_core::domain::{Bar, BarrierLabels, Candle, Outcome};
use pipwalk_core::engine::{build_window, estimate, EngineConfig, LeakScrub};
use pipwalk_core::features::{default_features, FeatureMatrix};
use pipwalk_core::store::FeatureStore;

// ── Helpers ──────────────────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 21, 0, 0, 0).unwrap()
}

fn make_candles(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 150.0 + (i as f64 * 0.05).sin() * 0.3;
            let open = close - 0.004;
            Candle {
                time: t0() + Duration::minutes(i as i64),
                open,
                high: close + 0.02,
                low: open - 0.02,
                close,
                volume: 100 + (i as u64 % 50),
            }
        })
        .collect()
}

fn make_store(n: usize, dims: usize) -> FeatureStore {
    let bars = (0..n)
        .map(|i| {
            let features = (0..dims)
                .map(|d| Some(((i * (d + 3)) as f64 * 0.37).sin()))
                .collect();
            let buy = if i % 3 == 0 { Outcome::Loss } else { Outcome::Win };
            let sell = if i % 3 == 0 { Outcome::Win } else { Outcome::Loss };
            Bar {
                candle: Candle {
                    time: t0() + Duration::minutes(i as i64),
                    open: 150.0,
                    high: 150.0,
                    low: 150.0,
                    close: 150.0,
                    volume: 100,
                },
                features,
                labels: BarrierLabels {
                    label_buy: Some(buy),
                    label_sell: Some(sell),
                    time_buy: Some(5),
                    time_sell: Some(5),
                },
            }
        })
        .collect();
    let names = (0..dims).map(|d| format!("f{d}")).collect();
    FeatureStore::new(names, bars).unwrap()
}

// ── 1. Estimator ─────────────────────────────────────────────────────

fn bench_estimator(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimator");
    let config = EngineConfig {
        days_back: 30,
        ..EngineConfig::default()
    };

    for n in [1_440usize, 7_200, 28_800] {
        let store = make_store(n, 10);
        let decision = store.last_time().unwrap() + Duration::minutes(10);
        let window = build_window(&store, decision, config.days_back, LeakScrub::Enabled);
        let query: Vec<Option<f64>> = (0..10).map(|d| Some((d as f64 * 0.1).cos())).collect();

        group.bench_with_input(BenchmarkId::new("estimate", n), &n, |b, _| {
            b.iter(|| estimate(black_box(&window), black_box(&query), &config))
        });
    }

    group.finish();
}

// ── 2. Window ────────────────────────────────────────────────────────

fn bench_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("window");
    let store = make_store(28_800, 10);
    let decision = store.last_time().unwrap() - Duration::minutes(30);

    group.bench_function("build_20_days_scrubbed", |b| {
        b.iter(|| build_window(black_box(&store), decision, 20, LeakScrub::Enabled))
    });

    group.finish();
}

// ── 3. Features ──────────────────────────────────────────────────────

fn bench_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("features");
    let candles = make_candles(28_800);
    let names = default_features();

    group.bench_function("default_set_28800", |b| {
        b.iter(|| FeatureMatrix::compute(black_box(&candles), &names))
    });

    group.finish();
}

criterion_group!(benches, bench_estimator, bench_window, bench_features);
criterion_main!(benches);
