//! Benchmarks for the outlier detectors and the consensus engine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use outlier_consensus::consensus::{compare, MethodFlags};
use outlier_consensus::core::{FeatureTable, FeatureTableBuilder, FlagVector};
use outlier_consensus::detection::{
    Detector, IsolationForestDetector, LofDetector, ZScoreDetector,
};

fn generate_table(n: usize) -> FeatureTable {
    let wave = |i: usize, period: f64| (2.0 * std::f64::consts::PI * i as f64 / period).sin();
    let mut power: Vec<f64> = (0..n).map(|i| 1.0 + 0.5 * wave(i, 60.0)).collect();
    let voltage: Vec<f64> = (0..n).map(|i| 240.0 + 2.0 * wave(i, 1440.0)).collect();
    let intensity: Vec<f64> = power.iter().map(|p| p * 4.2 + 0.1).collect();
    for i in (0..n).step_by(97) {
        power[i] += 8.0;
    }
    FeatureTableBuilder::new()
        .column("Global_active_power", power)
        .column("Voltage", voltage)
        .column("Global_intensity", intensity)
        .build()
        .unwrap()
}

fn bench_detectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("outlier_detectors");
    group.sample_size(10);

    for size in [500, 1000, 2000].iter() {
        let table = generate_table(*size);

        group.bench_with_input(BenchmarkId::new("ZScore", size), size, |b, _| {
            let detector = ZScoreDetector::default();
            b.iter(|| detector.run(black_box(&table)))
        });

        group.bench_with_input(BenchmarkId::new("IsolationForest", size), size, |b, _| {
            let detector = IsolationForestDetector::default();
            b.iter(|| detector.run(black_box(&table)))
        });

        group.bench_with_input(BenchmarkId::new("LOF", size), size, |b, _| {
            let detector = LofDetector::default();
            b.iter(|| detector.run(black_box(&table)))
        });
    }

    group.finish();
}

fn bench_consensus(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus");

    for size in [10_000, 100_000].iter() {
        let z = FlagVector::from_bools((0..*size).map(|i| i % 50 == 0).collect());
        let f = FlagVector::from_bools((0..*size).map(|i| i % 20 == 0).collect());
        let l = FlagVector::from_bools((0..*size).map(|i| i % 30 == 0).collect());

        group.bench_with_input(BenchmarkId::new("compare", size), size, |b, _| {
            b.iter(|| {
                compare(black_box([
                    MethodFlags::new("Z-Score", "zscore", &z),
                    MethodFlags::new("Isolation Forest", "iforest", &f),
                    MethodFlags::new("LOF", "lof", &l),
                ]))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_detectors, bench_consensus);
criterion_main!(benches);
