//! Fall detection benchmarks.
//!
//! The detector runs once per inbound sample, so per-sample cost is the
//! number that matters.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stride_bench::{fall_cycle_stream, grounded_stream, live_sample};
use stride_core::{ConnectionFallState, FallConfig, FallDetector, FallStateStore};

/// Benchmark the raw state machine.
fn bench_detector(c: &mut Criterion) {
    let mut group = c.benchmark_group("detector");

    let detector = FallDetector::new(FallConfig::strict());

    group.bench_function("grounded_sample", |b| {
        let sample = live_sample(0.0, 0.1, -0.2, 9.81);
        let mut state = ConnectionFallState::default();
        b.iter(|| detector.process(black_box(&mut state), black_box(&sample)));
    });

    group.bench_function("full_fall_episode", |b| {
        let episode = [
            live_sample(0.0, 0.0, 0.0, 1.0),
            live_sample(200.0, 5.0, 5.0, 5.0),
            live_sample(500.0, 20.0, 20.0, 20.0),
        ];
        b.iter(|| {
            let mut state = ConnectionFallState::default();
            episode
                .iter()
                .filter_map(|s| detector.process(&mut state, s))
                .count()
        });
    });

    for size in [1_000, 10_000].iter() {
        let stream = fall_cycle_stream(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(
            BenchmarkId::new("cycle_stream", size),
            &stream,
            |b, stream| {
                b.iter(|| {
                    let mut state = ConnectionFallState::default();
                    stream
                        .iter()
                        .filter_map(|s| detector.process(&mut state, s))
                        .count()
                });
            },
        );
    }

    group.finish();
}

/// Benchmark detection through the keyed store.
fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    group.bench_function("apply_tracked", |b| {
        let store = FallStateStore::new(FallConfig::strict());
        store.track("conn-1");
        let sample = live_sample(0.0, 0.1, -0.2, 9.81);
        b.iter(|| store.apply(black_box("conn-1"), black_box(&sample)));
    });

    group.bench_function("apply_untracked", |b| {
        let store = FallStateStore::new(FallConfig::strict());
        let sample = live_sample(0.0, 0.1, -0.2, 9.81);
        b.iter(|| store.apply(black_box("ghost"), black_box(&sample)));
    });

    // Many live connections sharing the store.
    group.bench_function("apply_1000_connections", |b| {
        let store = FallStateStore::new(FallConfig::strict());
        for i in 0..1000 {
            store.track(format!("conn-{}", i));
        }
        let stream = grounded_stream(1000);
        let mut i = 0usize;
        b.iter(|| {
            let id = format!("conn-{}", i % 1000);
            let sample = &stream[i % stream.len()];
            i += 1;
            store.apply(&id, sample)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_detector, bench_store);
criterion_main!(benches);
