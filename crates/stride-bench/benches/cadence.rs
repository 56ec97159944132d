//! Cadence estimation and stream fan-out benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stride_bench::walk_history;
use stride_core::{estimate_cadence, StreamHub};

/// Benchmark the estimator across history sizes (the O(N log N) claim).
fn bench_estimator(c: &mut Criterion) {
    let mut group = c.benchmark_group("cadence");

    for size in [256, 1024, 4096, 16384].iter() {
        let history = walk_history(1.8, 50.0, *size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &history,
            |b, history| b.iter(|| estimate_cadence(black_box(history))),
        );
    }

    group.finish();
}

/// Benchmark hub fan-out to observer counts.
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");

    for size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let hub = StreamHub::with_capacity(131072);
            let _rxs: Vec<_> = (0..size)
                .map(|i| hub.attach(format!("conn-{}", i)))
                .collect();
            let payload = Bytes::from_static(&[0u8; 96]);

            b.iter(|| hub.publish(black_box(Some("conn-0")), payload.clone()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_estimator, bench_fanout);
criterion_main!(benches);
