//! Hot path benchmarks for the aggregator.
//!
//! Run with: `cargo bench --bench hot_paths`
//! Compare baselines: `cargo bench --bench hot_paths -- --baseline main`
//!
//! Compares the worker round trip against a plain mutex-guarded triad, both
//! uncontended and with several threads hammering the same counters.

use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use parking_lot::Mutex;
use red_agg::{Aggregator, AggregatorConfig, Field};

const THREADS: usize = 8;
const ADDS_PER_THREAD: usize = 1_000;

#[derive(Default)]
struct LockedTriad {
    requests: i64,
    errors: i64,
}

fn bench_add_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_uncontended");
    group.throughput(Throughput::Elements(1));

    let aggregator = Aggregator::spawn(AggregatorConfig::default()).unwrap();
    let mut red = aggregator.start();
    group.bench_function("worker", |b| {
        b.iter(|| red.add(Field::Requests, black_box(1)).unwrap())
    });

    let locked = Mutex::new(LockedTriad::default());
    group.bench_function("mutex", |b| {
        b.iter(|| {
            let mut triad = locked.lock();
            triad.requests += black_box(1);
            triad.requests
        })
    });

    group.finish();
}

fn bench_add_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_contended");
    group.throughput(Throughput::Elements((THREADS * ADDS_PER_THREAD) as u64));

    for capacity in [1, 100, 1000] {
        let config = AggregatorConfig::default().with_queue_capacity(capacity);
        let aggregator = Aggregator::spawn(config).unwrap();
        group.bench_function(format!("worker_queue_{}", capacity), |b| {
            b.iter(|| {
                thread::scope(|s| {
                    for t in 0..THREADS {
                        let mut red = aggregator.handle();
                        s.spawn(move || {
                            let field = if t % 4 == 0 { Field::Errors } else { Field::Requests };
                            for _ in 0..ADDS_PER_THREAD {
                                red.add(field, 1).unwrap();
                            }
                        });
                    }
                });
            })
        });
    }

    let locked = Mutex::new(LockedTriad::default());
    group.bench_function("mutex", |b| {
        b.iter(|| {
            thread::scope(|s| {
                for t in 0..THREADS {
                    let locked = &locked;
                    s.spawn(move || {
                        for _ in 0..ADDS_PER_THREAD {
                            let mut triad = locked.lock();
                            if t % 4 == 0 {
                                triad.errors += 1;
                            } else {
                                triad.requests += 1;
                            }
                        }
                    });
                }
            });
        })
    });

    group.finish();
}

fn bench_now(c: &mut Criterion) {
    let aggregator = Aggregator::spawn(AggregatorConfig::default()).unwrap();
    let mut red = aggregator.start();
    c.bench_function("now", |b| b.iter(|| black_box(red.now())));
}

criterion_group!(benches, bench_add_uncontended, bench_add_contended, bench_now);
criterion_main!(benches);
