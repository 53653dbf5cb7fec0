//! # Post Fan-Out Benchmarks
//!
//! Cost of `post` as subscribers and unrelated dispatchers grow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nove_bus::{Bus, Declaration, Subscribe};

#[derive(Default)]
struct Counter {
    hits: AtomicU64,
}

impl Subscribe for Counter {
    fn declare(d: &mut Declaration<Self>) {
        d.handle::<u64>(|c, n| {
            c.hits.fetch_add(*n, Ordering::Relaxed);
        });
    }
}

#[derive(Default)]
struct Other;

impl Subscribe for Other {
    fn declare(d: &mut Declaration<Self>) {
        d.handle::<String>(|_, _| {});
    }
}

fn bench_post_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("post-fanout");

    for subscribers in [1usize, 10, 100, 1000] {
        let bus = Bus::new();
        let counters: Vec<Arc<Counter>> = (0..subscribers)
            .map(|_| Arc::new(Counter::default()))
            .collect();
        for counter in &counters {
            bus.register(counter).expect("register");
        }

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(BenchmarkId::new("post", subscribers), &bus, |b, bus| {
            b.iter(|| black_box(bus.post(black_box(1u64)).expect("post")))
        });
    }

    group.finish();
}

fn bench_unmatched_post(c: &mut Criterion) {
    let bus = Bus::new();
    let others: Vec<Arc<Other>> = (0..100).map(|_| Arc::new(Other)).collect();
    for other in &others {
        bus.register(other).expect("register");
    }

    c.bench_function("post-unmatched", |b| {
        b.iter(|| black_box(bus.post(black_box(1u64)).expect("post")))
    });
}

fn bench_register(c: &mut Criterion) {
    c.bench_function("register-cached-plan", |b| {
        let bus = Bus::new();
        b.iter(|| {
            let counter = Arc::new(Counter::default());
            black_box(bus.register(&counter).expect("register"));
        })
    });
}

criterion_group!(
    benches,
    bench_post_fanout,
    bench_unmatched_post,
    bench_register
);
criterion_main!(benches);
