use criterion::{black_box, criterion_group, criterion_main, Criterion};
use replica_kit::prelude::*;

fn bench_lookup(c: &mut Criterion) {
    let engine = Replicated::new(Counter::new());

    c.bench_function("Replicated::get + increment x1000", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                engine.get().unwrap().lock().increment();
            }
        })
    });

    c.bench_function("retained handle increment x1000", |b| {
        let mine = engine.get().unwrap();
        b.iter(|| {
            for _ in 0..1000 {
                mine.lock().increment();
            }
        })
    });

    c.bench_function("get_at_slot_unchecked x1000", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                black_box(engine.get_at_slot_unchecked(0));
            }
        })
    });
}

fn bench_merge(c: &mut Criterion) {
    let engine = Replicated::with_capacity(64, Counter::new()).unwrap();
    for slot in 0..64 {
        engine.get_at_slot(slot).unwrap().lock().increment_by(100);
    }

    c.bench_function("snapshot_merge 64 counters", |b| {
        b.iter(|| black_box(engine.snapshot_merge().into_inner().value()))
    });

    let histograms = Replicated::from_fn(|| Histogram::new("bench", 100, 0.0, 1.0));
    for slot in 0..64 {
        let replica = histograms.get_at_slot(slot).unwrap();
        let mut h = replica.lock();
        for i in 0..100 {
            h.fill(f64::from(i) / 100.0);
        }
    }

    c.bench_function("snapshot_merge 64 histograms x100 bins", |b| {
        b.iter(|| black_box(histograms.snapshot_merge().into_inner().integral()))
    });
}

fn bench_lazy_build(c: &mut Criterion) {
    c.bench_function("build 64 replicas", |b| {
        b.iter(|| {
            let engine = Replicated::with_capacity(64, vec![0u64; 256]).unwrap();
            for slot in 0..64 {
                black_box(engine.get_at_slot(slot).unwrap());
            }
        })
    });
}

criterion_group!(benches, bench_lookup, bench_merge, bench_lazy_build);
criterion_main!(benches);
