//! Example: filling a histogram from several threads, then merging.
//!
//! Run with `RUST_LOG=replica_kit=debug` to see slot assignment and merges.

use rand::Rng;
use replica_kit::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Per-thread histograms ===\n");

    let workers = replica_kit::available_parallelism_or_one().min(8);
    let latencies = Replicated::from_fn(|| Histogram::new("latency_ms", 20, 0.0, 200.0));
    let samples = Replicated::new(Counter::new());

    std::thread::scope(|s| {
        for worker in 0..workers {
            let latencies = &latencies;
            let samples = &samples;
            s.spawn(move || {
                // Fetch both handles once; the loop only touches private state.
                let hist = latencies.get().unwrap();
                let count = samples.get().unwrap();
                let mut rng = rand::thread_rng();
                for _ in 0..10_000 {
                    let ms: f64 = rng.gen_range(0.0..250.0);
                    hist.lock().fill(ms);
                    count.lock().increment();
                }
                println!("worker {worker} done");
            });
        }
    });

    let snapshot = latencies.snapshot_merge().into_inner();
    println!("\nSnapshot: {} entries, mean {:.1} ms", snapshot.entries(), snapshot.mean());

    let total = latencies.merge().into_inner();
    let total = total.lock();
    println!("Merged:   {} entries, overflow {}", total.entries(), total.overflow());
    for bin in 0..total.bins() {
        println!("  bin {bin:>2}: {}", total.bin(bin));
    }

    // A second one-shot merge is refused and logged.
    let again = latencies.merge();
    println!("\nSecond merge refused: {}", again.is_already_merged());

    let counted = samples.merge().into_inner();
    println!("Samples counted: {}", counted.lock().value());
}
