//! Throughput benchmarks: the lock-free deduplicator vs "sample at most once
//! per interval" built on Moka and QuickCache.
//!
//! The baselines store the last sample time per key and decide with a
//! get-then-insert, which is the obvious way to get the same behavior out of
//! a general-purpose cache.
//!
//! Run with:
//!     cargo bench --bench throughput

use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use apisec_sampling::{Deduplicator, DeduplicatorBuilder, Sampler, SamplingKey, TimedSampler};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use moka::sync::Cache as MokaCache;
use quick_cache::sync::Cache as QuickCache;

/// Live-item bound of every contender.
const CAP: u64 = 4_096;

/// Operations executed per criterion iteration (hot-loop size).
const OPS: u64 = 1_000;

const INTERVAL_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Contenders
// ---------------------------------------------------------------------------

trait Decide: Send + Sync + 'static {
    fn decide(&self, key: u64) -> bool;
}

impl Decide for Deduplicator {
    fn decide(&self, key: u64) -> bool {
        self.hit(key)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

struct MokaDecider(MokaCache<u64, u64>);

impl Decide for MokaDecider {
    fn decide(&self, key: u64) -> bool {
        let now = now_secs();
        match self.0.get(&key) {
            Some(sampled) if now.saturating_sub(sampled) < INTERVAL_SECS => false,
            _ => {
                self.0.insert(key, now);
                true
            }
        }
    }
}

struct QuickDecider(QuickCache<u64, u64>);

impl Decide for QuickDecider {
    fn decide(&self, key: u64) -> bool {
        let now = now_secs();
        match self.0.get(&key) {
            Some(sampled) if now.saturating_sub(sampled) < INTERVAL_SECS => false,
            _ => {
                self.0.insert(key, now);
                true
            }
        }
    }
}

fn contenders() -> Vec<(&'static str, Arc<dyn Decide>)> {
    let dedup = DeduplicatorBuilder::new(Duration::from_secs(INTERVAL_SECS))
        .max_items(CAP as usize)
        .build_lru()
        .unwrap();
    vec![
        ("apisec", Arc::new(dedup)),
        ("moka", Arc::new(MokaDecider(MokaCache::new(CAP)))),
        ("quick_cache", Arc::new(QuickDecider(QuickCache::new(CAP as usize)))),
    ]
}

// ---------------------------------------------------------------------------
// Group 1: suppressed
// ---------------------------------------------------------------------------
// Every key was sampled already, so each call answers "skip".

fn bench_suppressed(c: &mut Criterion) {
    let mut group = c.benchmark_group("suppressed");
    group.throughput(Throughput::Elements(OPS));

    for (name, decider) in contenders() {
        for k in 1..=OPS {
            decider.decide(k);
        }
        group.bench_function(name, |b| {
            b.iter(|| {
                for k in 1..=OPS {
                    black_box(decider.decide(black_box(k)));
                }
            })
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 2: churn
// ---------------------------------------------------------------------------
// An ever-growing key space forces evictions (rebuilds for the deduplicator).

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");
    group.throughput(Throughput::Elements(OPS));

    for (name, decider) in contenders() {
        let mut next = 1u64;
        group.bench_function(name, |b| {
            b.iter(|| {
                for _ in 0..OPS {
                    black_box(decider.decide(black_box(next)));
                    next += 1;
                }
            })
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Group 3: sampler
// ---------------------------------------------------------------------------
// End-to-end cost including key hashing.

fn bench_sampler(c: &mut Criterion) {
    const ROUTES: [&str; 8] = [
        "/",
        "/login",
        "/users",
        "/users/{id}",
        "/orders",
        "/orders/{id}",
        "/health",
        "/search",
    ];

    let sampler = TimedSampler::new();
    let mut group = c.benchmark_group("sampler");
    group.throughput(Throughput::Elements(OPS));
    group.bench_function("timed", |b| {
        b.iter(|| {
            for i in 0..OPS {
                let key = SamplingKey::new("GET", ROUTES[(i % 8) as usize], 200 + (i % 3) as u16);
                black_box(sampler.decision_for(black_box(&key)));
            }
        })
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Group 4: concurrent_8t
// ---------------------------------------------------------------------------
// Eight threads over a working set twice the capacity.

fn bench_concurrent(c: &mut Criterion) {
    const THREADS: usize = 8;
    const OPS_PER_THREAD: u64 = 2_000;
    const WORKING_SET: u64 = CAP * 2;

    let mut group = c.benchmark_group("concurrent_8t");
    group.throughput(Throughput::Elements(THREADS as u64 * OPS_PER_THREAD));

    for (name, decider) in contenders() {
        group.bench_function(name, |b| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let barrier = Arc::new(Barrier::new(THREADS + 1));
                    let handles: Vec<_> = (0..THREADS)
                        .map(|t| {
                            let d = Arc::clone(&decider);
                            let bar = Arc::clone(&barrier);
                            std::thread::spawn(move || {
                                bar.wait();
                                let start = Instant::now();
                                let base = t as u64 * OPS_PER_THREAD;
                                for j in 0..OPS_PER_THREAD {
                                    let k = 1 + (base.wrapping_add(j * 7_919)) % WORKING_SET;
                                    black_box(d.decide(black_box(k)));
                                }
                                start.elapsed()
                            })
                        })
                        .collect();
                    barrier.wait();
                    let elapsed = handles.into_iter().map(|h| h.join().unwrap()).max().unwrap();
                    total += elapsed;
                }
                total
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_suppressed,
    bench_churn,
    bench_sampler,
    bench_concurrent,
);
criterion_main!(benches);
