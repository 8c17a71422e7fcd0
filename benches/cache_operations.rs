//! Benchmarks for basic cache operations: local-tier hit, shared-tier hit
//! with promotion, and full-miss-through-loader, at a few payload sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tierwise::{CacheEngineBuilder, CacheEngineConfig, CoreEngine, InMemorySharedTier, JsonCodec};
use tokio::runtime::Runtime;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Payload {
    data: String,
}

fn payload(size_bytes: usize) -> Payload {
    Payload {
        data: "x".repeat(size_bytes),
    }
}

fn build_engine() -> Arc<CoreEngine<JsonCodec>> {
    CacheEngineBuilder::new()
        .with_shared_tier(Arc::new(InMemorySharedTier::new()))
        .with_config(CacheEngineConfig {
            shared_ttl: Duration::from_secs(300),
            ..CacheEngineConfig::default()
        })
        .build()
}

fn bench_local_hit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let engine = build_engine();

    let mut group = c.benchmark_group("local_tier_hit");
    for size in [64usize, 1024, 16 * 1024] {
        let key = format!("bench:local:{size}");
        rt.block_on(engine.get_or_load(&key, {
            let payload = payload(size);
            move || async move { Ok(Some(payload)) }
        }))
        .unwrap();
        // Let the scheduled local populate settle before timing reads.
        rt.block_on(tokio::time::sleep(Duration::from_millis(20)));

        group.bench_with_input(BenchmarkId::from_parameter(size), &key, |b, key| {
            b.iter(|| {
                rt.block_on(async {
                    let value: Option<Payload> = engine
                        .get_or_load(black_box(key), || async { panic!("should be an L1 hit") })
                        .await
                        .unwrap();
                    black_box(value)
                })
            });
        });
    }
    group.finish();
}

fn bench_full_miss(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("full_miss_through_loader", |b| {
        let engine = build_engine();
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            let key = format!("bench:miss:{counter}");
            rt.block_on(async {
                let value: Option<Payload> = engine
                    .get_or_load(black_box(&key), || async { Ok(Some(payload(256))) })
                    .await
                    .unwrap();
                black_box(value)
            })
        });
    });
}

criterion_group!(benches, bench_local_hit, bench_full_miss);
criterion_main!(benches);
