//! Throughput Benchmark for jsonkv
//!
//! This benchmark measures the performance of the storage engine
//! under various workloads.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use jsonkv::storage::{Engine, EngineOptions};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

fn encrypted_engine(dir: &std::path::Path) -> Engine {
    Engine::with_options(
        EngineOptions::default()
            .with_encryption_key(KEY.to_vec())
            .with_dump_dir(dir),
    )
    .unwrap()
}

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(Engine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_text", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine.set(&format!("key:{}", i), "small_value").unwrap();
            i += 1;
        });
    });

    group.bench_function("set_json_text", |b| {
        let mut i = 0u64;
        let value = r#"{"name": "John", "tags": ["a", "b"], "age": 30}"#;
        b.iter(|| {
            engine.set(&format!("doc:{}", i), value).unwrap();
            i += 1;
        });
    });

    group.bench_function("set_structured", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine
                .set(&format!("obj:{}", i), json!({ "id": i, "name": "John" }))
                .unwrap();
            i += 1;
        });
    });

    group.bench_function("set_encrypted", |b| {
        let dir = tempfile::tempdir().unwrap();
        let engine = encrypted_engine(dir.path());
        let mut i = 0u64;
        let value = "x".repeat(1024); // 1KB value
        b.iter(|| {
            engine.set(&format!("key:{}", i), value.as_str()).unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let engine = Arc::new(Engine::new());

    // Pre-populate with data
    for i in 0..100_000 {
        engine
            .set(&format!("key:{}", i), format!("value:{}", i))
            .unwrap();
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get(&format!("key:{}", i % 100_000)).ok());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get(&format!("missing:{}", i)).ok());
            i += 1;
        });
    });

    group.bench_function("get_encrypted", |b| {
        let dir = tempfile::tempdir().unwrap();
        let engine = encrypted_engine(dir.path());
        for i in 0..10_000 {
            engine.set(&format!("key:{}", i), "value").unwrap();
        }
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.get(&format!("key:{}", i % 10_000)).ok());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let engine = Arc::new(Engine::new());

    // Pre-populate
    for i in 0..10_000 {
        engine
            .set(&format!("key:{}", i), format!("value:{}", i))
            .unwrap();
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                // 20% writes
                engine.set(&format!("new:{}", i), "value").unwrap();
            } else {
                // 80% reads
                black_box(engine.get(&format!("key:{}", i % 10_000)).ok());
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let engine = Arc::new(Engine::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{}:{}", t, i);
                            engine.set(&key, "value").unwrap();
                            let _ = engine.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(engine.len());
        });
    });

    group.finish();
}

/// Benchmark TTL operations
fn bench_expiry(c: &mut Criterion) {
    let engine = Arc::new(Engine::new());

    let mut group = c.benchmark_group("expiry");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine
                .set_with_ttl(&format!("key:{}", i), "value", Duration::from_secs(3600))
                .unwrap();
            i += 1;
        });
    });

    group.bench_function("ttl_lookup", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.ttl(&format!("key:{}", i % 1_000)));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark pattern scans
fn bench_pattern(c: &mut Criterion) {
    let engine = Arc::new(Engine::new());

    // Pre-populate with various key patterns
    for i in 0..1_000 {
        engine.set(&format!("user:{}", i), "user_data").unwrap();
        engine.set(&format!("session:{}", i), "session_data").unwrap();
        engine.set(&format!("cache:{}", i), "cache_data").unwrap();
    }

    let mut group = c.benchmark_group("pattern");

    group.bench_function("prefix", |b| {
        b.iter(|| {
            black_box(engine.get_by_pattern("user:*").unwrap());
        });
    });

    group.bench_function("single_char", |b| {
        b.iter(|| {
            black_box(engine.get_by_pattern("user:?").unwrap());
        });
    });

    group.bench_function("all", |b| {
        b.iter(|| {
            black_box(engine.get_by_pattern("*").unwrap());
        });
    });

    group.finish();
}

/// Benchmark snapshot dumps
fn bench_dump(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let engine =
        Engine::with_options(EngineOptions::default().with_dump_dir(dir.path())).unwrap();

    for i in 0..10_000 {
        engine
            .set(&format!("user:{}", i), json!({ "id": i, "name": "John" }))
            .unwrap();
    }

    let mut group = c.benchmark_group("snapshot");
    group.sample_size(20);

    group.bench_function("dump_10k", |b| {
        b.iter(|| {
            black_box(engine.dump_to_disk().unwrap());
        });
    });

    group.bench_function("restore_10k", |b| {
        engine.dump_to_disk().unwrap();
        b.iter(|| {
            black_box(engine.restore_from_disk().unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_mixed,
    bench_concurrent,
    bench_expiry,
    bench_pattern,
    bench_dump,
);

criterion_main!(benches);
