use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use stratadb::{BlockId, StorageConfig, StorageEngine};

fn create_engine(pool_size: usize) -> Arc<StorageEngine> {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = StorageEngine::new(
        dir.path().join("db"),
        StorageConfig {
            pool_size,
            ..StorageConfig::default()
        },
    )
    .unwrap();
    // Keep the backing directory alive for the duration of the run.
    std::mem::forget(dir);
    Arc::new(engine)
}

fn buffer_pool_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("BufferPool");

    for size in [8usize, 64] {
        group.bench_with_input(
            BenchmarkId::new("sequential_pin", size),
            &size,
            |b, &size| {
                let engine = create_engine(size);
                let bm = engine.buffer_manager();
                // Twice the pool's worth of blocks, so half the pins
                // have to evict.
                b.iter(|| {
                    for n in 0..(2 * size) as i64 {
                        let blk = BlockId::new("benchfile", n);
                        let handle = bm.pin(&blk).unwrap();
                        let _ = handle.read().contents().get_int(0).unwrap();
                        bm.unpin(&handle);
                    }
                });
            },
        );
    }

    group.bench_function("transactional_set_int", |b| {
        let engine = create_engine(16);
        let blk = BlockId::new("benchfile", 0);
        b.iter(|| {
            let mut tx = engine.new_transaction().unwrap();
            tx.pin(&blk).unwrap();
            tx.set_int(&blk, 0, 7).unwrap();
            tx.commit().unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, buffer_pool_benchmark);
criterion_main!(benches);
