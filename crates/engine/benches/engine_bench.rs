use config::EngineConfig;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine::Engine;
use tempfile::{tempdir, TempDir};

const N_KEYS: usize = 10_000;
const VALUE_SIZE: usize = 100;

fn open_engine(flush_threshold: usize, compaction_trigger: usize) -> (TempDir, Engine) {
    let dir = tempdir().unwrap();
    let config = EngineConfig::builder()
        .dir(dir.path())
        .flush_threshold(flush_threshold)
        .compaction_trigger(compaction_trigger)
        .build()
        .unwrap();
    let engine = Engine::open(config).unwrap();
    (dir, engine)
}

fn fill(engine: &Engine) {
    for i in 0..N_KEYS {
        engine
            .put(format!("key{:06}", i).into_bytes(), vec![b'x'; VALUE_SIZE])
            .unwrap();
    }
}

fn engine_put_benchmark(c: &mut Criterion) {
    c.bench_function("engine_put_10k", |b| {
        b.iter_batched(
            || open_engine(64 * 1024, 8),
            |(_dir, engine)| fill(&engine),
            BatchSize::SmallInput,
        );
    });
}

fn engine_scan_memtable_benchmark(c: &mut Criterion) {
    let (_dir, engine) = open_engine(usize::MAX, 0);
    fill(&engine);

    c.bench_function("engine_scan_memtable_10k", |b| {
        b.iter(|| {
            let n = engine.scan(b"").unwrap().count();
            assert_eq!(n, N_KEYS);
        });
    });
}

fn engine_scan_tables_benchmark(c: &mut Criterion) {
    // Small threshold: the data ends up spread over many tables.
    let (_dir, engine) = open_engine(32 * 1024, 0);
    fill(&engine);
    engine.flush().unwrap();

    c.bench_function("engine_scan_tables_10k", |b| {
        b.iter(|| {
            let n = engine.scan(b"").unwrap().count();
            assert_eq!(n, N_KEYS);
        });
    });
}

fn engine_compact_benchmark(c: &mut Criterion) {
    c.bench_function("engine_compact_10k", |b| {
        b.iter_batched(
            || {
                let (dir, engine) = open_engine(32 * 1024, 0);
                fill(&engine);
                (dir, engine)
            },
            |(_dir, engine)| engine.compact().unwrap(),
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    engine_put_benchmark,
    engine_scan_memtable_benchmark,
    engine_scan_tables_benchmark,
    engine_compact_benchmark
);
criterion_main!(benches);
