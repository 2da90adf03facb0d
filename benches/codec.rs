//! Codec and invocation benchmarks
//!
//! Measures envelope encode/decode and the full prepare/consume path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use deferred_call::{CallEnvelope, Codec, FunctionRegistry, MemoryStore, Preparer, TargetId};
use std::sync::Arc;

fn checksum(values: Vec<u64>, label: String) -> u64 {
    values.iter().sum::<u64>() ^ label.len() as u64
}

fn bench_encode_decode(c: &mut Criterion) {
    let codec = Codec::new();
    let mut group = c.benchmark_group("codec");

    for size in [1usize, 64, 4096] {
        let envelope = CallEnvelope::new(
            TargetId::from_name("checksum"),
            ((0..size as u64).collect::<Vec<_>>(), "label".to_string()),
        );
        let bytes = codec.encode(&envelope).unwrap();

        group.bench_with_input(BenchmarkId::new("encode", size), &envelope, |b, env| {
            b.iter(|| codec.encode(black_box(env)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| codec.decode::<(Vec<u64>, String)>(black_box(bytes)).unwrap())
        });
    }

    group.finish();
}

fn bench_prepare_consume(c: &mut Criterion) {
    let preparer = Preparer::new(Arc::new(FunctionRegistry::new()), Arc::new(MemoryStore::new()));
    let handle = preparer.registry().register("checksum", checksum).unwrap();
    let executor = preparer.executor();

    c.bench_function("prepare_consume", |b| {
        b.iter(|| {
            let prepared = preparer
                .prepare_unique(&handle, (vec![1, 2, 3], "label".to_string()))
                .unwrap();
            executor.consume(black_box(prepared.key())).unwrap()
        })
    });
}

criterion_group!(benches, bench_encode_decode, bench_prepare_consume);
criterion_main!(benches);
