//! Benchmarks for chunked digest computation

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ota_digest::prelude::*;

fn bench_chunked_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunked_digest");
    let data: Vec<u8> = (0..256 * 1024).map(|i| (i % 256) as u8).collect();

    for algorithm in DigestAlgorithm::all() {
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(
            BenchmarkId::new(algorithm.as_str(), data.len()),
            &data,
            |b, data| {
                b.iter(|| {
                    let mut digest = DigestAccumulator::new();
                    digest.start(algorithm);
                    for chunk in data.chunks(4096) {
                        digest.update(chunk).expect("Digest update failed");
                    }
                    digest.finalize().expect("Digest finalize failed")
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_chunked_digest);
criterion_main!(benches);
