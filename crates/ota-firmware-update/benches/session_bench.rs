//! Benchmarks for a complete in-memory update session

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ota_firmware_update::prelude::*;

fn callbacks() -> HandlerCallbacks {
    HandlerCallbacks::builder()
        .request_chunk(|_| true)
        .report_status(|_, _| true)
        .finish(|| true)
        .build()
}

fn bench_full_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_session");
    let image: Vec<u8> = (0..512 * 1024).map(|i| (i % 251) as u8).collect();
    let digest = compute_digest(DigestAlgorithm::Sha256, DigestEncoding::Hex, &image);

    for chunk_size in [1024usize, 4096, 16384] {
        let config = UpdateConfig::builder()
            .chunk_size(chunk_size)
            .build()
            .expect("Invalid benchmark configuration");
        group.throughput(Throughput::Bytes(image.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &image,
            |b, image| {
                b.iter(|| {
                    let mut handler = OtaHandler::new(callbacks());
                    let descriptor = UpdateDescriptor::builder(image.len(), "SHA256", digest.clone())
                        .config(config.clone())
                        .storage(MemoryStorage::with_capacity(image.len()))
                        .build();
                    handler.start(descriptor);
                    let mut chunks = image.chunks(chunk_size);
                    for index in 0..=(image.len() / chunk_size) {
                        handler.process_chunk(index as u32, chunks.next().unwrap_or_default());
                    }
                    assert!(!handler.is_active());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_full_session);
criterion_main!(benches);
