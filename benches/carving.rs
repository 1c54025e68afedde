//! Carver throughput benchmark.

use std::io::Write;
use std::sync::atomic::AtomicBool;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use argos_recover::infrastructure::block_source::MmapBlockSource;
use argos_recover::infrastructure::carver::{carve, CarveOptions};

fn make_source_with_scattered_jpegs(size: usize, count: usize) -> (tempfile::NamedTempFile, MmapBlockSource) {
    let mut data = vec![0u8; size];
    let spacing = size / (count + 1);
    for i in 0..count {
        let offset = spacing * (i + 1);
        let mut jpeg = vec![0xFFu8, 0xD8, 0xFF];
        jpeg.extend(std::iter::repeat(0xAAu8).take(64 * 1024));
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        if offset + jpeg.len() < data.len() {
            data[offset..offset + jpeg.len()].copy_from_slice(&jpeg);
        }
    }

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();
    let source = MmapBlockSource::open(file.path().to_str().unwrap()).unwrap();
    (file, source)
}

fn bench_carve(c: &mut Criterion) {
    use argos_recover::domain::services::SignatureRegistry;

    let registry = SignatureRegistry::with_defaults();
    let (_file, source) = make_source_with_scattered_jpegs(64 * 1024 * 1024, 20);

    c.bench_function("carve_64mib_20_jpegs", |b| {
        b.iter(|| {
            let cancel = AtomicBool::new(false);
            let mut next_id = 0u64;
            let candidates = carve(
                black_box(&source),
                &registry,
                &CarveOptions { chunk_size: 4 * 1024 * 1024, ..Default::default() },
                &cancel,
                || {
                    next_id += 1;
                    next_id
                },
                |_| {},
            )
            .unwrap();
            black_box(candidates.len())
        });
    });
}

criterion_group!(benches, bench_carve);
criterion_main!(benches);
