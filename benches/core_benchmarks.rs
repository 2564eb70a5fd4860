//! Criterion micro-benchmarks for vectorlake CPU-bound hot paths.
//!
//! Run all:     `cargo bench`
//! Run subset:  `cargo bench -- search`
//! Save baseline: `cargo bench -- --save-baseline base`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use vectorlake::codec::{self, Dataset};
use vectorlake::index::native::distance::squared_l2;
use vectorlake::index::native::flat::FlatIndex;
use vectorlake::index::native::hnsw::HnswIndex;
use vectorlake::index::native::ivf::IvfFlatIndex;
use vectorlake::index::native::pq::PqIndex;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn random_dataset(n: usize, dim: usize) -> Dataset {
    let mut rng = rand::thread_rng();
    let values = (0..n * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Dataset::new(dim, values).unwrap()
}

fn random_vector(dim: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

// ---------------------------------------------------------------------------
// 1. Distance
// ---------------------------------------------------------------------------

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance");

    for &dim in &[32, 128, 256, 768, 1536] {
        let a = random_vector(dim);
        let b = random_vector(dim);

        group.throughput(Throughput::Elements(dim as u64));
        group.bench_with_input(BenchmarkId::new("squared_l2", dim), &dim, |bench, _| {
            bench.iter(|| squared_l2(black_box(&a), black_box(&b)));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. Codec
// ---------------------------------------------------------------------------

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for &(n, dim) in &[(1_000, 128), (10_000, 128), (1_000, 768)] {
        let payload = codec::encode(&random_dataset(n, dim)).unwrap();
        let label = format!("{n}x{dim}");

        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(BenchmarkId::new("decode", &label), &payload, |bench, payload| {
            bench.iter(|| codec::decode(black_box(payload)).unwrap());
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 3. Search
// ---------------------------------------------------------------------------

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    let dim = 128;
    let data = random_dataset(10_000, dim);
    let query = random_vector(dim);

    let mut flat = FlatIndex::new(dim);
    flat.add(&data);
    group.bench_function("flat_10k", |bench| {
        bench.iter(|| flat.search(black_box(&query), 10));
    });

    let mut ivf = IvfFlatIndex::new(dim, 100, 10, 10, 1e-4).unwrap();
    ivf.train(&data).unwrap();
    ivf.add(&data).unwrap();
    group.bench_function("ivf_flat_10k_nprobe10", |bench| {
        bench.iter(|| ivf.search(black_box(&query), 10));
    });

    let mut pq = PqIndex::new(dim, 16, 8, 10, 1e-4).unwrap();
    pq.train(&data).unwrap();
    pq.add(&data).unwrap();
    group.bench_function("pq_10k_m16", |bench| {
        bench.iter(|| pq.search(black_box(&query), 10));
    });

    let mut hnsw = HnswIndex::new(dim, 16, 64, 100).unwrap();
    hnsw.add(&random_dataset(2_000, dim)).unwrap();
    group.bench_function("hnsw_2k", |bench| {
        bench.iter(|| hnsw.search(black_box(&query), 10));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_distance, bench_codec, bench_search);

criterion_main!(benches);
