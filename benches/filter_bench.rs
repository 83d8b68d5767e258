//! Insert and lookup throughput for Bloom filters over memory and file storage.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use password_filters::hash::bit_index;
use password_filters::{
    populate_options, BloomFilter, BloomOptions, BufferAllocator, FileAllocator, SetFilter,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn hashes(count: usize, seed: u64) -> Vec<[u8; 20]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.gen()).collect()
}

fn bench_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashing");
    let element = [0x5Au8; 20];

    for m in [1u64 << 10, 1 << 33, (1 << 53) - 1] {
        group.bench_with_input(BenchmarkId::new("bit_index", m), &m, |b, &m| {
            b.iter(|| black_box(bit_index(black_box(&element), 0, m)))
        });
    }

    group.finish();
}

fn bench_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory");

    for count in [1_000usize, 10_000, 100_000] {
        let elements = hashes(count, 1);
        let probes = hashes(count, 2);
        let options = BloomOptions::new().n(count as u64).epsilon(0.01);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("add", count), &elements, |b, elements| {
            b.iter(|| {
                let mut filter = BloomFilter::create(&options, &BufferAllocator).unwrap();
                for element in elements {
                    filter.add(element).unwrap();
                }
                black_box(filter.n())
            })
        });

        let mut filter = BloomFilter::create(&options, &BufferAllocator).unwrap();
        for element in &elements {
            filter.add(element).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("has", count), &probes, |b, probes| {
            b.iter(|| {
                probes
                    .iter()
                    .filter(|probe| filter.has(&probe[..]).unwrap())
                    .count()
            })
        });

        group.bench_with_input(BenchmarkId::new("set_add", count), &elements, |b, elements| {
            b.iter(|| {
                let mut set = SetFilter::new();
                for element in elements {
                    set.add(element);
                }
                black_box(set.len())
            })
        });
    }

    group.finish();
}

fn bench_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("file");
    group.sample_size(10);

    let dir = tempfile::tempdir().unwrap();
    let count = 10_000usize;
    let elements = hashes(count, 3);
    let options = BloomOptions::new().n(count as u64).epsilon(0.01);

    group.throughput(Throughput::Elements(count as u64));
    let mut round = 0u32;
    group.bench_function("add", |b| {
        b.iter(|| {
            round += 1;
            let path = dir.path().join(format!("bench-{}.filter", round));
            let mut filter = BloomFilter::create(&options, &FileAllocator::new(&path)).unwrap();
            for element in &elements {
                filter.add(element).unwrap();
            }
            black_box(filter.n())
        })
    });

    let path = dir.path().join("lookup.filter");
    let mut filter = BloomFilter::create(&options, &FileAllocator::new(&path)).unwrap();
    for element in &elements {
        filter.add(element).unwrap();
    }
    let probes = hashes(count, 4);
    group.bench_function("has", |b| {
        b.iter(|| {
            probes
                .iter()
                .filter(|probe| filter.has(&probe[..]).unwrap())
                .count()
        })
    });

    group.finish();
}

fn bench_params(c: &mut Criterion) {
    let mut group = c.benchmark_group("params");

    group.bench_function("n_epsilon", |b| {
        let options = BloomOptions::new().n(1_000_000_000).epsilon(0.001);
        b.iter(|| black_box(populate_options(black_box(&options)).unwrap()))
    });
    group.bench_function("m_epsilon", |b| {
        let options = BloomOptions::new().m(1 << 40).epsilon(0.001);
        b.iter(|| black_box(populate_options(black_box(&options)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_hashing, bench_memory, bench_file, bench_params);
criterion_main!(benches);
