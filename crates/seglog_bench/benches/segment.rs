//! Segment benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use seglog_bench::{random_data, random_records};
use seglog_core::{Config, Record, Segment};
use tempfile::TempDir;

fn bench_config() -> Config {
    Config::new()
        .max_store_bytes(u64::MAX)
        .max_index_bytes(1 << 30)
}

/// Benchmark Segment append operations.
fn bench_segment_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_append");

    for size in [64, 256, 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let segment = Segment::open(temp_dir.path(), 0, bench_config()).unwrap();
            let data = random_data(size);

            b.iter(|| {
                let mut record = Record::new(data.clone());
                black_box(segment.append(black_box(&mut record)).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark random reads by offset.
fn bench_segment_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_read");
    let record_count = 10_000u64;

    group.bench_function("random_10k_records", |b| {
        let temp_dir = TempDir::new().unwrap();
        let segment = Segment::open(temp_dir.path(), 0, bench_config()).unwrap();
        for value in random_records(record_count as usize, 256) {
            segment.append(&mut Record::new(value)).unwrap();
        }

        let mut i = 0u64;
        b.iter(|| {
            // Read records in pseudo-random order
            let offset = (i * 7919) % record_count;
            black_box(segment.read(black_box(offset)).unwrap());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark reopening a segment, including recovery checks.
fn bench_segment_reopen(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_reopen");
    group.sample_size(20);

    let temp_dir = TempDir::new().unwrap();
    let segment = Segment::open(temp_dir.path(), 0, bench_config()).unwrap();
    for value in random_records(10_000, 64) {
        segment.append(&mut Record::new(value)).unwrap();
    }
    segment.close().unwrap();

    group.bench_function("10k_records", |b| {
        b.iter(|| {
            let segment = Segment::open(temp_dir.path(), 0, bench_config()).unwrap();
            black_box(segment.next_offset());
            segment.close().unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_segment_append,
    bench_segment_read,
    bench_segment_reopen
);
criterion_main!(benches);
