//! Benchmarks for chunk planning.
//!
//! Tests:
//! - Sample-based split vs. measuring the whole batch as Parquet
//! - Record generation throughput per table

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use synth_records::{FakeRecordSource, ParentRefs, Record, RecordSource, TableKind};
use synthgen::chunker::{Chunker, ChunkerConfig, SizeProbe};
use synthgen::parquet::ParquetWriter;

fn users(n: u64) -> Vec<Record> {
    let ids: Vec<u64> = (1..=n).collect();
    FakeRecordSource::new(42).generate(TableKind::Users, &ids, &ParentRefs::new())
}

/// Sampled split against a real Parquet probe
fn bench_sampled_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampled_split");
    group.sample_size(10);

    let writer = ParquetWriter::new();
    let config = ChunkerConfig::with_limit_mb(Some(1));

    for row_count in [1_000u64, 10_000, 50_000] {
        let rows = users(row_count);
        group.throughput(Throughput::Elements(row_count));
        group.bench_with_input(
            BenchmarkId::new("users", format!("{}_rows", row_count)),
            &rows,
            |b, rows| {
                b.iter(|| {
                    let chunks = Chunker::new(&writer, config)
                        .split(TableKind::Users, black_box(rows))
                        .unwrap();
                    black_box(chunks.len())
                })
            },
        );
    }

    group.finish();
}

/// Full serialization of the batch, the cost sampling avoids
fn bench_full_measure(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_measure");
    group.sample_size(10);

    let writer = ParquetWriter::new();

    for row_count in [1_000u64, 10_000, 50_000] {
        let rows = users(row_count);
        group.throughput(Throughput::Elements(row_count));
        group.bench_with_input(
            BenchmarkId::new("users", format!("{}_rows", row_count)),
            &rows,
            |b, rows| b.iter(|| black_box(writer.measure(TableKind::Users, rows).unwrap())),
        );
    }

    group.finish();
}

/// Fake record generation throughput
fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    let row_count = 10_000u64;
    let ids: Vec<u64> = (1..=row_count).collect();
    let mut parents = ParentRefs::new();
    parents.insert(TableKind::Users, (1..=1_000).collect());
    parents.insert(TableKind::Products, (1..=500).collect());

    group.throughput(Throughput::Elements(row_count));
    for table in TableKind::ALL {
        group.bench_function(table.name(), |b| {
            let mut source = FakeRecordSource::new(7);
            b.iter(|| black_box(source.generate(table, &ids, &parents).len()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sampled_split, bench_full_measure, bench_generate);
criterion_main!(benches);
