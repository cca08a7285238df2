//! Performance benchmarks for SegmentLiftover
//!
//! Run with: cargo bench
//!
//! Uses an in-process engine so results measure the pipeline, not liftOver.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segment_liftover::core::{
    Chrom, EndpointLifter, PointQuery, RemapCache, RemapEntry, RemapKey, RemapSettings,
    TranslatedPoint, TranslationResult, TranslationService,
};
use segment_liftover::formats::{RecordConverter, SegmentConverter, Table};
use std::path::Path;

/// Shifts positions by 1kb and drops every position in a 1kb window per 100kb
struct WindowEngine;

impl TranslationService for WindowEngine {
    fn translate(&self, queries: &[PointQuery]) -> TranslationResult<Vec<TranslatedPoint>> {
        Ok(queries
            .iter()
            .filter(|q| q.position % 100_000 >= 1_000)
            .map(|q| TranslatedPoint::new(q.id, q.chrom.ucsc_name(), q.position + 1_000))
            .collect())
    }
}

fn segment_table(rows: usize) -> Table {
    let header = ["sample_id", "chromosome", "start", "stop", "mean"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows = (0..rows)
        .map(|i| {
            let start = i as u64 * 37_000;
            vec![
                format!("s{}", i % 17),
                ((i % 22) + 1).to_string(),
                start.to_string(),
                (start + 20_000).to_string(),
                format!("{:.3}", i as f64 / 7.0),
            ]
        })
        .collect();
    Table::new(header, rows)
}

/// Benchmark candidate generation for the default search window
fn bench_candidates(c: &mut Criterion) {
    let settings = RemapSettings::default();
    c.bench_function("remap_candidates", |b| {
        b.iter(|| black_box(settings.candidates(black_box(1_000_000))))
    });
}

/// Benchmark cache lookups on a warm cache
fn bench_cache_lookup(c: &mut Criterion) {
    let chrom = Chrom::autosome(1).unwrap();
    let mut group = c.benchmark_group("cache_lookup");

    for size in [1_000usize, 100_000].iter() {
        let cache = RemapCache::new();
        for i in 0..*size as u64 {
            cache.insert(
                RemapKey::new(chrom, i * 10),
                RemapEntry::Mapped {
                    chrom,
                    position: i * 10 + 5,
                },
            );
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let key = RemapKey::new(chrom, (size as u64 / 2) * 10);
            b.iter(|| black_box(cache.get(black_box(&key))))
        });
    }

    group.finish();
}

/// Benchmark segment conversion of in-memory tables, fallback included
fn bench_segment_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_conversion");

    for size in [100usize, 10_000].iter() {
        let table = segment_table(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &table, |b, table| {
            b.iter(|| {
                let cache = RemapCache::new();
                let lifter =
                    EndpointLifter::new(&WindowEngine, &cache, RemapSettings::default(), true);
                let result = SegmentConverter::default()
                    .convert_table(table.clone(), &lifter, Path::new("bench.tab"))
                    .unwrap();
                black_box(result.counts)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_candidates,
    bench_cache_lookup,
    bench_segment_conversion,
);

criterion_main!(benches);
