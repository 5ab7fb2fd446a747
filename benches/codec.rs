//! Micro-benchmarks for the wire codec.
//!
//! Uses Criterion for statistically rigorous measurement with regression
//! detection and HTML reports.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench codec              # run all codec benchmarks
//! cargo bench --bench codec -- summary   # filter by name
//! ```
//!
//! Reports are generated in `target/criterion/report/index.html`.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use sstable_codec::encoding::{
    decode_from_slice, encode_to_vec, DiskArray, DiskHash, DiskString,
};
use sstable_codec::format::{
    EstimatedHistogram, Filter, HistogramElement, IndexEntry, ReplayPosition, StatsMetadata,
    StreamingHistogram, Summary, SummaryEntry, SummaryHeader,
};
use sstable_codec::stream::MemoryReader;

// ------------------------------------------------------------------------------------------------
// Fixtures
// ------------------------------------------------------------------------------------------------

fn sample_filter(buckets: usize) -> Filter {
    Filter {
        hashes: 5,
        buckets: DiskArray::new((0..buckets as u64).map(|i| i.wrapping_mul(0x9E37)).collect()),
    }
}

fn sample_stats() -> StatsMetadata {
    let mut drop_time = DiskHash::new();
    for i in 0..100 {
        drop_time.insert(1_400_000_000.0 + i as f64, i);
    }
    let histogram = EstimatedHistogram {
        elements: DiskArray::new(
            (0..90)
                .map(|i| HistogramElement {
                    offset: 1 << (i % 40),
                    bucket: i,
                })
                .collect(),
        ),
    };
    StatsMetadata {
        estimated_row_size: histogram.clone(),
        estimated_column_count: histogram,
        position: ReplayPosition {
            segment: 9,
            position: 4096,
        },
        min_timestamp: 1,
        max_timestamp: u64::MAX / 2,
        max_local_deletion_time: u32::MAX,
        compression_ratio: 0.42,
        estimated_tombstone_drop_time: StreamingHistogram {
            max_bin_size: 100,
            hash: drop_time,
        },
        sstable_level: 3,
        repaired_at: 0,
        min_column_names: DiskArray::new(vec![DiskString::from("a")]),
        max_column_names: DiskArray::new(vec![DiskString::from("zz")]),
        has_legacy_counter_shards: false,
    }
}

fn sample_summary(entries: usize) -> Summary {
    Summary {
        header: SummaryHeader {
            min_index_interval: 128,
            size: 0,
            memory_size: 0,
            sampling_level: 128,
            size_at_full_sampling: entries as u32,
        },
        entries: (0..entries)
            .map(|i| SummaryEntry {
                key: format!("key-{i:012}").into_bytes(),
                position: i as u64 * 64,
            })
            .collect(),
        first_key: b"key-000000000000".as_slice().into(),
        last_key: b"key-999999999999".as_slice().into(),
    }
}

// ------------------------------------------------------------------------------------------------
// Benchmarks
// ------------------------------------------------------------------------------------------------

fn bench_filter(c: &mut Criterion) {
    let filter = sample_filter(4096);
    let bytes = encode_to_vec(&filter).unwrap();

    let mut group = c.benchmark_group("filter");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("encode", |b| {
        b.iter(|| encode_to_vec(black_box(&filter)).unwrap())
    });
    group.bench_function("decode", |b| {
        b.iter(|| decode_from_slice::<Filter>(black_box(&bytes)).unwrap())
    });
    group.finish();
}

fn bench_stats_metadata(c: &mut Criterion) {
    let stats = sample_stats();
    let bytes = encode_to_vec(&stats).unwrap();

    let mut group = c.benchmark_group("stats_metadata");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("encode", |b| {
        b.iter(|| encode_to_vec(black_box(&stats)).unwrap())
    });
    group.bench_function("decode", |b| {
        b.iter(|| decode_from_slice::<StatsMetadata>(black_box(&bytes)).unwrap())
    });
    group.finish();
}

fn bench_summary(c: &mut Criterion) {
    let summary = sample_summary(2048);
    let mut bytes = Vec::new();
    summary.write_to(&mut bytes).unwrap();

    let mut group = c.benchmark_group("summary");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("write", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(bytes.len());
            black_box(&summary).write_to(&mut out).unwrap();
            out
        })
    });
    group.bench_function("read", |b| {
        b.iter(|| {
            let mut reader = MemoryReader::new(black_box(&bytes).clone());
            Summary::read(&mut reader).unwrap()
        })
    });
    group.finish();
}

fn bench_index_entries(c: &mut Criterion) {
    let entries: Vec<IndexEntry> = (0..1024)
        .map(|i| IndexEntry {
            key: DiskString::new(format!("key-{i:08}").into_bytes()),
            position: i as u64 * 512,
            promoted_index: DiskString::default(),
        })
        .collect();
    let mut bytes = Vec::new();
    for entry in &entries {
        bytes.extend_from_slice(&encode_to_vec(entry).unwrap());
    }

    let mut group = c.benchmark_group("index_entries");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("decode_1024", |b| {
        b.iter(|| {
            let mut reader = MemoryReader::new(black_box(&bytes).clone());
            let mut decoded = Vec::with_capacity(entries.len());
            for _ in 0..entries.len() {
                decoded.push(
                    <IndexEntry as sstable_codec::encoding::Decode>::decode_from(&mut reader)
                        .unwrap(),
                );
            }
            decoded
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_filter,
    bench_stats_metadata,
    bench_summary,
    bench_index_entries
);
criterion_main!(benches);
