//! Shared fixture builders: craft companion files on disk through the
//! format-layer writers, then point an [`SSTable`] at them.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::fmt::Subscriber;

use crate::encoding::{encode_to_vec, DiskArray, DiskString};
use crate::format::statistics::MetadataContents;
use crate::format::{
    Filter, IndexEntry, MetadataType, Statistics, StatsMetadata, Summary, SummaryEntry,
    SummaryHeader, ValidationMetadata,
};

pub const GENERATION: u64 = 7;

pub fn init_tracing() {
    let _ = Subscriber::builder()
        .with_max_level(Level::TRACE)
        .try_init();
}

pub fn component_path(dir: &Path, suffix: &str) -> PathBuf {
    dir.join(format!("la-{GENERATION}-big-{suffix}"))
}

pub fn write_component(dir: &Path, suffix: &str, bytes: &[u8]) {
    fs::write(component_path(dir, suffix), bytes).unwrap();
}

pub fn sample_summary() -> Summary {
    Summary {
        header: SummaryHeader {
            min_index_interval: 128,
            size: 0,        // regenerated on write
            memory_size: 0, // regenerated on write
            sampling_level: 128,
            size_at_full_sampling: 2,
        },
        entries: vec![
            SummaryEntry {
                key: b"apple".to_vec(),
                position: 0,
            },
            SummaryEntry {
                key: b"melon".to_vec(),
                position: 57,
            },
        ],
        first_key: b"apple".as_slice().into(),
        last_key: b"zucchini".as_slice().into(),
    }
}

pub fn sample_statistics() -> Statistics {
    let mut statistics = Statistics::default();
    statistics.contents.insert(
        MetadataType::Validation,
        MetadataContents::Validation(ValidationMetadata {
            partitioner: DiskString::from("org.apache.cassandra.dht.Murmur3Partitioner"),
            filter_chance: 0.01,
        }),
    );
    statistics.contents.insert(
        MetadataType::Stats,
        MetadataContents::Stats(StatsMetadata {
            min_timestamp: 100,
            max_timestamp: 900,
            sstable_level: 1,
            ..StatsMetadata::default()
        }),
    );
    statistics
}

pub fn sample_filter() -> Filter {
    Filter {
        hashes: 5,
        buckets: DiskArray::new(vec![0xDEAD_BEEF, 0x0BAD_F00D]),
    }
}

pub fn sample_index_entries(count: usize) -> Vec<IndexEntry> {
    (0..count)
        .map(|i| IndexEntry {
            key: DiskString::new(format!("key-{i:04}").into_bytes()),
            position: (i as u64) * 64,
            promoted_index: DiskString::default(),
        })
        .collect()
}

pub fn index_file_bytes(entries: &[IndexEntry]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for entry in entries {
        bytes.extend_from_slice(&encode_to_vec(entry).unwrap());
    }
    bytes
}

/// Lays down a complete uncompressed table: TOC, Statistics, Summary,
/// Filter, Index (7 entries), and a small Data file.
pub fn basic_table_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();

    write_component(
        dir,
        "TOC.txt",
        b"Index.db\nData.db\nTOC.txt\nSummary.db\nFilter.db\nStatistics.db\n",
    );

    let mut statistics_bytes = Vec::new();
    sample_statistics().write_to(&mut statistics_bytes).unwrap();
    write_component(dir, "Statistics.db", &statistics_bytes);

    let mut summary_bytes = Vec::new();
    sample_summary().write_to(&mut summary_bytes).unwrap();
    write_component(dir, "Summary.db", &summary_bytes);

    write_component(
        dir,
        "Filter.db",
        &encode_to_vec(&sample_filter()).unwrap(),
    );

    write_component(
        dir,
        "Index.db",
        &index_file_bytes(&sample_index_entries(7)),
    );

    write_component(dir, "Data.db", b"row data payload bytes");

    tmp
}
