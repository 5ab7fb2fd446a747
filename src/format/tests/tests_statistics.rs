//! Statistics dispatcher tests: tag→offset map, body dispatch by tag, and
//! the skip-and-warn path for unknown tags.

use crate::encoding::{encode_to_vec, DiskArray, DiskString};
use crate::format::statistics::{MetadataContents, Statistics};
use crate::format::{CompactionMetadata, MetadataType, StatsMetadata, ValidationMetadata};
use crate::stream::MemoryReader;

fn validation_body() -> ValidationMetadata {
    ValidationMetadata {
        partitioner: DiskString::from("org.apache.cassandra.dht.Murmur3Partitioner"),
        filter_chance: 0.1,
    }
}

fn compaction_body() -> CompactionMetadata {
    CompactionMetadata {
        ancestors: DiskArray::new(vec![1, 2]),
        cardinality: DiskArray::new(vec![0xAA]),
    }
}

/// Serializes a statistics file whose map lists `(tag, body_bytes)` in the
/// given order. Offsets are absolute, bodies land after the map.
fn statistics_bytes(entries: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let map_len = 4 + 8 * entries.len() as u32;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    let mut offset = map_len;
    for (tag, body) in entries {
        bytes.extend_from_slice(&tag.to_be_bytes());
        bytes.extend_from_slice(&offset.to_be_bytes());
        offset += body.len() as u32;
    }
    for (_, body) in entries {
        bytes.extend_from_slice(body);
    }
    bytes
}

// ------------------------------------------------------------------------------------------------
// Dispatch
// ------------------------------------------------------------------------------------------------

#[test]
fn known_tags_dispatch_to_typed_bodies() {
    let validation = validation_body();
    let compaction = compaction_body();
    let bytes = statistics_bytes(&[
        (0, encode_to_vec(&validation).unwrap()),
        (1, encode_to_vec(&compaction).unwrap()),
    ]);

    let mut reader = MemoryReader::new(bytes);
    let statistics = Statistics::read(&mut reader).unwrap();

    assert_eq!(statistics.contents.len(), 2);
    assert_eq!(
        statistics.contents.get(&MetadataType::Validation),
        Some(&MetadataContents::Validation(validation))
    );
    assert_eq!(
        statistics.contents.get(&MetadataType::Compaction),
        Some(&MetadataContents::Compaction(compaction))
    );
    assert_eq!(statistics.contents.get(&MetadataType::Stats), None);
}

/// # Scenario
/// A statistics file carrying Validation, Stats, and an unknown tag 99.
///
/// # Expected behavior
/// Load succeeds, the two known bodies are dispatched, and tag 99 yields no
/// contents entry — it is logged at warn level and skipped, with no body
/// read and no error surfaced.
#[test]
fn unknown_tag_is_skipped_without_error() {
    let validation = validation_body();
    let stats = StatsMetadata::default();
    let bytes = statistics_bytes(&[
        (0, encode_to_vec(&validation).unwrap()),
        (99, vec![0xDE, 0xAD, 0xBE, 0xEF]),
        (2, encode_to_vec(&stats).unwrap()),
    ]);

    let mut reader = MemoryReader::new(bytes);
    let statistics = Statistics::read(&mut reader).unwrap();

    assert_eq!(statistics.contents.len(), 2);
    assert!(statistics.contents.contains_key(&MetadataType::Validation));
    assert!(statistics.contents.contains_key(&MetadataType::Stats));
    // The raw map still records the unknown entry.
    assert!(statistics.hash.get(&99).is_some());
}

#[test]
fn bodies_are_found_through_offsets_not_adjacency() {
    // List the map entries in reverse tag order; each body must still be
    // located through its recorded offset.
    let validation = validation_body();
    let compaction = compaction_body();
    let bytes = statistics_bytes(&[
        (1, encode_to_vec(&compaction).unwrap()),
        (0, encode_to_vec(&validation).unwrap()),
    ]);

    let mut reader = MemoryReader::new(bytes);
    let statistics = Statistics::read(&mut reader).unwrap();
    assert_eq!(
        statistics.contents.get(&MetadataType::Validation),
        Some(&MetadataContents::Validation(validation))
    );
    assert_eq!(
        statistics.contents.get(&MetadataType::Compaction),
        Some(&MetadataContents::Compaction(compaction))
    );
}

// ------------------------------------------------------------------------------------------------
// Writer
// ------------------------------------------------------------------------------------------------

#[test]
fn write_then_read_roundtrip() {
    let mut statistics = Statistics::default();
    statistics.contents.insert(
        MetadataType::Validation,
        MetadataContents::Validation(validation_body()),
    );
    statistics.contents.insert(
        MetadataType::Compaction,
        MetadataContents::Compaction(compaction_body()),
    );
    statistics.contents.insert(
        MetadataType::Stats,
        MetadataContents::Stats(StatsMetadata::default()),
    );

    let mut bytes = Vec::new();
    statistics.write_to(&mut bytes).unwrap();

    let mut reader = MemoryReader::new(bytes);
    let reread = Statistics::read(&mut reader).unwrap();
    assert_eq!(reread.contents, statistics.contents);
    // Three entries in the regenerated tag→offset map, in tag order.
    let tags: Vec<u32> = reread.hash.entries().iter().map(|(k, _)| *k).collect();
    assert_eq!(tags, [0, 1, 2]);
}

#[test]
fn write_reproduces_canonical_bytes() {
    // A canonical file lists tags in ascending order with bodies packed
    // right after the map.
    let validation = validation_body();
    let stats = StatsMetadata::default();
    let bytes = statistics_bytes(&[
        (0, encode_to_vec(&validation).unwrap()),
        (2, encode_to_vec(&stats).unwrap()),
    ]);

    let mut reader = MemoryReader::new(bytes.clone());
    let statistics = Statistics::read(&mut reader).unwrap();

    let mut rewritten = Vec::new();
    statistics.write_to(&mut rewritten).unwrap();
    assert_eq!(rewritten, bytes);
}

#[test]
fn empty_statistics() {
    let bytes = statistics_bytes(&[]);
    let mut reader = MemoryReader::new(bytes);
    let statistics = Statistics::read(&mut reader).unwrap();
    assert!(statistics.contents.is_empty());
    assert!(statistics.hash.is_empty());
}
