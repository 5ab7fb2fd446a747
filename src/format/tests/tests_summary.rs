//! Summary protocol tests: the little-endian positions table, entry
//! recovery through position differences, and writer round-trips.

use crate::encoding::EncodingError;
use crate::format::summary::{Summary, SummaryEntry, SummaryHeader};
use crate::stream::MemoryReader;

/// Builds the byte image of a summary file from its parts.
///
/// The memory stream begins with the positions table, so the first entry
/// position is `4 * entries.len()`.
fn summary_bytes(
    min_index_interval: u32,
    sampling_level: u32,
    entries: &[(&[u8], u64)],
    first_key: &[u8],
    last_key: &[u8],
) -> Vec<u8> {
    let mut positions = Vec::new();
    let mut cursor = 4 * entries.len() as u32;
    for (key, _) in entries {
        positions.push(cursor);
        cursor += key.len() as u32 + 8;
    }
    let memory_size = cursor as u64;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&min_index_interval.to_be_bytes());
    bytes.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&memory_size.to_be_bytes());
    bytes.extend_from_slice(&sampling_level.to_be_bytes());
    bytes.extend_from_slice(&(entries.len() as u32).to_be_bytes()); // size_at_full_sampling
    for position in &positions {
        bytes.extend_from_slice(&position.to_le_bytes()); // native order
    }
    for (key, position) in entries {
        bytes.extend_from_slice(key);
        bytes.extend_from_slice(&position.to_be_bytes());
    }
    bytes.extend_from_slice(&(first_key.len() as u32).to_be_bytes());
    bytes.extend_from_slice(first_key);
    bytes.extend_from_slice(&(last_key.len() as u32).to_be_bytes());
    bytes.extend_from_slice(last_key);
    bytes
}

// ------------------------------------------------------------------------------------------------
// Minimal summary
// ------------------------------------------------------------------------------------------------

/// # Scenario
/// A one-entry summary: key `"k"` at index position 500, with the positions
/// table pointing just past itself (`positions = [4]`, little-endian on
/// disk).
///
/// # Expected behavior
/// - `entries == [{"k", 500}]`, recovered purely from position differences.
/// - `first_key`/`last_key` parsed after the memory stream.
/// - The positions table is not retained on the parsed value.
#[test]
fn minimal_summary() {
    let bytes = summary_bytes(128, 128, &[(b"k", 500)], b"k", b"k");

    // Fix the wire explicitly: one position, value 4, little-endian.
    assert_eq!(&bytes[24..28], &[0x04, 0x00, 0x00, 0x00]);
    // The entry body: key byte then big-endian position 500.
    assert_eq!(&bytes[28..29], b"k");
    assert_eq!(&bytes[29..37], &500u64.to_be_bytes());

    let mut reader = MemoryReader::new(bytes);
    let summary = Summary::read(&mut reader).unwrap();

    assert_eq!(summary.header.size, 1);
    assert_eq!(summary.header.memory_size, 4 + 1 + 8);
    assert_eq!(
        summary.entries,
        vec![SummaryEntry {
            key: b"k".to_vec(),
            position: 500,
        }]
    );
    assert_eq!(summary.first_key.as_bytes(), b"k");
    assert_eq!(summary.last_key.as_bytes(), b"k");
}

// ------------------------------------------------------------------------------------------------
// Positions endianness
// ------------------------------------------------------------------------------------------------

/// The positions table is the format's only little-endian datum. The same
/// numeric position serialized big-endian must parse differently (here: as a
/// giant bogus offset that fails the read).
#[test]
fn positions_are_little_endian_on_disk() {
    let mut bytes = summary_bytes(128, 128, &[(b"key-0", 0), (b"key-1", 64)], b"key-0", b"key-1");

    // positions[0] = 8 as LE; flipping it to BE makes it 0x08000000.
    assert_eq!(&bytes[24..28], &[0x08, 0x00, 0x00, 0x00]);
    bytes[24..28].copy_from_slice(&[0x00, 0x00, 0x00, 0x08]);

    let mut reader = MemoryReader::new(bytes);
    let err = Summary::read(&mut reader).unwrap_err();
    // positions[0] decoded as 0x08000000 makes the first entry span
    // backwards relative to positions[1].
    assert!(matches!(err, EncodingError::Malformed(_)));
}

#[test]
fn multi_entry_sizes_come_from_position_differences() {
    let entries: [(&[u8], u64); 3] = [
        (b"a", 0),
        (b"much-longer-key", 4096),
        (b"zz", 123_456_789),
    ];
    let bytes = summary_bytes(128, 2048, &entries, b"a", b"zz");
    let mut reader = MemoryReader::new(bytes);
    let summary = Summary::read(&mut reader).unwrap();

    assert_eq!(summary.entries.len(), 3);
    assert_eq!(summary.entries[0].key, b"a");
    assert_eq!(summary.entries[1].key, b"much-longer-key");
    assert_eq!(summary.entries[1].position, 4096);
    assert_eq!(summary.entries[2].key, b"zz");
    assert_eq!(summary.entries[2].position, 123_456_789);
    assert_eq!(summary.header.sampling_level, 2048);
}

// ------------------------------------------------------------------------------------------------
// Writer
// ------------------------------------------------------------------------------------------------

/// The writer regenerates the positions table and memory size from entry
/// sizes, so a canonical file round-trips byte-identically.
#[test]
fn write_reproduces_canonical_bytes() {
    let bytes = summary_bytes(
        128,
        128,
        &[(b"apple", 0), (b"banana", 777)],
        b"apple",
        b"banana",
    );

    let mut reader = MemoryReader::new(bytes.clone());
    let summary = Summary::read(&mut reader).unwrap();

    let mut rewritten = Vec::new();
    summary.write_to(&mut rewritten).unwrap();
    assert_eq!(rewritten, bytes);
}

#[test]
fn write_then_read_roundtrip() {
    let summary = Summary {
        header: SummaryHeader {
            min_index_interval: 128,
            size: 0,          // regenerated by the writer
            memory_size: 0,   // regenerated by the writer
            sampling_level: 128,
            size_at_full_sampling: 2,
        },
        entries: vec![
            SummaryEntry {
                key: b"first".to_vec(),
                position: 10,
            },
            SummaryEntry {
                key: b"second".to_vec(),
                position: 20,
            },
        ],
        first_key: b"first".as_slice().into(),
        last_key: b"second".as_slice().into(),
    };

    let mut bytes = Vec::new();
    summary.write_to(&mut bytes).unwrap();

    let mut reader = MemoryReader::new(bytes);
    let reread = Summary::read(&mut reader).unwrap();
    assert_eq!(reread.entries, summary.entries);
    assert_eq!(reread.first_key, summary.first_key);
    assert_eq!(reread.last_key, summary.last_key);
    assert_eq!(reread.header.size, 2);
    assert_eq!(reread.header.memory_size, 8 + (5 + 8) + (6 + 8));
}

// ------------------------------------------------------------------------------------------------
// Structural failures
// ------------------------------------------------------------------------------------------------

#[test]
fn truncated_entry_region_is_fatal() {
    let mut bytes = summary_bytes(128, 128, &[(b"k", 500)], b"k", b"k");
    // Chop the trailing keys off so the seek target for first/last is gone.
    bytes.truncate(30);
    let mut reader = MemoryReader::new(bytes);
    let err = Summary::read(&mut reader).unwrap_err();
    assert!(matches!(err, EncodingError::Stream(_)));
}

#[test]
fn entry_smaller_than_a_position_is_fatal() {
    // size = 1 with positions[0] = 4 but memory_size claiming a 2-byte
    // entry: too small to hold the trailing u64 position.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&128u32.to_be_bytes());
    bytes.extend_from_slice(&1u32.to_be_bytes());
    bytes.extend_from_slice(&6u64.to_be_bytes()); // memory_size: 4 + 2
    bytes.extend_from_slice(&128u32.to_be_bytes());
    bytes.extend_from_slice(&1u32.to_be_bytes());
    bytes.extend_from_slice(&4u32.to_le_bytes()); // positions[0]
    bytes.extend_from_slice(&[0xAB, 0xCD]); // 2-byte "entry"
    bytes.extend_from_slice(&1u32.to_be_bytes());
    bytes.push(b'k');
    bytes.extend_from_slice(&1u32.to_be_bytes());
    bytes.push(b'k');

    let mut reader = MemoryReader::new(bytes);
    let err = Summary::read(&mut reader).unwrap_err();
    assert!(matches!(err, EncodingError::Malformed(_)));
}
