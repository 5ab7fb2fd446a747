//! On-disk record types of the SSTable companion files.
//!
//! Every structure here is **self-describing**: it publishes one ordered
//! field list, and that list drives both parse and write
//! (see `encoding_impls.rs`). Adding, removing, or reordering a field is a
//! format change — the field order below is normative and fixed by
//! interoperability with the external ecosystem.
//!
//! Records never carry a length prefix of their own; their framing is
//! inherited from whatever shape contains them (an array counts them, a file
//! bounds them).
//!
//! Two files need more than a plain field traversal and get their own
//! submodules:
//!
//! - [`summary`] — entry sizes are recovered from an auxiliary positions
//!   table instead of being stored inline.
//! - [`statistics`] — a tag→offset map in front of concatenated
//!   heterogeneous bodies, dispatched by tag.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Submodules
// ------------------------------------------------------------------------------------------------

mod encoding_impls;
pub mod statistics;
pub mod summary;

pub use statistics::{MetadataContents, Statistics};
pub use summary::{Summary, SummaryEntry, SummaryHeader};

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::ops::{BitAnd, BitOr};

use crate::encoding::{DiskArray, DiskHash, DiskString};

// ------------------------------------------------------------------------------------------------
// Filter
// ------------------------------------------------------------------------------------------------

/// Serialized Bloom filter: hash count and raw bucket words.
///
/// The codec only transports the bits; the filter math itself lives in the
/// caller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    /// Number of hash functions.
    pub hashes: u32,

    /// Filter bit buckets.
    pub buckets: DiskArray<u32, u64>,
}

// ------------------------------------------------------------------------------------------------
// OptionEntry
// ------------------------------------------------------------------------------------------------

/// A key/value option pair, as stored in the compression parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptionEntry {
    /// Option name.
    pub key: DiskString<u16>,

    /// Option value.
    pub value: DiskString<u16>,
}

// ------------------------------------------------------------------------------------------------
// IndexEntry
// ------------------------------------------------------------------------------------------------

/// One entry of the Index file: a key, its byte position in the Data file,
/// and the opaque per-partition promoted index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexEntry {
    /// Partition key bytes.
    pub key: DiskString<u16>,

    /// Byte position of the partition in the Data file.
    pub position: u64,

    /// Opaque promoted-index blob; not interpreted by the codec.
    pub promoted_index: DiskString<u32>,
}

// ------------------------------------------------------------------------------------------------
// ReplayPosition
// ------------------------------------------------------------------------------------------------

/// Pointer into the write-ahead log stream: segment id and byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayPosition {
    /// Log segment identifier.
    pub segment: u64,

    /// Byte offset within the segment.
    pub position: u32,
}

// ------------------------------------------------------------------------------------------------
// EstimatedHistogram
// ------------------------------------------------------------------------------------------------

/// One bucket of an [`EstimatedHistogram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistogramElement {
    /// Upper bound of the bucket.
    pub offset: u64,

    /// Sample count in the bucket.
    pub bucket: u64,
}

/// Fixed-bucket histogram of estimated sizes or counts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EstimatedHistogram {
    /// Buckets in ascending offset order.
    pub elements: DiskArray<u32, HistogramElement>,
}

// ------------------------------------------------------------------------------------------------
// StreamingHistogram
// ------------------------------------------------------------------------------------------------

/// Online bounded-size histogram maintained as value → count bins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamingHistogram {
    /// Maximum number of bins the producer maintained.
    pub max_bin_size: u32,

    /// Bin centers mapped to sample counts.
    pub hash: DiskHash<u32, f64, u64>,
}

// ------------------------------------------------------------------------------------------------
// DeletionTime
// ------------------------------------------------------------------------------------------------

/// Partition-level deletion marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeletionTime {
    /// Local deletion time, seconds since the epoch.
    pub local_deletion_time: u32,

    /// Deletion timestamp in microseconds.
    pub marked_for_delete_at: u64,
}

// ------------------------------------------------------------------------------------------------
// Statistics bodies
// ------------------------------------------------------------------------------------------------

/// Validation metadata: partitioner class name and the Bloom filter's
/// configured false-positive chance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationMetadata {
    /// Fully qualified partitioner name.
    pub partitioner: DiskString<u16>,

    /// Bloom filter false-positive chance.
    pub filter_chance: f64,
}

/// Compaction metadata: ancestor generations and the cardinality estimator
/// state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompactionMetadata {
    /// Generations this table was compacted from.
    pub ancestors: DiskArray<u32, u32>,

    /// Serialized cardinality estimator.
    pub cardinality: DiskArray<u32, u8>,
}

/// Statistics metadata: the table-wide aggregates the storage engine keeps
/// per generation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsMetadata {
    /// Row size distribution.
    pub estimated_row_size: EstimatedHistogram,

    /// Column count distribution.
    pub estimated_column_count: EstimatedHistogram,

    /// Replay position the table was flushed at.
    pub position: ReplayPosition,

    /// Smallest write timestamp in the table.
    pub min_timestamp: u64,

    /// Largest write timestamp in the table.
    pub max_timestamp: u64,

    /// Largest local deletion time in the table.
    pub max_local_deletion_time: u32,

    /// Achieved compression ratio, or -1 when uncompressed.
    pub compression_ratio: f64,

    /// Tombstone drop-time distribution.
    pub estimated_tombstone_drop_time: StreamingHistogram,

    /// Leveled-compaction level of this table.
    pub sstable_level: u32,

    /// Repair timestamp, zero when unrepaired.
    pub repaired_at: u64,

    /// Per-component minimum clustering names.
    pub min_column_names: DiskArray<u32, DiskString<u16>>,

    /// Per-component maximum clustering names.
    pub max_column_names: DiskArray<u32, DiskString<u16>>,

    /// Whether legacy counter shards may be present.
    pub has_legacy_counter_shards: bool,
}

// ------------------------------------------------------------------------------------------------
// MetadataType
// ------------------------------------------------------------------------------------------------

/// Tag selecting a statistics body type.
///
/// The numbers are found on disk, so they do matter. The underlying width is
/// `u32` — wasteful, but it keeps the enum strongly typed without a separate
/// notion of disk-size versus memory-size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum MetadataType {
    /// Validation metadata body.
    Validation = 0,

    /// Compaction metadata body.
    Compaction = 1,

    /// Stats metadata body.
    Stats = 2,
}

impl MetadataType {
    /// Maps a raw on-disk tag to a known body type.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Validation),
            1 => Some(Self::Compaction),
            2 => Some(Self::Stats),
            _ => None,
        }
    }

    /// The on-disk tag value.
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

// ------------------------------------------------------------------------------------------------
// ColumnMask
// ------------------------------------------------------------------------------------------------

/// Per-column flag byte in the row format. Zero means an ordinary live cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnMask(u8);

impl ColumnMask {
    /// Ordinary live cell.
    pub const NONE: ColumnMask = ColumnMask(0x00);
    /// Deleted cell.
    pub const DELETION: ColumnMask = ColumnMask(0x01);
    /// Expiring cell.
    pub const EXPIRATION: ColumnMask = ColumnMask(0x02);
    /// Counter cell.
    pub const COUNTER: ColumnMask = ColumnMask(0x04);
    /// Counter update cell.
    pub const COUNTER_UPDATE: ColumnMask = ColumnMask(0x08);
    /// Range tombstone marker.
    pub const RANGE_TOMBSTONE: ColumnMask = ColumnMask(0x10);

    /// Builds a mask from its on-disk byte.
    pub fn from_bits(bits: u8) -> Self {
        ColumnMask(bits)
    }

    /// The on-disk byte.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` when every flag of `other` is set in `self`.
    pub fn contains(self, other: ColumnMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ColumnMask {
    type Output = ColumnMask;

    fn bitor(self, rhs: ColumnMask) -> ColumnMask {
        ColumnMask(self.0 | rhs.0)
    }
}

impl BitAnd for ColumnMask {
    type Output = ColumnMask;

    fn bitand(self, rhs: ColumnMask) -> ColumnMask {
        ColumnMask(self.0 & rhs.0)
    }
}
