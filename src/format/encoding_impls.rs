//! Encode / Decode implementations for the on-disk record types.
//!
//! These are split into a separate file for readability — the types
//! themselves live in `super` (i.e., `src/format/mod.rs`). Each pair of
//! implementations visits the record's field list in the same declaration
//! order; that single ordered traversal *is* the wire format.

use std::io::Write;

use crate::encoding::{
    decode_members_individually, encode_members_individually, ArrayMember, Decode, DiskArray,
    DiskHash, DiskString, Encode, EncodingError,
};
use crate::stream::InputStream;

use super::{
    ColumnMask, CompactionMetadata, DeletionTime, EstimatedHistogram, Filter, HistogramElement,
    IndexEntry, MetadataType, OptionEntry, ReplayPosition, StatsMetadata, StreamingHistogram,
    ValidationMetadata,
};

// ------------------------------------------------------------------------------------------------
// Filter
// ------------------------------------------------------------------------------------------------

impl Encode for Filter {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.hashes.encode_to(out)?;
        self.buckets.encode_to(out)?;
        Ok(())
    }
}

impl Decode for Filter {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let hashes = u32::decode_from(r)?;
        let buckets = DiskArray::decode_from(r)?;
        Ok(Self { hashes, buckets })
    }
}

// ------------------------------------------------------------------------------------------------
// OptionEntry
// ------------------------------------------------------------------------------------------------

impl Encode for OptionEntry {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.key.encode_to(out)?;
        self.value.encode_to(out)?;
        Ok(())
    }
}

impl Decode for OptionEntry {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let key = DiskString::decode_from(r)?;
        let value = DiskString::decode_from(r)?;
        Ok(Self { key, value })
    }
}

impl ArrayMember for OptionEntry {
    fn decode_members<R: InputStream + ?Sized>(
        r: &mut R,
        count: usize,
    ) -> Result<Vec<Self>, EncodingError> {
        decode_members_individually(r, count)
    }

    fn encode_members<W: Write + ?Sized>(
        members: &[Self],
        out: &mut W,
    ) -> Result<(), EncodingError> {
        encode_members_individually(members, out)
    }
}

// ------------------------------------------------------------------------------------------------
// IndexEntry
// ------------------------------------------------------------------------------------------------

impl Encode for IndexEntry {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.key.encode_to(out)?;
        self.position.encode_to(out)?;
        self.promoted_index.encode_to(out)?;
        Ok(())
    }
}

impl Decode for IndexEntry {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let key = DiskString::decode_from(r)?;
        let position = u64::decode_from(r)?;
        let promoted_index = DiskString::decode_from(r)?;
        Ok(Self {
            key,
            position,
            promoted_index,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// ReplayPosition
// ------------------------------------------------------------------------------------------------

impl Encode for ReplayPosition {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.segment.encode_to(out)?;
        self.position.encode_to(out)?;
        Ok(())
    }
}

impl Decode for ReplayPosition {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let segment = u64::decode_from(r)?;
        let position = u32::decode_from(r)?;
        Ok(Self { segment, position })
    }
}

// ------------------------------------------------------------------------------------------------
// HistogramElement / EstimatedHistogram
// ------------------------------------------------------------------------------------------------

impl Encode for HistogramElement {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.offset.encode_to(out)?;
        self.bucket.encode_to(out)?;
        Ok(())
    }
}

impl Decode for HistogramElement {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let offset = u64::decode_from(r)?;
        let bucket = u64::decode_from(r)?;
        Ok(Self { offset, bucket })
    }
}

impl ArrayMember for HistogramElement {
    fn decode_members<R: InputStream + ?Sized>(
        r: &mut R,
        count: usize,
    ) -> Result<Vec<Self>, EncodingError> {
        decode_members_individually(r, count)
    }

    fn encode_members<W: Write + ?Sized>(
        members: &[Self],
        out: &mut W,
    ) -> Result<(), EncodingError> {
        encode_members_individually(members, out)
    }
}

impl Encode for EstimatedHistogram {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.elements.encode_to(out)
    }
}

impl Decode for EstimatedHistogram {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        Ok(Self {
            elements: DiskArray::decode_from(r)?,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// StreamingHistogram
// ------------------------------------------------------------------------------------------------

impl Encode for StreamingHistogram {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.max_bin_size.encode_to(out)?;
        self.hash.encode_to(out)?;
        Ok(())
    }
}

impl Decode for StreamingHistogram {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let max_bin_size = u32::decode_from(r)?;
        let hash = DiskHash::decode_from(r)?;
        Ok(Self { max_bin_size, hash })
    }
}

// ------------------------------------------------------------------------------------------------
// DeletionTime
// ------------------------------------------------------------------------------------------------

impl Encode for DeletionTime {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.local_deletion_time.encode_to(out)?;
        self.marked_for_delete_at.encode_to(out)?;
        Ok(())
    }
}

impl Decode for DeletionTime {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let local_deletion_time = u32::decode_from(r)?;
        let marked_for_delete_at = u64::decode_from(r)?;
        Ok(Self {
            local_deletion_time,
            marked_for_delete_at,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// ValidationMetadata
// ------------------------------------------------------------------------------------------------

impl Encode for ValidationMetadata {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.partitioner.encode_to(out)?;
        self.filter_chance.encode_to(out)?;
        Ok(())
    }
}

impl Decode for ValidationMetadata {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let partitioner = DiskString::decode_from(r)?;
        let filter_chance = f64::decode_from(r)?;
        Ok(Self {
            partitioner,
            filter_chance,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// CompactionMetadata
// ------------------------------------------------------------------------------------------------

impl Encode for CompactionMetadata {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.ancestors.encode_to(out)?;
        self.cardinality.encode_to(out)?;
        Ok(())
    }
}

impl Decode for CompactionMetadata {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let ancestors = DiskArray::decode_from(r)?;
        let cardinality = DiskArray::decode_from(r)?;
        Ok(Self {
            ancestors,
            cardinality,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// StatsMetadata
// ------------------------------------------------------------------------------------------------

impl Encode for StatsMetadata {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.estimated_row_size.encode_to(out)?;
        self.estimated_column_count.encode_to(out)?;
        self.position.encode_to(out)?;
        self.min_timestamp.encode_to(out)?;
        self.max_timestamp.encode_to(out)?;
        self.max_local_deletion_time.encode_to(out)?;
        self.compression_ratio.encode_to(out)?;
        self.estimated_tombstone_drop_time.encode_to(out)?;
        self.sstable_level.encode_to(out)?;
        self.repaired_at.encode_to(out)?;
        self.min_column_names.encode_to(out)?;
        self.max_column_names.encode_to(out)?;
        self.has_legacy_counter_shards.encode_to(out)?;
        Ok(())
    }
}

impl Decode for StatsMetadata {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let estimated_row_size = EstimatedHistogram::decode_from(r)?;
        let estimated_column_count = EstimatedHistogram::decode_from(r)?;
        let position = ReplayPosition::decode_from(r)?;
        let min_timestamp = u64::decode_from(r)?;
        let max_timestamp = u64::decode_from(r)?;
        let max_local_deletion_time = u32::decode_from(r)?;
        let compression_ratio = f64::decode_from(r)?;
        let estimated_tombstone_drop_time = StreamingHistogram::decode_from(r)?;
        let sstable_level = u32::decode_from(r)?;
        let repaired_at = u64::decode_from(r)?;
        let min_column_names = DiskArray::decode_from(r)?;
        let max_column_names = DiskArray::decode_from(r)?;
        let has_legacy_counter_shards = bool::decode_from(r)?;
        Ok(Self {
            estimated_row_size,
            estimated_column_count,
            position,
            min_timestamp,
            max_timestamp,
            max_local_deletion_time,
            compression_ratio,
            estimated_tombstone_drop_time,
            sstable_level,
            repaired_at,
            min_column_names,
            max_column_names,
            has_legacy_counter_shards,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// MetadataType
// ------------------------------------------------------------------------------------------------

// Serialized as its declared underlying unsigned integer. Note that the
// statistics reader deliberately decodes raw u32 tags instead, so unknown
// tags can be skipped rather than failing the parse.

impl Encode for MetadataType {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.as_raw().encode_to(out)
    }
}

impl Decode for MetadataType {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let raw = u32::decode_from(r)?;
        MetadataType::from_raw(raw)
            .ok_or_else(|| EncodingError::Malformed(format!("unknown metadata type tag: {raw}")))
    }
}

// ------------------------------------------------------------------------------------------------
// ColumnMask
// ------------------------------------------------------------------------------------------------

impl Encode for ColumnMask {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.bits().encode_to(out)
    }
}

impl Decode for ColumnMask {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        Ok(ColumnMask::from_bits(u8::decode_from(r)?))
    }
}
