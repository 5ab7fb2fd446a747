//! Summary file reader / writer.
//!
//! The Summary file is layout-heterogeneous: its entries are variable-sized
//! and carry no inline length, so their sizes are recovered from a positions
//! table that precedes them. The read protocol is:
//!
//! 1. Parse the fixed-width header (five scalars).
//! 2. Read `header.size` consecutive `u32` offsets into the positions table.
//!    **These are stored in native memory order (little-endian), not
//!    big-endian** — the single non-big-endian scalar datum in the format.
//! 3. Append a synthetic trailing position equal to `header.memory_size`, so
//!    every real position has a successor and entry-size computation needs no
//!    boundary conditional.
//! 4. Seek to `SummaryHeader::SIZE + memory_size` and parse `first_key` /
//!    `last_key`.
//! 5. Seek back to `positions[0] + SummaryHeader::SIZE` and read each entry as
//!    `positions[i + 1] - positions[i]` bytes: the trailing 8 bytes decode
//!    big-endian into the entry position, the preceding bytes are the raw
//!    key.
//!
//! Positions are offsets within the post-header "memory stream", which
//! begins with the positions table itself — in a well-formed file
//! `positions[0] == 4 * size`. Once the entries are materialized the
//! positions table is dropped; the writer regenerates it from the entry
//! sizes, so a canonical file round-trips byte-identically.

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::io::Write;
use std::mem::size_of;

use crate::encoding::{
    Decode, DiskString, Encode, EncodingError, LenPrefix, MAX_ELEMENT_COUNT,
};
use crate::stream::RandomAccess;

// ------------------------------------------------------------------------------------------------
// Summary structures
// ------------------------------------------------------------------------------------------------

/// Fixed-width Summary header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummaryHeader {
    /// The minimum possible amount of index entries per sampling group.
    pub min_index_interval: u32,

    /// Number of entries in the Summary file.
    pub size: u32,

    /// Bytes consumed by the whole memory stream (positions + entries).
    pub memory_size: u64,

    /// The actual sampling level.
    pub sampling_level: u32,

    /// The number of entries the Summary would have at `min_index_interval`
    /// sampling.
    pub size_at_full_sampling: u32,
}

impl SummaryHeader {
    /// On-disk size of the header in bytes.
    pub const SIZE: u64 = (size_of::<u32>() * 4 + size_of::<u64>()) as u64;
}

/// One Summary entry: a raw key and its byte position in the Index file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SummaryEntry {
    /// Raw key bytes (unsized on disk; bounded by the positions table).
    pub key: Vec<u8>,

    /// Byte position of the key's index entry in the Index file.
    pub position: u64,
}

/// Parsed Summary: the sparse index-of-the-index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Summary {
    /// Fixed-width header.
    pub header: SummaryHeader,

    /// Sampled entries, one per `min_index_interval` index entries.
    pub entries: Vec<SummaryEntry>,

    /// First key covered by the table.
    pub first_key: DiskString<u32>,

    /// Last key covered by the table.
    pub last_key: DiskString<u32>,
}

// ------------------------------------------------------------------------------------------------
// Read / write protocol
// ------------------------------------------------------------------------------------------------

impl Summary {
    /// Reads a Summary from `r`, which must be positioned at the start of the
    /// file.
    pub fn read<R: RandomAccess + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let header = SummaryHeader::decode_from(r)?;
        let size = header.size as u64;
        if size > MAX_ELEMENT_COUNT {
            return Err(EncodingError::LengthLimit {
                len: size,
                limit: MAX_ELEMENT_COUNT,
            });
        }
        let size = size as usize;

        // Positions are laid out in memory order, not big-endian. Widened to
        // u64 so the synthetic memory_size terminator always fits.
        let buf = r.read_exactly(size * size_of::<u32>())?;
        let mut positions = Vec::with_capacity(size + 1);
        for chunk in buf.chunks_exact(size_of::<u32>()) {
            let mut bytes = [0u8; size_of::<u32>()];
            bytes.copy_from_slice(chunk);
            positions.push(u32::from_le_bytes(bytes) as u64);
        }

        // Since the keys are not sized, the start of entry i + 1 determines
        // the boundary of entry i. Pushing the total memory size gives every
        // real position a successor, so no conditionals are needed when
        // querying the position of the "next" entry.
        positions.push(header.memory_size);

        r.seek(SummaryHeader::SIZE + header.memory_size);
        let first_key = DiskString::<u32>::decode_from(r)?;
        let last_key = DiskString::<u32>::decode_from(r)?;

        r.seek(positions[0] + SummaryHeader::SIZE);

        debug_assert_eq!(positions.len(), size + 1);

        let mut entries = Vec::with_capacity(size);
        for i in 0..size {
            let entry_size = positions[i + 1].checked_sub(positions[i]).ok_or_else(|| {
                EncodingError::Malformed(format!(
                    "summary positions not monotonic at entry {i}: {} > {}",
                    positions[i],
                    positions[i + 1]
                ))
            })?;
            if entry_size < size_of::<u64>() as u64 {
                return Err(EncodingError::Malformed(format!(
                    "summary entry {i} too small ({entry_size} bytes)"
                )));
            }

            let body = r.read_exactly(entry_size as usize)?;
            let key_size = body.len() - size_of::<u64>();
            let mut position_bytes = [0u8; size_of::<u64>()];
            position_bytes.copy_from_slice(&body[key_size..]);
            entries.push(SummaryEntry {
                key: body[..key_size].to_vec(),
                position: u64::from_be_bytes(position_bytes),
            });
        }

        // The whole entries array was read upfront, so the positions table
        // is no longer needed; it is dropped here.
        Ok(Self {
            header,
            entries,
            first_key,
            last_key,
        })
    }

    /// Writes the Summary back, regenerating the positions table and
    /// `memory_size` from the entry sizes.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        let size = u32::check_narrow(self.entries.len() as u64)?;

        let mut positions = Vec::with_capacity(self.entries.len());
        let mut cursor = self.entries.len() as u64 * size_of::<u32>() as u64;
        for entry in &self.entries {
            positions.push(u32::check_narrow(cursor)?);
            cursor += entry.key.len() as u64 + size_of::<u64>() as u64;
        }
        let memory_size = cursor;

        let header = SummaryHeader {
            size,
            memory_size,
            ..self.header
        };
        header.encode_to(out)?;

        for position in &positions {
            out.write_all(&position.to_le_bytes())?;
        }

        for entry in &self.entries {
            out.write_all(&entry.key)?;
            out.write_all(&entry.position.to_be_bytes())?;
        }

        self.first_key.encode_to(out)?;
        self.last_key.encode_to(out)?;
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Header field list
// ------------------------------------------------------------------------------------------------

impl Encode for SummaryHeader {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.min_index_interval.encode_to(out)?;
        self.size.encode_to(out)?;
        self.memory_size.encode_to(out)?;
        self.sampling_level.encode_to(out)?;
        self.size_at_full_sampling.encode_to(out)?;
        Ok(())
    }
}

impl Decode for SummaryHeader {
    fn decode_from<R: crate::stream::InputStream + ?Sized>(
        r: &mut R,
    ) -> Result<Self, EncodingError> {
        let min_index_interval = u32::decode_from(r)?;
        let size = u32::decode_from(r)?;
        let memory_size = u64::decode_from(r)?;
        let sampling_level = u32::decode_from(r)?;
        let size_at_full_sampling = u32::decode_from(r)?;
        Ok(Self {
            min_index_interval,
            size,
            memory_size,
            sampling_level,
            size_at_full_sampling,
        })
    }
}
