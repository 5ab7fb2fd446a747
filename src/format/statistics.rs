//! Statistics file reader / writer.
//!
//! The Statistics file is a heterogeneous-body trailer: it begins with a
//! `disk_hash<u32, tag, u32>` whose values are absolute byte offsets into the
//! same file, followed by the concatenated bodies. The reader parses the map,
//! then seeks to each recorded offset and parses a body whose concrete type
//! is selected by the tag:
//!
//! | Tag | Body |
//! |-----|------|
//! | 0   | [`ValidationMetadata`](super::ValidationMetadata) |
//! | 1   | [`CompactionMetadata`](super::CompactionMetadata) |
//! | 2   | [`StatsMetadata`](super::StatsMetadata) |
//!
//! Unknown tags are logged at warn level and skipped — no body is read and no
//! error surfaces. The writer lays the bodies out after the map in ascending
//! tag order and recomputes every offset.

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::io::Write;

use tracing::warn;

use crate::encoding::{
    encode_to_vec, Decode, DiskHash, Encode, EncodingError, LenPrefix,
};
use crate::stream::RandomAccess;

use super::{CompactionMetadata, MetadataType, StatsMetadata, ValidationMetadata};

// ------------------------------------------------------------------------------------------------
// Statistics structures
// ------------------------------------------------------------------------------------------------

/// One parsed statistics body, tagged by its [`MetadataType`].
///
/// The contents map owns values of three different record types; a tagged
/// variant keeps that heterogeneity flat — unknown tags simply yield no
/// variant instance.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataContents {
    /// Validation metadata body.
    Validation(ValidationMetadata),

    /// Compaction metadata body.
    Compaction(CompactionMetadata),

    /// Stats metadata body.
    Stats(StatsMetadata),
}

/// Parsed Statistics file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statistics {
    /// The raw tag→offset map as found on disk, including entries whose tag
    /// the codec does not recognize.
    pub hash: DiskHash<u32, u32, u32>,

    /// Parsed bodies keyed by known tag.
    pub contents: BTreeMap<MetadataType, MetadataContents>,
}

// ------------------------------------------------------------------------------------------------
// Read / write protocol
// ------------------------------------------------------------------------------------------------

impl Statistics {
    /// Reads a Statistics file from `r`, which must be positioned at the
    /// start of the file. Offsets in the tag→offset map are absolute.
    pub fn read<R: RandomAccess + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let hash = DiskHash::<u32, u32, u32>::decode_from(r)?;

        let mut contents = BTreeMap::new();
        for (tag, offset) in hash.entries() {
            r.seek(*offset as u64);
            match MetadataType::from_raw(*tag) {
                Some(MetadataType::Validation) => {
                    contents.insert(
                        MetadataType::Validation,
                        MetadataContents::Validation(ValidationMetadata::decode_from(r)?),
                    );
                }
                Some(MetadataType::Compaction) => {
                    contents.insert(
                        MetadataType::Compaction,
                        MetadataContents::Compaction(CompactionMetadata::decode_from(r)?),
                    );
                }
                Some(MetadataType::Stats) => {
                    contents.insert(
                        MetadataType::Stats,
                        MetadataContents::Stats(StatsMetadata::decode_from(r)?),
                    );
                }
                None => {
                    warn!("Invalid metadata type at Statistics file: {tag}");
                }
            }
        }

        Ok(Self { hash, contents })
    }

    /// Writes the Statistics file: tag→offset map first, then the bodies in
    /// ascending tag order. Offsets are recomputed from the body sizes; the
    /// parsed [`hash`](Statistics::hash) is not consulted, so entries whose
    /// tag was unknown on read are not carried over.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        let mut bodies = Vec::with_capacity(self.contents.len());
        for (metadata_type, body) in &self.contents {
            bodies.push((metadata_type.as_raw(), encode_to_vec(body)?));
        }

        // The map itself occupies 4 bytes of count plus 8 bytes per entry;
        // the first body starts right after it.
        let mut offset = 4 + 8 * bodies.len() as u64;
        let mut map = DiskHash::<u32, u32, u32>::new();
        for (tag, body) in &bodies {
            map.insert(*tag, u32::check_narrow(offset)?);
            offset += body.len() as u64;
        }

        map.encode_to(out)?;
        for (_, body) in &bodies {
            out.write_all(body)?;
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Body dispatch
// ------------------------------------------------------------------------------------------------

impl MetadataContents {
    /// The tag this body is stored under.
    pub fn metadata_type(&self) -> MetadataType {
        match self {
            Self::Validation(_) => MetadataType::Validation,
            Self::Compaction(_) => MetadataType::Compaction,
            Self::Stats(_) => MetadataType::Stats,
        }
    }
}

impl Encode for MetadataContents {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        match self {
            Self::Validation(body) => body.encode_to(out),
            Self::Compaction(body) => body.encode_to(out),
            Self::Stats(body) => body.encode_to(out),
        }
    }
}
