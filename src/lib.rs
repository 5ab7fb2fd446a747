//! # sstable-codec
//!
//! Codec for the on-disk format of an **immutable sorted-string table**
//! (SSTable): the set of companion files a log-structured storage engine
//! writes per table generation. The crate enumerates which companion files
//! belong to a table, parses their structured binary contents into typed
//! records, and writes those records back byte-identically. The layout is
//! fixed by interoperability with an established external ecosystem — this
//! crate reproduces it exactly rather than defining its own.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       sstable (orchestrator)               │
//! │   TOC · load/store sequence · data reads · index lookahead │
//! ├──────────────────────────┬─────────────────────────────────┤
//! │         format           │            compress             │
//! │  records · summary ·     │  CompressionInfo record ·       │
//! │  statistics dispatch     │  chunked stream (ext. algo)     │
//! ├──────────────────────────┴─────────────────────────────────┤
//! │                        encoding                            │
//! │   big-endian scalars · sized strings/arrays/maps · guards  │
//! ├────────────────────────────────────────────────────────────┤
//! │                         stream                             │
//! │   exact-size reads · seek · shared handles · sync on close │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`stream`] | Byte I/O facade — exact-size reads, random access, durable writes |
//! | [`encoding`] | Scalar and shape codec — big-endian wire form, width-checked prefixes |
//! | [`format`] | Self-describing records, the Summary protocol, the Statistics dispatcher |
//! | [`compress`] | Compression metadata and the chunk-framing stream (algorithm is external) |
//! | [`sstable`] | Table identity, TOC, load/store orchestration, data-range reads |
//!
//! ## Scope
//!
//! The codec transports bytes; it does not interpret them. Key comparison,
//! tombstone evaluation, compaction, Bloom filter math, row-level
//! decompression algorithms, and the data-block reader are all collaborators
//! behind narrow seams. Unknown statistics tags are logged and skipped, not
//! upgraded — the codec does not version the format.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sstable_codec::sstable::SSTable;
//!
//! # fn main() -> Result<(), sstable_codec::sstable::SSTableError> {
//! let mut table = SSTable::new("/var/lib/db/ks/cf", 42);
//! table.load()?;
//!
//! // Sparse index lookup: summary entry → index entries → data range.
//! let entry = table.summary_entry(0)?;
//! let indexes = table.read_indexes(entry.position, 128)?;
//! let row = table.data_read(indexes[0].position, 256)?;
//! # let _ = row;
//! # Ok(())
//! # }
//! ```

pub mod compress;
pub mod encoding;
pub mod format;
pub mod sstable;
pub mod stream;
