//! SSTable Orchestrator
//!
//! An SSTable is an **immutable** sorted-string table materialized as a set
//! of companion files sharing one identity: a directory, a version tag
//! (currently only `"la"`), a format tag (currently only `"big"`), and a
//! numeric generation. Component filenames follow the pattern
//!
//! ```text
//! <dir>/<version>-<generation>-<format>-<suffix>
//! ```
//!
//! with nine recognized suffixes ([`ComponentType`]). The TOC file is the
//! source of truth for which components exist for a generation.
//!
//! # Lifecycle
//!
//! A [`SSTable`] value is created empty ([`SSTable::new`]) and populated by a
//! single [`load`](SSTable::load), which runs a strict sequence:
//!
//! 1. Read TOC → populate the component set.
//! 2. Read Statistics.
//! 3. Read CompressionInfo if the TOC lists it.
//! 4. Read Filter if the TOC lists it.
//! 5. Read Summary.
//! 6. Open the Index and Data files; capture the Data file's size.
//! 7. Hand the Data file size to the compression metadata, which needs it to
//!    bound its last chunk.
//!
//! Any step's failure aborts the whole load: nothing is committed to the
//! table, every handle opened so far is released, and the value remains
//! unloaded. After a successful load the table is observationally immutable.
//!
//! [`store`](SSTable::store) writes back every metadata component the table
//! owns — TOC, Statistics, CompressionInfo and Filter when present, and
//! Summary — each atomically (create, truncate, stream, flush, close with a
//! durable sync). All store errors are fatal and propagate. Write order is
//! not observable to readers, because readers only open components after the
//! TOC lists them.
//!
//! # Data reads
//!
//! [`data_stream_at`](SSTable::data_stream_at) hands out an input stream over
//! the Data file, layered through the decompression stream when compression
//! metadata (and a registered [`Decompressor`]) exist, or the raw file stream
//! otherwise. The caller cannot tell the variants apart.
//!
//! # Index read-ahead
//!
//! [`read_indexes`](SSTable::read_indexes) parses up to `quantity` index
//! entries from a byte position. The Index file does not record how many
//! entries a sampling group holds, so running off the end of the file is a
//! normal outcome: a short read at genuine end-of-file terminates the
//! enumeration with fewer entries, while a short read anywhere else is
//! corruption. This is the only place in the codec where a short read is
//! swallowed.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::compress::{CompressError, CompressedInputStream, Compression, Decompressor};
use crate::encoding::{Decode, Encode, EncodingError};
use crate::format::{Filter, IndexEntry, Statistics, Summary, SummaryEntry};
use crate::stream::{
    FileOutputStream, FileRandomAccessReader, InputStream, StreamError, DEFAULT_BUFFER_SIZE,
};

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Buffer size used when parsing component files.
const COMPONENT_BUFFER_SIZE: usize = 4096;

/// A TOC file at or above this size is malformed — it lists at most nine
/// short names, so a whole page of content means something is fishy.
const TOC_MAX_SIZE: u64 = 4096;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by SSTable operations.
#[derive(Debug, Error)]
pub enum SSTableError {
    /// The companion files violate the format: TOC errors, files truncated
    /// at structural boundaries, or a missing component file (the OS
    /// not-found error is mapped here, augmented with the path).
    #[error("malformed SSTable: {0}")]
    Malformed(String),

    /// Wire-level encode/decode failure.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Underlying stream failure.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// Compressed-stream failure.
    #[error("compression error: {0}")]
    Compress(#[from] CompressError),

    /// A summary entry index past the end was requested.
    #[error("invalid Summary index: {index} (table has {size} entries)")]
    OutOfRange {
        /// Requested entry index.
        index: usize,
        /// Number of entries in the summary.
        size: usize,
    },

    /// The table is compressed but no decompressor has been registered.
    #[error("no decompressor registered for compressor {0:?}")]
    UnsupportedCompression(String),

    /// Any other OS error from the underlying streams.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal invariant violation, e.g. operating on an unloaded table.
    #[error("internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Identity enums
// ------------------------------------------------------------------------------------------------

/// SSTable format version. Only `la` exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Version {
    /// The `la` version.
    La,
}

impl Version {
    /// The textual tag used in filenames.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::La => "la",
        }
    }
}

impl FromStr for Version {
    type Err = SSTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "la" => Ok(Self::La),
            other => Err(SSTableError::Malformed(format!(
                "unknown SSTable version: {other}"
            ))),
        }
    }
}

/// SSTable storage format. Only `big` exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Format {
    /// The `big` (big-endian) format.
    Big,
}

impl Format {
    /// The textual tag used in filenames.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Big => "big",
        }
    }
}

impl FromStr for Format {
    type Err = SSTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "big" => Ok(Self::Big),
            other => Err(SSTableError::Malformed(format!(
                "unknown SSTable format: {other}"
            ))),
        }
    }
}

/// The nine recognized companion files of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComponentType {
    /// Partition index.
    Index,
    /// Compression metadata.
    CompressionInfo,
    /// Row data.
    Data,
    /// Table of contents.
    Toc,
    /// Sparse index-of-the-index.
    Summary,
    /// Whole-file digest.
    Digest,
    /// Per-chunk checksums.
    Crc,
    /// Bloom filter.
    Filter,
    /// Table statistics.
    Statistics,
}

impl ComponentType {
    /// All component kinds, in declaration order.
    pub const ALL: [ComponentType; 9] = [
        Self::Index,
        Self::CompressionInfo,
        Self::Data,
        Self::Toc,
        Self::Summary,
        Self::Digest,
        Self::Crc,
        Self::Filter,
        Self::Statistics,
    ];

    /// The fixed filename suffix of this component.
    pub fn as_suffix(self) -> &'static str {
        match self {
            Self::Index => "Index.db",
            Self::CompressionInfo => "CompressionInfo.db",
            Self::Data => "Data.db",
            Self::Toc => "TOC.txt",
            Self::Summary => "Summary.db",
            Self::Digest => "Digest.sha1",
            Self::Crc => "CRC.db",
            Self::Filter => "Filter.db",
            Self::Statistics => "Statistics.db",
        }
    }

    /// Reverse-maps a filename suffix to its component kind.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.iter().find(|c| c.as_suffix() == suffix).copied()
    }
}

// ------------------------------------------------------------------------------------------------
// SSTable
// ------------------------------------------------------------------------------------------------

/// One generation of an immutable sorted-string table on disk.
///
/// Owns the parsed Summary, Statistics, optional compression metadata, and
/// optional Filter; shares the Index and Data file handles with any readers
/// it hands out (the last holder closes).
pub struct SSTable {
    /// Directory holding the companion files.
    dir: PathBuf,

    /// Version tag.
    version: Version,

    /// Format tag.
    format: Format,

    /// Generation number distinguishing successive incarnations.
    generation: u64,

    /// Components listed by the TOC.
    components: BTreeSet<ComponentType>,

    /// Parsed Summary; `None` until loaded.
    summary: Option<Summary>,

    /// Parsed Statistics; `None` until loaded.
    statistics: Option<Statistics>,

    /// Parsed compression metadata, when the TOC lists CompressionInfo.
    compression: Option<Compression>,

    /// Parsed Bloom filter bits, when the TOC lists Filter.
    filter: Option<Filter>,

    /// Shared Index file handle.
    index_file: Option<Arc<File>>,

    /// Shared Data file handle.
    data_file: Option<Arc<File>>,

    /// Size of the Data file, captured while opening it.
    data_file_size: u64,

    /// Externally supplied row-level decompression algorithm.
    decompressor: Option<Arc<dyn Decompressor>>,
}

impl SSTable {
    /// Creates an unloaded table value for the given directory and
    /// generation, using the only version and format that exist today.
    pub fn new(dir: impl Into<PathBuf>, generation: u64) -> Self {
        Self {
            dir: dir.into(),
            version: Version::La,
            format: Format::Big,
            generation,
            components: BTreeSet::new(),
            summary: None,
            statistics: None,
            compression: None,
            filter: None,
            index_file: None,
            data_file: None,
            data_file_size: 0,
            decompressor: None,
        }
    }

    /// Registers the external decompression algorithm used for data reads on
    /// compressed tables.
    pub fn set_decompressor(&mut self, decompressor: Arc<dyn Decompressor>) {
        self.decompressor = Some(decompressor);
    }

    /// Full path of the given component file.
    pub fn filename(&self, component: ComponentType) -> PathBuf {
        self.dir.join(format!(
            "{}-{}-{}-{}",
            self.version.as_str(),
            self.generation,
            self.format.as_str(),
            component.as_suffix()
        ))
    }

    /// Returns `true` when the TOC listed the given component.
    pub fn has_component(&self, component: ComponentType) -> bool {
        self.components.contains(&component)
    }

    /// Components listed by the TOC.
    pub fn components(&self) -> &BTreeSet<ComponentType> {
        &self.components
    }

    /// Generation number.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Version tag.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Format tag.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Parsed Summary, once loaded.
    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// Parsed Statistics, once loaded.
    pub fn statistics(&self) -> Option<&Statistics> {
        self.statistics.as_ref()
    }

    /// Parsed compression metadata, when present.
    pub fn compression(&self) -> Option<&Compression> {
        self.compression.as_ref()
    }

    /// Parsed Bloom filter bits, when present.
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Size of the Data file, captured during load.
    pub fn data_file_size(&self) -> u64 {
        self.data_file_size
    }

    // --------------------------------------------------------------------
    // Load
    // --------------------------------------------------------------------

    /// Loads every companion file of this generation.
    ///
    /// Runs the strict sequence described in the [module docs](self); on any
    /// failure nothing is committed, all handles opened so far are released,
    /// and the table stays unloaded.
    pub fn load(&mut self) -> Result<(), SSTableError> {
        let components = self.read_toc()?;

        let statistics = {
            let mut reader = self.component_reader(ComponentType::Statistics)?;
            Statistics::read(&mut reader)?
        };

        let mut compression = if components.contains(&ComponentType::CompressionInfo) {
            Some(self.read_simple::<Compression>(ComponentType::CompressionInfo)?)
        } else {
            None
        };

        let filter = if components.contains(&ComponentType::Filter) {
            Some(self.read_simple::<Filter>(ComponentType::Filter)?)
        } else {
            None
        };

        let summary = {
            let mut reader = self.component_reader(ComponentType::Summary)?;
            Summary::read(&mut reader)?
        };

        let index_file = self.open_component(ComponentType::Index)?;
        let data_file = self.open_component(ComponentType::Data)?;
        let data_file_size = data_file.metadata()?.len();

        // With the data file size known, the compression metadata can bound
        // its final chunk.
        if let Some(compression) = compression.as_mut() {
            compression.update(data_file_size);
        }

        self.components = components;
        self.statistics = Some(statistics);
        self.compression = compression;
        self.filter = filter;
        self.summary = Some(summary);
        self.index_file = Some(index_file);
        self.data_file = Some(data_file);
        self.data_file_size = data_file_size;

        info!(
            "Loaded SSTable generation {} from {}",
            self.generation,
            self.dir.display()
        );
        Ok(())
    }

    // --------------------------------------------------------------------
    // Store
    // --------------------------------------------------------------------

    /// Writes back every metadata component the table owns: TOC, Statistics,
    /// CompressionInfo and Filter when present, and Summary.
    ///
    /// Each component is created, truncated, streamed, flushed, and synced
    /// before the next one starts. Store failures leave partial files on
    /// disk; the caller reaps them by generation.
    pub fn store(&self) -> Result<(), SSTableError> {
        let statistics = self
            .statistics
            .as_ref()
            .ok_or_else(|| SSTableError::Internal("store() before load()".into()))?;
        let summary = self
            .summary
            .as_ref()
            .ok_or_else(|| SSTableError::Internal("store() before load()".into()))?;

        self.write_toc()?;
        self.write_component(ComponentType::Statistics, |out| statistics.write_to(out))?;

        if self.has_component(ComponentType::CompressionInfo) {
            let compression = self.compression.as_ref().ok_or_else(|| {
                SSTableError::Internal("TOC lists CompressionInfo but none is loaded".into())
            })?;
            self.write_component(ComponentType::CompressionInfo, |out| {
                compression.encode_to(out)
            })?;
        }

        if self.has_component(ComponentType::Filter) {
            let filter = self.filter.as_ref().ok_or_else(|| {
                SSTableError::Internal("TOC lists Filter but none is loaded".into())
            })?;
            self.write_component(ComponentType::Filter, |out| filter.encode_to(out))?;
        }

        self.write_component(ComponentType::Summary, |out| summary.write_to(out))?;

        info!(
            "Stored SSTable generation {} to {}",
            self.generation,
            self.dir.display()
        );
        Ok(())
    }

    // --------------------------------------------------------------------
    // Data reads
    // --------------------------------------------------------------------

    /// Returns an input stream over the Data file starting at uncompressed
    /// position `pos`, layered through the decompression stream when the
    /// table is compressed.
    pub fn data_stream_at(&self, pos: u64) -> Result<DataStream<'_>, SSTableError> {
        let data_file = self
            .data_file
            .as_ref()
            .ok_or_else(|| SSTableError::Internal("data file not opened; load() first".into()))?;

        match &self.compression {
            Some(compression) => {
                let decompressor = self.decompressor.as_deref().ok_or_else(|| {
                    SSTableError::UnsupportedCompression(
                        String::from_utf8_lossy(compression.name.as_bytes()).into_owned(),
                    )
                })?;
                Ok(DataStream::Compressed(compression.open_stream(
                    Arc::clone(data_file),
                    decompressor,
                    pos,
                )?))
            }
            None => Ok(DataStream::Raw(FileRandomAccessReader::open_at(
                Arc::clone(data_file),
                pos,
                DEFAULT_BUFFER_SIZE,
            )?)),
        }
    }

    /// Reads exactly `len` bytes of row data starting at uncompressed
    /// position `pos`.
    pub fn data_read(&self, pos: u64, len: usize) -> Result<Vec<u8>, SSTableError> {
        let mut stream = self.data_stream_at(pos)?;
        Ok(stream.read_exactly(len)?)
    }

    // --------------------------------------------------------------------
    // Index read-ahead
    // --------------------------------------------------------------------

    /// Parses up to `quantity` successive index entries starting at byte
    /// `position` of the Index file.
    ///
    /// A short read at genuine end-of-file ends the enumeration normally
    /// with fewer entries than requested; a short read anywhere else is
    /// corruption.
    pub fn read_indexes(
        &self,
        position: u64,
        quantity: usize,
    ) -> Result<Vec<IndexEntry>, SSTableError> {
        let index_file = self
            .index_file
            .as_ref()
            .ok_or_else(|| SSTableError::Internal("index file not opened; load() first".into()))?;
        let mut reader =
            FileRandomAccessReader::open_at(Arc::clone(index_file), position, DEFAULT_BUFFER_SIZE)?;

        let mut indexes = Vec::new();
        while indexes.len() < quantity {
            match IndexEntry::decode_from(&mut reader) {
                Ok(entry) => indexes.push(entry),
                Err(EncodingError::Stream(StreamError::UnderfullBuffer { .. }))
                    if reader.eof() =>
                {
                    // The sampling group size is not recorded anywhere, so
                    // the file ending mid-enumeration is a normal short
                    // read; the partially parsed entry is discarded.
                    break;
                }
                Err(EncodingError::Stream(StreamError::UnderfullBuffer { got, expected })) => {
                    return Err(SSTableError::Malformed(format!(
                        "Index entry truncated before end of file (got {got}, expected {expected})"
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(indexes)
    }

    // --------------------------------------------------------------------
    // Summary access
    // --------------------------------------------------------------------

    /// Returns summary entry `index`, or [`SSTableError::OutOfRange`] past
    /// the end.
    pub fn summary_entry(&self, index: usize) -> Result<&SummaryEntry, SSTableError> {
        let summary = self
            .summary
            .as_ref()
            .ok_or_else(|| SSTableError::Internal("summary not loaded".into()))?;
        summary
            .entries
            .get(index)
            .ok_or(SSTableError::OutOfRange {
                index,
                size: summary.entries.len(),
            })
    }

    // --------------------------------------------------------------------
    // Internal helpers
    // --------------------------------------------------------------------

    /// Reads and validates the TOC file.
    fn read_toc(&self) -> Result<BTreeSet<ComponentType>, SSTableError> {
        let path = self.filename(ComponentType::Toc);
        debug!("Reading TOC file {}", path.display());

        let bytes = fs::read(&path).map_err(|e| map_open_error(e, &path))?;
        if bytes.len() as u64 >= TOC_MAX_SIZE {
            return Err(SSTableError::Malformed(format!(
                "SSTable TOC too big: {} bytes",
                bytes.len()
            )));
        }

        let text = String::from_utf8_lossy(&bytes);
        let mut components = BTreeSet::new();
        for line in text.split('\n') {
            // accept empty lines, including the trailing one
            if line.is_empty() {
                continue;
            }
            match ComponentType::from_suffix(line) {
                Some(component) => {
                    components.insert(component);
                }
                None => {
                    return Err(SSTableError::Malformed(format!(
                        "Unrecognized TOC component: {line}"
                    )));
                }
            }
        }
        if components.is_empty() {
            return Err(SSTableError::Malformed("Empty TOC".into()));
        }
        Ok(components)
    }

    /// Writes the TOC file, one suffix per line.
    fn write_toc(&self) -> Result<(), SSTableError> {
        self.write_component(ComponentType::Toc, |out| {
            for component in &self.components {
                out.write_all(component.as_suffix().as_bytes())?;
                out.write_all(b"\n")?;
            }
            Ok(())
        })
    }

    /// Opens a component file, mapping not-found to a malformed-table error
    /// carrying the path.
    fn open_component(&self, component: ComponentType) -> Result<Arc<File>, SSTableError> {
        let path = self.filename(component);
        let file = File::open(&path).map_err(|e| map_open_error(e, &path))?;
        Ok(Arc::new(file))
    }

    /// Opens a buffered reader over a component file.
    fn component_reader(
        &self,
        component: ComponentType,
    ) -> Result<FileRandomAccessReader, SSTableError> {
        let path = self.filename(component);
        debug!("Reading {} file {}", component.as_suffix(), path.display());
        let file = File::open(&path).map_err(|e| map_open_error(e, &path))?;
        Ok(FileRandomAccessReader::new(
            Arc::new(file),
            COMPONENT_BUFFER_SIZE,
        )?)
    }

    /// Parses a whole component file as one record.
    fn read_simple<T: Decode>(&self, component: ComponentType) -> Result<T, SSTableError> {
        let mut reader = self.component_reader(component)?;
        Ok(T::decode_from(&mut reader)?)
    }

    /// Streams one component to disk: create, truncate, write, flush, close
    /// with a durable sync.
    fn write_component<F>(&self, component: ComponentType, write: F) -> Result<(), SSTableError>
    where
        F: FnOnce(&mut FileOutputStream) -> Result<(), EncodingError>,
    {
        let path = self.filename(component);
        debug!("Writing {} file {}", component.as_suffix(), path.display());
        let mut out = FileOutputStream::create(&path)?;
        write(&mut out)?;
        out.flush()?;
        out.close()?;
        Ok(())
    }
}

/// Maps an open error to the table error taxonomy: a missing component file
/// is a malformed table, anything else is I/O.
fn map_open_error(e: io::Error, path: &Path) -> SSTableError {
    if e.kind() == io::ErrorKind::NotFound {
        SSTableError::Malformed(format!("{}: file not found", path.display()))
    } else {
        SSTableError::Io(e)
    }
}

// ------------------------------------------------------------------------------------------------
// DataStream
// ------------------------------------------------------------------------------------------------

/// An input stream over the Data file. The compressed and raw variants are
/// indistinguishable to the reader.
#[derive(Debug)]
pub enum DataStream<'a> {
    /// Uncompressed table: raw file stream.
    Raw(FileRandomAccessReader),

    /// Compressed table: chunk-decompressing stream.
    Compressed(CompressedInputStream<'a>),
}

impl InputStream for DataStream<'_> {
    fn read_exactly(&mut self, n: usize) -> Result<Vec<u8>, StreamError> {
        match self {
            Self::Raw(stream) => stream.read_exactly(n),
            Self::Compressed(stream) => stream.read_exactly(n),
        }
    }

    fn eof(&self) -> bool {
        match self {
            Self::Raw(stream) => stream.eof(),
            Self::Compressed(stream) => stream.eof(),
        }
    }
}
