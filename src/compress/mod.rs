//! Compression metadata and the chunked data-stream layer.
//!
//! The codec does **not** implement any row-level compression algorithm —
//! that concern belongs to an external collaborator behind the
//! [`Decompressor`] trait. What lives here is everything the format itself
//! fixes:
//!
//! - the [`Compression`] record parsed from `CompressionInfo.db`
//!   (algorithm name, options, chunk length, uncompressed data length, and
//!   the per-chunk offset table);
//! - `update(data_file_size)`, called after the Data file is opened so the
//!   last chunk's compressed span can be computed (the offsets table only
//!   records chunk *starts*);
//! - [`CompressedInputStream`], an input stream that locates the chunk
//!   containing a position, reads its compressed span from the shared data
//!   file, hands the bytes to the collaborator, and serves `read_exactly`
//!   from the staged plaintext. The upper codec is oblivious to which stream
//!   variant it reads from.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;

use thiserror::Error;

use crate::encoding::{Decode, DiskArray, DiskString, Encode, EncodingError};
use crate::format::OptionEntry;
use crate::stream::{FileRandomAccessReader, InputStream, StreamError};

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by the compressed stream layer.
#[derive(Debug, Error)]
pub enum CompressError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Underlying stream failure while reading a compressed span.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// A read addressed a chunk past the offsets table.
    #[error("chunk {index} is out of range ({count} chunks)")]
    ChunkOutOfRange {
        /// Requested chunk index.
        index: usize,
        /// Number of chunks in the offsets table.
        count: usize,
    },

    /// The compression metadata is internally inconsistent.
    #[error("corrupt compression metadata: {0}")]
    Corrupt(String),

    /// The external decompressor rejected a chunk.
    #[error("decompression failed: {0}")]
    Algorithm(String),
}

// ------------------------------------------------------------------------------------------------
// Decompressor - the external collaborator seam
// ------------------------------------------------------------------------------------------------

/// Row-level decompression, supplied by the caller.
///
/// The codec hands over the raw compressed span of one chunk (including any
/// trailing per-chunk framing the algorithm writes) and expects the chunk's
/// plaintext appended to `dst`.
pub trait Decompressor: Send + Sync {
    /// Decompresses one chunk.
    fn decompress(&self, src: &[u8], dst: &mut Vec<u8>) -> Result<(), CompressError>;
}

// ------------------------------------------------------------------------------------------------
// Compression record
// ------------------------------------------------------------------------------------------------

/// Parsed `CompressionInfo.db` contents.
///
/// Field order is normative: name, options, chunk length, uncompressed data
/// length, chunk offsets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compression {
    /// Compressor class name, as recorded by the producer.
    pub name: DiskString<u16>,

    /// Compressor options.
    pub options: DiskArray<u32, OptionEntry>,

    /// Uncompressed chunk length in bytes.
    pub chunk_len: u32,

    /// Total uncompressed data length in bytes.
    pub data_len: u64,

    /// Byte offset of each compressed chunk within the Data file.
    pub offsets: DiskArray<u32, u64>,

    /// Compressed file size, learned from the opened Data file. Not part of
    /// the wire format; zero until [`update`](Compression::update) runs.
    compressed_file_length: u64,
}

impl Compression {
    /// Builds a record from its wire fields.
    pub fn new(
        name: DiskString<u16>,
        options: DiskArray<u32, OptionEntry>,
        chunk_len: u32,
        data_len: u64,
        offsets: DiskArray<u32, u64>,
    ) -> Self {
        Self {
            name,
            options,
            chunk_len,
            data_len,
            offsets,
            compressed_file_length: 0,
        }
    }

    /// Records the Data file size once it is known. The offsets table only
    /// stores chunk starts, so the last chunk's span is bounded by the file
    /// end.
    pub fn update(&mut self, data_file_size: u64) {
        self.compressed_file_length = data_file_size;
    }

    /// Compressed file size recorded by [`update`](Compression::update).
    pub fn compressed_file_length(&self) -> u64 {
        self.compressed_file_length
    }

    /// Number of chunks in the offsets table.
    pub fn chunk_count(&self) -> usize {
        self.offsets.len()
    }

    /// The file span `(offset, length)` of compressed chunk `index`.
    pub fn chunk_span(&self, index: usize) -> Result<(u64, u64), CompressError> {
        let start = *self
            .offsets
            .elements
            .get(index)
            .ok_or(CompressError::ChunkOutOfRange {
                index,
                count: self.offsets.len(),
            })?;
        let end = match self.offsets.elements.get(index + 1) {
            Some(next) => *next,
            None => self.compressed_file_length,
        };
        let length = end.checked_sub(start).ok_or_else(|| {
            CompressError::Corrupt(format!(
                "chunk {index} spans backwards ({start} > {end}); \
                 was update() called with the data file size?"
            ))
        })?;
        Ok((start, length))
    }

    /// Opens a decompressing stream over `file` positioned at uncompressed
    /// offset `pos`.
    pub fn open_stream<'a>(
        &'a self,
        file: Arc<File>,
        decompressor: &'a dyn Decompressor,
        pos: u64,
    ) -> Result<CompressedInputStream<'a>, CompressError> {
        if self.chunk_len == 0 {
            return Err(CompressError::Corrupt("chunk length is zero".into()));
        }
        Ok(CompressedInputStream {
            file,
            compression: self,
            decompressor,
            position: pos,
            chunk: Vec::new(),
            chunk_start: 0,
        })
    }
}

impl Encode for Compression {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.name.encode_to(out)?;
        self.options.encode_to(out)?;
        self.chunk_len.encode_to(out)?;
        self.data_len.encode_to(out)?;
        self.offsets.encode_to(out)?;
        Ok(())
    }
}

impl Decode for Compression {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let name = DiskString::decode_from(r)?;
        let options = DiskArray::decode_from(r)?;
        let chunk_len = u32::decode_from(r)?;
        let data_len = u64::decode_from(r)?;
        let offsets = DiskArray::decode_from(r)?;
        Ok(Self::new(name, options, chunk_len, data_len, offsets))
    }
}

// ------------------------------------------------------------------------------------------------
// CompressedInputStream
// ------------------------------------------------------------------------------------------------

/// Input stream over compressed data: chunks are read whole, decompressed
/// through the collaborator, and served from the staged plaintext.
pub struct CompressedInputStream<'a> {
    /// Shared Data file handle.
    file: Arc<File>,

    /// Parsed compression metadata (chunk geometry).
    compression: &'a Compression,

    /// The external decompression algorithm.
    decompressor: &'a dyn Decompressor,

    /// Current uncompressed position.
    position: u64,

    /// Plaintext of the currently staged chunk; empty before the first read.
    chunk: Vec<u8>,

    /// Uncompressed offset of `chunk[0]`.
    chunk_start: u64,
}

impl std::fmt::Debug for CompressedInputStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedInputStream")
            .field("file", &self.file)
            .field("compression", &self.compression)
            .field("position", &self.position)
            .field("chunk_len", &self.chunk.len())
            .field("chunk_start", &self.chunk_start)
            .finish()
    }
}

impl CompressedInputStream<'_> {
    /// Stages the plaintext of the chunk containing the current position.
    fn load_chunk(&mut self) -> Result<(), CompressError> {
        let chunk_len = self.compression.chunk_len as u64;
        let index = (self.position / chunk_len) as usize;
        let (offset, length) = self.compression.chunk_span(index)?;

        let mut reader = FileRandomAccessReader::open_at(
            Arc::clone(&self.file),
            offset,
            length.max(1) as usize,
        )?;
        let compressed = reader.read_exactly(length as usize)?;

        let mut plaintext = Vec::with_capacity(self.compression.chunk_len as usize);
        self.decompressor.decompress(&compressed, &mut plaintext)?;

        self.chunk = plaintext;
        self.chunk_start = index as u64 * chunk_len;
        if self.position >= self.chunk_start + self.chunk.len() as u64 {
            return Err(CompressError::Corrupt(format!(
                "chunk {index} decompressed to {} bytes, position {} not covered",
                self.chunk.len(),
                self.position
            )));
        }
        Ok(())
    }

    fn stream_error(e: CompressError) -> StreamError {
        match e {
            CompressError::Io(e) => StreamError::Io(e),
            CompressError::Stream(e) => e,
            other => StreamError::Io(io::Error::other(other.to_string())),
        }
    }
}

impl InputStream for CompressedInputStream<'_> {
    fn read_exactly(&mut self, n: usize) -> Result<Vec<u8>, StreamError> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let chunk_end = self.chunk_start + self.chunk.len() as u64;
            if self.position >= self.chunk_start && self.position < chunk_end {
                let start = (self.position - self.chunk_start) as usize;
                let take = (n - out.len()).min(self.chunk.len() - start);
                out.extend_from_slice(&self.chunk[start..start + take]);
                self.position += take as u64;
                continue;
            }
            if self.position >= self.compression.data_len {
                return Err(StreamError::UnderfullBuffer {
                    got: out.len(),
                    expected: n,
                });
            }
            self.load_chunk().map_err(Self::stream_error)?;
        }
        Ok(out)
    }

    fn eof(&self) -> bool {
        self.position >= self.compression.data_len
    }
}
