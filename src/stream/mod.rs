//! Byte I/O Facade
//!
//! This module provides the low-level streams the codec is built on:
//!
//! - [`InputStream`] — exact-size reads (`read_exactly`) with end-of-stream
//!   detection. A short read is always an error ([`StreamError::UnderfullBuffer`])
//!   carrying how many bytes were available and how many were requested.
//! - [`RandomAccess`] — an [`InputStream`] that can additionally be re-anchored
//!   at an absolute offset with `seek`.
//! - [`FileRandomAccessReader`] — buffered random-access reads over a shared
//!   file handle.
//! - [`MemoryReader`] — in-memory [`RandomAccess`] over a byte vector, used by
//!   the decompression layer for chunk staging and by tests for crafted
//!   fixtures.
//! - [`FileOutputStream`] — append-only component writer whose `close` commits
//!   the file durably.
//!
//! # Sharing model
//!
//! File handles are wrapped in `Arc<File>` and shared between the table value
//! and any readers derived from it; the last holder closes the file on drop.
//! Reads go through positional I/O (`read_at`), so two readers over the same
//! handle never disturb each other's cursor.
//!
//! # Short reads
//!
//! Every read either yields exactly the requested byte count or fails with
//! [`StreamError::UnderfullBuffer`]. When a read comes up short the stream is
//! left positioned at the end of the available bytes, so `eof()` reports
//! whether the shortfall was a genuine end-of-file — the index read-ahead in
//! the table layer relies on exactly this to tell a normal short enumeration
//! apart from corruption.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    os::unix::fs::FileExt,
    path::Path,
    sync::Arc,
};

use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Default read buffer size for file-backed readers.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by stream operations.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A read yielded fewer bytes than requested.
    #[error("buffer improperly sized to hold requested data (got {got}, expected {expected})")]
    UnderfullBuffer {
        /// Bytes actually available.
        got: usize,
        /// Bytes requested.
        expected: usize,
    },

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ------------------------------------------------------------------------------------------------
// Traits
// ------------------------------------------------------------------------------------------------

/// A forward byte stream with exact-size reads.
pub trait InputStream {
    /// Reads exactly `n` bytes, or fails with [`StreamError::UnderfullBuffer`]
    /// carrying the number of bytes that were available.
    fn read_exactly(&mut self, n: usize) -> Result<Vec<u8>, StreamError>;

    /// Returns `true` once the stream position has reached the end of the
    /// underlying data.
    fn eof(&self) -> bool;
}

/// An [`InputStream`] that can be re-anchored at an absolute offset.
pub trait RandomAccess: InputStream {
    /// Moves the stream position to `pos` (absolute).
    fn seek(&mut self, pos: u64);
}

// ------------------------------------------------------------------------------------------------
// FileRandomAccessReader
// ------------------------------------------------------------------------------------------------

/// Buffered random-access reader over a shared file handle.
///
/// The reader keeps a sliding window of up to `buffer_size` bytes; `seek`
/// merely moves the logical position, and a seek back into the current window
/// costs no I/O. The file length is captured at construction — component
/// files are immutable once written.
#[derive(Debug)]
pub struct FileRandomAccessReader {
    /// Shared handle; positional reads leave the OS cursor untouched.
    file: Arc<File>,

    /// Total file length, captured at construction.
    len: u64,

    /// Logical read position.
    pos: u64,

    /// Current buffered window.
    buffer: Vec<u8>,

    /// File offset of `buffer[0]`.
    buffer_pos: u64,

    /// Target window size for refills.
    buffer_size: usize,
}

impl FileRandomAccessReader {
    /// Creates a reader positioned at the start of the file.
    pub fn new(file: Arc<File>, buffer_size: usize) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            len,
            pos: 0,
            buffer: Vec::new(),
            buffer_pos: 0,
            buffer_size,
        })
    }

    /// Creates a reader positioned at `pos`.
    pub fn open_at(file: Arc<File>, pos: u64, buffer_size: usize) -> io::Result<Self> {
        let mut reader = Self::new(file, buffer_size)?;
        reader.seek(pos);
        Ok(reader)
    }

    /// Total length of the underlying file.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` for a zero-length file.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Refills the window starting at the current position.
    fn fill_buffer(&mut self) -> Result<(), StreamError> {
        let want = self.buffer_size.min((self.len - self.pos) as usize);
        let mut buf = vec![0u8; want];
        let mut filled = 0;
        while filled < want {
            let n = self.file.read_at(&mut buf[filled..], self.pos + filled as u64)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        self.buffer_pos = self.pos;
        self.buffer = buf;
        if filled == 0 {
            // The file is shorter than its metadata claimed; clamp so the
            // caller sees a clean end-of-file instead of a busy loop.
            self.len = self.pos;
        }
        Ok(())
    }
}

impl InputStream for FileRandomAccessReader {
    fn read_exactly(&mut self, n: usize) -> Result<Vec<u8>, StreamError> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let window_end = self.buffer_pos + self.buffer.len() as u64;
            if self.pos >= self.buffer_pos && self.pos < window_end {
                let start = (self.pos - self.buffer_pos) as usize;
                let take = (n - out.len()).min(self.buffer.len() - start);
                out.extend_from_slice(&self.buffer[start..start + take]);
                self.pos += take as u64;
                continue;
            }
            if self.pos >= self.len {
                return Err(StreamError::UnderfullBuffer {
                    got: out.len(),
                    expected: n,
                });
            }
            self.fill_buffer()?;
        }
        Ok(out)
    }

    fn eof(&self) -> bool {
        self.pos >= self.len
    }
}

impl RandomAccess for FileRandomAccessReader {
    fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }
}

// ------------------------------------------------------------------------------------------------
// MemoryReader
// ------------------------------------------------------------------------------------------------

/// In-memory [`RandomAccess`] over an owned byte vector.
pub struct MemoryReader {
    data: Vec<u8>,
    pos: usize,
}

impl MemoryReader {
    /// Wraps the given bytes in a reader positioned at the start.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl InputStream for MemoryReader {
    fn read_exactly(&mut self, n: usize) -> Result<Vec<u8>, StreamError> {
        let available = self.data.len().saturating_sub(self.pos);
        if available < n {
            self.pos = self.data.len();
            return Err(StreamError::UnderfullBuffer {
                got: available,
                expected: n,
            });
        }
        let out = self.data[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(out)
    }

    fn eof(&self) -> bool {
        self.pos >= self.data.len()
    }
}

impl RandomAccess for MemoryReader {
    fn seek(&mut self, pos: u64) {
        self.pos = pos as usize;
    }
}

// ------------------------------------------------------------------------------------------------
// FileOutputStream
// ------------------------------------------------------------------------------------------------

/// Append-only component writer.
///
/// Created over a freshly truncated file; bytes accumulate in a buffered
/// writer and [`close`](FileOutputStream::close) flushes and syncs so the
/// component is durable before the caller moves on.
pub struct FileOutputStream {
    writer: BufWriter<File>,
}

impl FileOutputStream {
    /// Creates (or truncates) the file at `path` and returns a writer over it.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Flushes buffered bytes and durably syncs the file.
    pub fn close(self) -> io::Result<()> {
        let file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}

impl Write for FileOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
