//! Deterministic binary encoding for the SSTable companion-file format.
//!
//! This module provides the [`Encode`] and [`Decode`] traits that realize the
//! on-disk wire format by hand instead of through an external serialization
//! library. The layout is fixed by interoperability with an established
//! ecosystem, so the representation **never** changes due to a dependency
//! upgrade — every byte is produced and consumed by code in this crate.
//!
//! # Wire format
//!
//! | Shape                | Encoding                                          |
//! |----------------------|---------------------------------------------------|
//! | integers (8–64 bit)  | big-endian two's complement, exact width          |
//! | `bool`               | 1 byte (`0x00` = false, `0x01` = true)            |
//! | `f64`                | IEEE-754 bit pattern as a big-endian `u64`        |
//! | [`DiskString<S>`]    | `S`-wide byte length + raw bytes                  |
//! | [`DiskArray<S, T>`]  | `S`-wide element count + `count` encodings of `T` |
//! | [`DiskHash<S, K, V>`]| `S`-wide entry count + `count` pairs of `K`, `V`  |
//! | records              | fields in declaration order, no framing of own    |
//!
//! All length prefixes are big-endian unsigned integers of the declared
//! width `S`. Strings are opaque byte sequences — no text validation.
//!
//! # Width-checked narrowing
//!
//! Assigning a length into a prefix is guarded: a source value **greater than
//! or equal to** the destination maximum fails with
//! [`EncodingError::Overflow`]. Equality at the maximum counts as overflow —
//! the all-ones value is a reserved sentinel in the original format and must
//! never appear as a real length.
//!
//! # Fast path for integer arrays
//!
//! An array of fixed-width integers is read as one contiguous buffer and
//! normalized element by element; arrays of variable-sized members are
//! decoded one member at a time because their total size cannot be known up
//! front. The [`ArrayMember`] trait selects between the two.
//!
//! # Safety limits
//!
//! Decoded lengths and element counts come from the file, so they are bounded
//! before any allocation:
//!
//! - [`MAX_BYTE_LEN`] caps a single string payload (256 MiB).
//! - [`MAX_ELEMENT_COUNT`] caps array and map entry counts (16 M).
//!
//! A prefix above its limit fails with [`EncodingError::LengthLimit`]
//! immediately, preventing allocation bombs from corrupted or hostile files.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::io::Write;
use std::marker::PhantomData;
use std::mem::size_of;

use thiserror::Error;

use crate::stream::{InputStream, StreamError};

// ------------------------------------------------------------------------------------------------
// Safety limits
// ------------------------------------------------------------------------------------------------

/// Maximum byte length accepted for a single [`DiskString`] payload during
/// decoding (256 MiB). Larger prefixes are rejected before allocating.
pub const MAX_BYTE_LEN: u64 = 256 * 1024 * 1024;

/// Maximum element count accepted for a [`DiskArray`] or [`DiskHash`] during
/// decoding (16 M).
pub const MAX_ELEMENT_COUNT: u64 = 16 * 1024 * 1024;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors produced while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// The underlying stream failed or came up short.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// A width-checked narrowing would lose information. The bound is
    /// inclusive: `value == max` is an overflow.
    #[error("value {value} overflows a field with maximum {max}")]
    Overflow {
        /// The value that was being narrowed.
        value: u64,
        /// Maximum of the destination width.
        max: u64,
    },

    /// A decoded length or count exceeded its safety limit.
    #[error("length {len} exceeds the decode limit ({limit})")]
    LengthLimit {
        /// The decoded length.
        len: u64,
        /// The limit that was exceeded.
        limit: u64,
    },

    /// A bool field contained a byte other than `0x00` or `0x01`.
    #[error("invalid bool byte: 0x{0:02X} (expected 0x00 or 0x01)")]
    InvalidBool(u8),

    /// A structural invariant of the format was violated.
    #[error("malformed structure: {0}")]
    Malformed(String),

    /// Underlying I/O error on the write side.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// Core traits
// ------------------------------------------------------------------------------------------------

/// Serialize `self` into an output stream.
///
/// Implementations **must** produce deterministic output: the same logical
/// value always yields the exact same byte sequence.
pub trait Encode {
    /// Appends the encoded representation of `self` to `out`.
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError>;
}

/// Deserialize a value from an input stream.
///
/// Decoding consumes exactly the bytes the matching [`Encode`] produced;
/// composite shapes recurse through the same traits.
pub trait Decode: Sized {
    /// Decodes one value at the stream's current position.
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError>;
}

/// Element codec for [`DiskArray`] payloads.
///
/// Fixed-width integers read the whole payload as one contiguous buffer and
/// normalize in place; everything else falls back to member-by-member
/// decoding. Implemented for the integer scalars here and for the record
/// types that appear inside arrays.
pub trait ArrayMember: Sized {
    /// Decodes `count` consecutive members.
    fn decode_members<R: InputStream + ?Sized>(
        r: &mut R,
        count: usize,
    ) -> Result<Vec<Self>, EncodingError>;

    /// Encodes all members back to back.
    fn encode_members<W: Write + ?Sized>(
        members: &[Self],
        out: &mut W,
    ) -> Result<(), EncodingError>;
}

/// Member-by-member decode fallback for variable-sized array members.
pub fn decode_members_individually<T, R>(r: &mut R, count: usize) -> Result<Vec<T>, EncodingError>
where
    T: Decode,
    R: InputStream + ?Sized,
{
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        members.push(T::decode_from(r)?);
    }
    Ok(members)
}

/// Member-by-member encode fallback for variable-sized array members.
pub fn encode_members_individually<T, W>(members: &[T], out: &mut W) -> Result<(), EncodingError>
where
    T: Encode,
    W: Write + ?Sized,
{
    for member in members {
        member.encode_to(out)?;
    }
    Ok(())
}

// ------------------------------------------------------------------------------------------------
// Length prefixes
// ------------------------------------------------------------------------------------------------

/// Unsigned integer widths usable as a length prefix for the sized shapes.
///
/// `check_narrow` is the width guard from the original format: the maximum of
/// the destination type is treated as a reserved sentinel, so the check is
/// `value >= MAX`, not `value > MAX`.
pub trait LenPrefix: Copy {
    /// Maximum representable value of this width.
    const MAX: u64;

    /// Narrows `value` into this width, failing with
    /// [`EncodingError::Overflow`] when `value >= MAX`.
    fn check_narrow(value: u64) -> Result<Self, EncodingError>;

    /// Encodes `len` as a big-endian prefix of this width.
    fn encode_len<W: Write + ?Sized>(len: usize, out: &mut W) -> Result<(), EncodingError>;

    /// Decodes a big-endian prefix of this width.
    fn decode_len<R: InputStream + ?Sized>(r: &mut R) -> Result<u64, EncodingError>;
}

macro_rules! impl_len_prefix {
    ($($t:ty),* $(,)?) => {$(
        impl LenPrefix for $t {
            const MAX: u64 = <$t>::MAX as u64;

            fn check_narrow(value: u64) -> Result<Self, EncodingError> {
                if value >= <Self as LenPrefix>::MAX {
                    return Err(EncodingError::Overflow {
                        value,
                        max: <Self as LenPrefix>::MAX,
                    });
                }
                Ok(value as $t)
            }

            fn encode_len<W: Write + ?Sized>(
                len: usize,
                out: &mut W,
            ) -> Result<(), EncodingError> {
                Self::check_narrow(len as u64)?.encode_to(out)
            }

            fn decode_len<R: InputStream + ?Sized>(r: &mut R) -> Result<u64, EncodingError> {
                Ok(<$t>::decode_from(r)? as u64)
            }
        }
    )*};
}

impl_len_prefix!(u8, u16, u32, u64);

// ------------------------------------------------------------------------------------------------
// Scalar implementations - integers
// ------------------------------------------------------------------------------------------------

macro_rules! impl_int_codec {
    ($($t:ty),* $(,)?) => {$(
        impl Encode for $t {
            #[inline]
            fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
                out.write_all(&self.to_be_bytes())?;
                Ok(())
            }
        }

        impl Decode for $t {
            #[inline]
            fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
                let buf = r.read_exactly(size_of::<$t>())?;
                let mut bytes = [0u8; size_of::<$t>()];
                bytes.copy_from_slice(&buf);
                Ok(<$t>::from_be_bytes(bytes))
            }
        }

        impl ArrayMember for $t {
            fn decode_members<R: InputStream + ?Sized>(
                r: &mut R,
                count: usize,
            ) -> Result<Vec<Self>, EncodingError> {
                // Bulk path: one contiguous read, normalized in place.
                let buf = r.read_exactly(count * size_of::<$t>())?;
                let mut members = Vec::with_capacity(count);
                for chunk in buf.chunks_exact(size_of::<$t>()) {
                    let mut bytes = [0u8; size_of::<$t>()];
                    bytes.copy_from_slice(chunk);
                    members.push(<$t>::from_be_bytes(bytes));
                }
                Ok(members)
            }

            fn encode_members<W: Write + ?Sized>(
                members: &[Self],
                out: &mut W,
            ) -> Result<(), EncodingError> {
                let mut buf = Vec::with_capacity(members.len() * size_of::<$t>());
                for member in members {
                    buf.extend_from_slice(&member.to_be_bytes());
                }
                out.write_all(&buf)?;
                Ok(())
            }
        }
    )*};
}

impl_int_codec!(u8, u16, u32, u64, i8, i16, i32, i64);

// ------------------------------------------------------------------------------------------------
// Scalar implementations - bool
// ------------------------------------------------------------------------------------------------

impl Encode for bool {
    #[inline]
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        out.write_all(&[u8::from(*self)])?;
        Ok(())
    }
}

impl Decode for bool {
    #[inline]
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let buf = r.read_exactly(1)?;
        match buf[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(EncodingError::InvalidBool(other)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Scalar implementations - f64
// ------------------------------------------------------------------------------------------------

// Transported bit-for-bit through a big-endian u64 channel: the wire bytes
// are the big-endian byte order of the IEEE-754 bit pattern.

impl Encode for f64 {
    #[inline]
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        self.to_bits().encode_to(out)
    }
}

impl Decode for f64 {
    #[inline]
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        Ok(f64::from_bits(u64::decode_from(r)?))
    }
}

// ------------------------------------------------------------------------------------------------
// DiskString - sized opaque byte string
// ------------------------------------------------------------------------------------------------

/// A length-prefixed byte string whose prefix width is part of the type.
///
/// Embedding the prefix width in the type means the parser never has to spell
/// it out at each use site — `DiskString<u16>` and `DiskString<u32>` are
/// different wire shapes. The payload is opaque: no UTF-8 validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiskString<S: LenPrefix> {
    /// Raw payload bytes.
    pub value: Vec<u8>,
    _size: PhantomData<S>,
}

impl<S: LenPrefix> DiskString<S> {
    /// Wraps the given bytes.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            _size: PhantomData,
        }
    }

    /// Payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Returns `true` for a zero-length payload.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl<S: LenPrefix> From<&[u8]> for DiskString<S> {
    fn from(value: &[u8]) -> Self {
        Self::new(value.to_vec())
    }
}

impl<S: LenPrefix> From<&str> for DiskString<S> {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl<S: LenPrefix> Encode for DiskString<S> {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        S::encode_len(self.value.len(), out)?;
        out.write_all(&self.value)?;
        Ok(())
    }
}

impl<S: LenPrefix> Decode for DiskString<S> {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let len = S::decode_len(r)?;
        if len > MAX_BYTE_LEN {
            return Err(EncodingError::LengthLimit {
                len,
                limit: MAX_BYTE_LEN,
            });
        }
        Ok(Self::new(r.read_exactly(len as usize)?))
    }
}

impl<S: LenPrefix> ArrayMember for DiskString<S> {
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
// DiskArray - sized homogeneous sequence
// ------------------------------------------------------------------------------------------------

/// A counted sequence of `T` whose count-prefix width is part of the type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiskArray<S: LenPrefix, T> {
    /// Decoded members in wire order.
    pub elements: Vec<T>,
    _size: PhantomData<S>,
}

impl<S: LenPrefix, T> DiskArray<S, T> {
    /// Wraps the given members.
    pub fn new(elements: Vec<T>) -> Self {
        Self {
            elements,
            _size: PhantomData,
        }
    }

    /// Member count.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` when there are no members.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<S: LenPrefix, T> From<Vec<T>> for DiskArray<S, T> {
    fn from(elements: Vec<T>) -> Self {
        Self::new(elements)
    }
}

impl<S: LenPrefix, T: ArrayMember + Encode> Encode for DiskArray<S, T> {
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        S::encode_len(self.elements.len(), out)?;
        T::encode_members(&self.elements, out)
    }
}

impl<S: LenPrefix, T: ArrayMember + Decode> Decode for DiskArray<S, T> {
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let count = S::decode_len(r)?;
        if count > MAX_ELEMENT_COUNT {
            return Err(EncodingError::LengthLimit {
                len: count,
                limit: MAX_ELEMENT_COUNT,
            });
        }
        Ok(Self::new(T::decode_members(r, count as usize)?))
    }
}

// ------------------------------------------------------------------------------------------------
// DiskHash - sized key/value sequence
// ------------------------------------------------------------------------------------------------

/// A counted map of `K` to `V` whose count-prefix width is part of the type.
///
/// Backed by an insertion-ordered pair vector rather than a hash table: one
/// of the on-disk maps is keyed by `f64`, which implements neither `Hash` nor
/// `Eq`, and insertion order makes encoding deterministic. Duplicate keys on
/// decode overwrite the earlier value, matching map semantics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiskHash<S: LenPrefix, K, V> {
    entries: Vec<(K, V)>,
    _size: PhantomData<S>,
}

impl<S: LenPrefix, K: PartialEq, V> DiskHash<S, K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            _size: PhantomData,
        }
    }

    /// Inserts `key → value`, overwriting an existing entry in place.
    pub fn insert(&mut self, key: K, value: V) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Looks up the value for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Entries in insertion (wire) order.
    pub fn entries(&self) -> &[(K, V)] {
        &self.entries
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S, K, V> Encode for DiskHash<S, K, V>
where
    S: LenPrefix,
    K: Encode + PartialEq,
    V: Encode,
{
    fn encode_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<(), EncodingError> {
        S::encode_len(self.entries.len(), out)?;
        for (key, value) in &self.entries {
            key.encode_to(out)?;
            value.encode_to(out)?;
        }
        Ok(())
    }
}

impl<S, K, V> Decode for DiskHash<S, K, V>
where
    S: LenPrefix,
    K: Decode + PartialEq,
    V: Decode,
{
    fn decode_from<R: InputStream + ?Sized>(r: &mut R) -> Result<Self, EncodingError> {
        let count = S::decode_len(r)?;
        if count > MAX_ELEMENT_COUNT {
            return Err(EncodingError::LengthLimit {
                len: count,
                limit: MAX_ELEMENT_COUNT,
            });
        }
        let mut map = Self::new();
        for _ in 0..count {
            let key = K::decode_from(r)?;
            let value = V::decode_from(r)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

// ------------------------------------------------------------------------------------------------
// Convenience functions
// ------------------------------------------------------------------------------------------------

/// Encodes a value into a freshly allocated byte vector.
pub fn encode_to_vec<T: Encode>(value: &T) -> Result<Vec<u8>, EncodingError> {
    let mut buf = Vec::new();
    value.encode_to(&mut buf)?;
    Ok(buf)
}

/// Decodes a value from the front of a byte slice.
pub fn decode_from_slice<T: Decode>(bytes: &[u8]) -> Result<T, EncodingError> {
    let mut reader = crate::stream::MemoryReader::new(bytes.to_vec());
    T::decode_from(&mut reader)
}
