//! # Codec - on-disk byte order and typed field access
//!
//! Every structure in an mlib library file is a packed run of big-endian
//! `u32` fields and fixed-width, NUL-padded name fields. This crate is the
//! only place that knows about byte order: the other crates describe their
//! layouts as [`U32Field`] and [`NameField`] constants and never touch raw
//! integers in host order.
//!
//! ## Example
//!
//! ```rust
//! use codec::{NameField, U32Field};
//!
//! const MAGIC: U32Field = U32Field::at(0);
//! const NAME: NameField = NameField::new(4, 12);
//!
//! let mut record = [0u8; 16];
//! MAGIC.set(&mut record, 0x4d4c_4942);
//! NAME.set(&mut record, b"rock").unwrap();
//!
//! assert_eq!(&record[..4], b"MLIB");
//! assert_eq!(NAME.get(&record), b"rock");
//! ```

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

/// Byte order used for every integer stored in a library file.
pub type DiskOrder = BigEndian;

/// Width in bytes of a stored `u32`.
pub const U32_BYTES: usize = 4;

/// Errors raised when encoding a value into a fixed-width field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The value plus its NUL terminator does not fit in the field.
    #[error("value of {len} bytes does not fit in a {capacity}-byte field (NUL included)")]
    TooLong {
        /// Length of the rejected value, without terminator.
        len: usize,
        /// Width of the destination field.
        capacity: usize,
    },

    /// The value contains a NUL byte, which would truncate it on read.
    #[error("value contains an interior NUL byte")]
    InteriorNul,
}

/// Reads a disk-order `u32` at `offset`.
///
/// # Panics
///
/// Panics if `offset + 4` is past the end of `buf`. Callers bound-check
/// record extents before reading fields.
#[inline]
#[must_use]
pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    DiskOrder::read_u32(&buf[offset..offset + U32_BYTES])
}

/// Writes `value` as a disk-order `u32` at `offset`.
///
/// # Panics
///
/// Panics if `offset + 4` is past the end of `buf`.
#[inline]
pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    DiskOrder::write_u32(&mut buf[offset..offset + U32_BYTES], value);
}

/// A `u32` field at a fixed offset inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct U32Field {
    offset: usize,
}

impl U32Field {
    /// Declares a field starting `offset` bytes into its record.
    #[must_use]
    pub const fn at(offset: usize) -> Self {
        Self { offset }
    }

    /// Offset of the field from the start of its record.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// First byte past the field.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + U32_BYTES
    }

    /// Reads the field from `record`.
    #[inline]
    #[must_use]
    pub fn get(&self, record: &[u8]) -> u32 {
        read_u32(record, self.offset)
    }

    /// Writes the field into `record`.
    #[inline]
    pub fn set(&self, record: &mut [u8], value: u32) {
        write_u32(record, self.offset, value);
    }
}

/// A fixed-width, NUL-padded byte string inside a record.
///
/// Stored values always keep at least one trailing NUL, so a field of
/// `len` bytes holds at most `len - 1` bytes of payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameField {
    offset: usize,
    len: usize,
}

impl NameField {
    /// Declares a `len`-byte field starting `offset` bytes into its record.
    #[must_use]
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Offset of the field from the start of its record.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Width of the field in bytes, terminator included.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.len
    }

    /// First byte past the field.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Largest payload the field accepts.
    #[must_use]
    pub const fn max_value_len(&self) -> usize {
        self.len.saturating_sub(1)
    }

    /// Checks that `value` could be stored without truncation.
    pub fn check(&self, value: &[u8]) -> Result<(), CodecError> {
        if value.contains(&0) {
            return Err(CodecError::InteriorNul);
        }
        if value.len() + 1 > self.len {
            return Err(CodecError::TooLong {
                len: value.len(),
                capacity: self.len,
            });
        }
        Ok(())
    }

    /// Returns the stored bytes up to (not including) the first NUL.
    ///
    /// A field with no NUL at all yields its full width.
    #[must_use]
    pub fn get<'a>(&self, record: &'a [u8]) -> &'a [u8] {
        let raw = &record[self.offset..self.end()];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        &raw[..end]
    }

    /// Lossy UTF-8 view of the stored value.
    #[must_use]
    pub fn to_string_lossy(&self, record: &[u8]) -> String {
        String::from_utf8_lossy(self.get(record)).into_owned()
    }

    /// Zero-fills the field and stores `value` at its start.
    pub fn set(&self, record: &mut [u8], value: &[u8]) -> Result<(), CodecError> {
        self.check(value)?;
        let raw = &mut record[self.offset..self.end()];
        raw.fill(0);
        raw[..value.len()].copy_from_slice(value);
        Ok(())
    }

    /// Compares the stored value against `name`, bounded by the field width.
    #[must_use]
    pub fn matches(&self, record: &[u8], name: &[u8]) -> bool {
        self.get(record) == name
    }
}
