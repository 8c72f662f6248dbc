//! On-disk layout of the library header and the playlist record header.
//!
//! ```text
//! library header (1024 bytes)
//! ┌───────┬─────────────┬─────────┬──────────────┬────────────────────┐
//! │ magic │ media_count │ lib_len │ lib_name     │ media_prefix       │
//! │ 0..4  │ 4..8        │ 8..12   │ 12..128      │ 128..1024          │
//! └───────┴─────────────┴─────────┴──────────────┴────────────────────┘
//!
//! playlist record (length bytes)
//! ┌───────┬────────┬────────┬──────────┬─────────────────────────────┐
//! │ magic │ length │ mcount │ name     │ bucket                      │
//! │ 0..4  │ 4..8   │ 8..12  │ 12..128  │ 128..length                 │
//! └───────┴────────┴────────┴──────────┴─────────────────────────────┘
//! ```

use codec::{NameField, U32Field};

/// "MLIB"
pub const LIBRARY_MAGIC: u32 = 0x4d4c_4942;

/// Size of the library header. Playlist records start here.
pub const LIBRARY_HEADER_LEN: usize = 1024;

pub(crate) const LIB_MAGIC: U32Field = U32Field::at(0);
pub(crate) const LIB_MEDIA_COUNT: U32Field = U32Field::at(4);
pub(crate) const LIB_LEN: U32Field = U32Field::at(8);
pub(crate) const LIB_NAME: NameField = NameField::new(12, 116);
pub(crate) const LIB_MEDIA_PREFIX: NameField = NameField::new(128, 896);

/// "PLIS"
pub const PLAYLIST_MAGIC: u32 = 0x504c_4953;

/// Size of a playlist record header. The record's bucket starts here.
pub const PLAYLIST_HEADER_LEN: usize = 128;

pub(crate) const PL_MAGIC: U32Field = U32Field::at(0);
pub(crate) const PL_LENGTH: U32Field = U32Field::at(4);
pub(crate) const PL_MCOUNT: U32Field = U32Field::at(8);
pub(crate) const PL_NAME: NameField = NameField::new(12, 116);

/// Longest library name, in bytes, that fits with its terminator.
pub const MAX_LIBRARY_NAME_LEN: usize = LIB_NAME.max_value_len();

/// Longest media prefix, in bytes, that fits with its terminator.
pub const MAX_MEDIA_PREFIX_LEN: usize = LIB_MEDIA_PREFIX.max_value_len();

/// Longest playlist name, in bytes, that fits with its terminator.
pub const MAX_PLAYLIST_NAME_LEN: usize = PL_NAME.max_value_len();

/// Smallest well-formed playlist record: its header plus an empty bucket header.
pub const MIN_PLAYLIST_LEN: usize = PLAYLIST_HEADER_LEN + bucket::HEADER_BYTES;
