//! # Library - single-file media library storage
//!
//! A library is one memory-mapped file holding a fixed header and a run of
//! playlist records. Each playlist embeds a sorted [`bucket`] of media
//! paths. All mutation happens in place on the mapped bytes; the file is its
//! own in-memory representation.
//!
//! ## File layout
//!
//! ```text
//! 0           1024
//! ┌───────────┬─────────────────┬────────────────────┬─────┬───────────┐
//! │ HEADER    │ playlist "rock" │ playlist ".global" │ ... │ playlist N│
//! │ magic,len │ hdr | bucket    │ hdr | bucket       │     │           │
//! └───────────┴─────────────────┴────────────────────┴─────┴───────────┘
//!                                                               lib_len
//! ```
//!
//! Records are contiguous: `1024 + Σ record length == lib_len == file size`.
//! Growing a bucket opens space inside its record, which shifts every later
//! record up; deleting a playlist excises its record and shifts the rest
//! down.
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                                 |
//! |----------------|---------------------------------------------------------|
//! | [`header`]     | Byte layout of the library and playlist headers         |
//! | [`container`]  | Create/open/close, expand, truncate, excise, verify     |
//! | `playlist`     | Record iteration, create/delete, path add/remove/lookup |
//! | [`registry`]   | Process-wide set of open libraries, keyed by name       |
//! | `query`        | [`Library`], the shared, locked handle                  |
//! | [`filter`]     | Media extension matching                                |
//!
//! ## Mirroring
//!
//! Every path added through [`Library::add_path`] is first added to a global
//! playlist (`.global` by default, see [`config::LibraryConfig`]), which is
//! created on demand. The header's `media_count` tracks that playlist's size.
//!
//! ## Logging
//!
//! Structural changes emit `tracing` events at `debug`, bucket activity at
//! `trace`. No subscriber is installed here.

pub mod container;
mod error;
pub mod filter;
pub mod header;
mod playlist;
mod query;
pub mod registry;

pub use config::LibraryConfig;
pub use container::{Container, VerifyReport};
pub use error::{ErrorKind, LibraryError, Result};
pub use filter::{filter, is_media_file, parse_list, AUDIO_EXTENSIONS, VIDEO_EXTENSIONS};
pub use header::{
    LIBRARY_HEADER_LEN, MAX_LIBRARY_NAME_LEN, MAX_MEDIA_PREFIX_LEN, MAX_PLAYLIST_NAME_LEN,
    PLAYLIST_HEADER_LEN,
};
pub use playlist::{Playlist, PlaylistInfo};
pub use query::Library;
pub use registry::{OpenLibrary, Registry};

#[cfg(test)]
mod tests;
