//! Playlist records: named, length-prefixed records laid end to end after
//! the library header, each embedding one bucket of media paths.
//!
//! Records are addressed by [`Playlist`] handles, which are byte offsets into
//! the library. A handle is only meaningful until the next operation that
//! moves records (deleting a playlist, or growing an earlier one); every use
//! re-checks the record's magic, so a stale handle fails with
//! [`LibraryError::Corrupt`] instead of reading garbage.

use crate::container::Container;
use crate::error::{into_io, LibraryError, Result};
use crate::header::{
    LIBRARY_HEADER_LEN, MIN_PLAYLIST_LEN, PLAYLIST_HEADER_LEN, PLAYLIST_MAGIC, PL_LENGTH,
    PL_MAGIC, PL_MCOUNT, PL_NAME,
};
use bucket::{Bucket, BucketError, BucketHost, BucketMut};
use std::io;
use tracing::debug;

/// Offset of a playlist record within its library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Playlist {
    offset: usize,
}

impl Playlist {
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Owned description of a playlist, safe to keep across mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub name: String,
    /// Number of paths stored.
    pub count: usize,
    /// Record length in bytes, header and bucket included.
    pub length: usize,
}

/// Lets a playlist's bucket grow inside the library file.
///
/// Space opened for the bucket is also added to the owning record's length.
struct PlaylistHost<'c> {
    container: &'c mut Container,
    record: usize,
}

impl BucketHost for PlaylistHost<'_> {
    fn bytes(&self) -> &[u8] {
        self.container.image()
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.container.image_mut()
    }

    fn insert_space(&mut self, offset: usize, len: usize) -> io::Result<()> {
        self.container.insert_space(offset, len).map_err(into_io)?;

        let record = &mut self.container.image_mut()[self.record..];
        let grown = PL_LENGTH.get(record) as usize + len;
        let grown = u32::try_from(grown).map_err(|_| into_io(LibraryError::TooLarge))?;
        PL_LENGTH.set(record, grown);
        Ok(())
    }
}

fn corrupt(msg: impl Into<String>) -> LibraryError {
    LibraryError::Corrupt(msg.into())
}

impl Container {
    /// Validates the record at `offset` and returns its length.
    fn check_record(&self, offset: usize) -> Result<usize> {
        let image = self.bytes()?;
        let header_fits = offset >= LIBRARY_HEADER_LEN
            && offset
                .checked_add(PLAYLIST_HEADER_LEN)
                .map_or(false, |end| end <= image.len());
        if !header_fits {
            return Err(corrupt(format!(
                "playlist header at {} overruns a {}-byte library",
                offset,
                image.len()
            )));
        }

        let record = &image[offset..];
        let magic = PL_MAGIC.get(record);
        if magic != PLAYLIST_MAGIC {
            return Err(corrupt(format!(
                "bad playlist magic {:#010x} at {}",
                magic, offset
            )));
        }
        let length = PL_LENGTH.get(record) as usize;
        if length < MIN_PLAYLIST_LEN {
            return Err(corrupt(format!(
                "playlist at {} claims {} bytes, below the {}-byte minimum",
                offset, length, MIN_PLAYLIST_LEN
            )));
        }
        if length > record.len() {
            return Err(corrupt(format!(
                "playlist at {} of {} bytes overruns the library",
                offset, length
            )));
        }
        Ok(length)
    }

    pub(crate) fn record(&self, pl: Playlist) -> Result<&[u8]> {
        let length = self.check_record(pl.offset)?;
        Ok(&self.bytes()?[pl.offset..pl.offset + length])
    }

    fn record_mut(&mut self, pl: Playlist) -> Result<&mut [u8]> {
        let length = self.check_record(pl.offset)?;
        Ok(&mut self.bytes_mut()?[pl.offset..pl.offset + length])
    }

    pub(crate) fn bucket(&self, pl: Playlist) -> Result<Bucket<'_>> {
        let record = self.record(pl)?;
        Ok(Bucket::open(&record[PLAYLIST_HEADER_LEN..])?)
    }

    // ---------- iteration ----------

    /// Steps through the records in file order.
    ///
    /// `None` starts at the first record. Returns `Ok(None)` once the walk
    /// reaches the end of the library, and [`LibraryError::Corrupt`] if a
    /// record has a bad magic or a length that is too small or overruns.
    pub fn next_playlist(&self, prev: Option<Playlist>) -> Result<Option<Playlist>> {
        let start = match prev {
            None => LIBRARY_HEADER_LEN,
            Some(p) => p.offset + self.check_record(p.offset)?,
        };
        if start >= self.bytes()?.len() {
            return Ok(None);
        }
        self.check_record(start)?;
        Ok(Some(Playlist { offset: start }))
    }

    /// All records in file order.
    pub fn playlist_handles(&self) -> Result<Vec<Playlist>> {
        let mut out = Vec::new();
        let mut cursor = None;
        while let Some(pl) = self.next_playlist(cursor)? {
            out.push(pl);
            cursor = Some(pl);
        }
        Ok(out)
    }

    /// Linear scan for a playlist by exact name.
    pub fn find_playlist(&self, name: &str) -> Result<Option<Playlist>> {
        let mut cursor = None;
        while let Some(pl) = self.next_playlist(cursor)? {
            if PL_NAME.matches(self.record(pl)?, name.as_bytes()) {
                return Ok(Some(pl));
            }
            cursor = Some(pl);
        }
        Ok(None)
    }

    /// Like [`find_playlist`](Self::find_playlist) but a miss is an error.
    pub fn playlist(&self, name: &str) -> Result<Playlist> {
        self.find_playlist(name)?
            .ok_or_else(|| LibraryError::PlaylistNotFound(name.to_string()))
    }

    pub fn playlist_info(&self, pl: Playlist) -> Result<PlaylistInfo> {
        let record = self.record(pl)?;
        Ok(PlaylistInfo {
            name: PL_NAME.to_string_lossy(record),
            count: PL_MCOUNT.get(record) as usize,
            length: record.len(),
        })
    }

    // ---------- lifecycle ----------

    /// Appends a new, empty playlist at the end of the library.
    ///
    /// The record gets a bucket of `growth_quantum` bytes. If
    /// `sync_on_playlist_create` is set the mapping is flushed before
    /// returning.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::PlaylistExists`] if the name is taken.
    /// - [`LibraryError::InvalidArgument`] for an empty name.
    /// - [`LibraryError::InvalidField`] for a name with a NUL byte or one
    ///   longer than [`MAX_PLAYLIST_NAME_LEN`](crate::MAX_PLAYLIST_NAME_LEN).
    pub fn start_playlist(&mut self, name: &str) -> Result<Playlist> {
        if self.find_playlist(name)?.is_some() {
            return Err(LibraryError::PlaylistExists(name.to_string()));
        }
        if name.is_empty() {
            return Err(LibraryError::InvalidArgument(
                "playlist name must not be empty".to_string(),
            ));
        }
        PL_NAME
            .check(name.as_bytes())
            .map_err(|source| LibraryError::InvalidField {
                field: "playlist name",
                source,
            })?;

        let quantum = self.config().growth_quantum;
        let offset = self.lib_len()?;
        let length = PLAYLIST_HEADER_LEN + quantum;
        self.expand(offset.checked_add(length).ok_or(LibraryError::TooLarge)?)?;

        let record = &mut self.bytes_mut()?[offset..offset + length];
        PL_MAGIC.set(record, PLAYLIST_MAGIC);
        PL_LENGTH.set(record, length as u32);
        PL_MCOUNT.set(record, 0);
        PL_NAME
            .set(record, name.as_bytes())
            .map_err(|source| LibraryError::InvalidField {
                field: "playlist name",
                source,
            })?;
        BucketMut::init(&mut record[PLAYLIST_HEADER_LEN..], quantum)?;

        if self.config().sync_on_playlist_create {
            self.sync()?;
        }
        debug!(name, offset, length, "created playlist");
        Ok(Playlist { offset })
    }

    /// Physically removes a playlist; later records slide down.
    pub fn delete_playlist(&mut self, name: &str) -> Result<()> {
        let pl = self.playlist(name)?;
        let length = self.check_record(pl.offset)?;
        self.excise(pl.offset, pl.offset + length)?;

        if name == self.config().global_playlist {
            self.set_media_count(0)?;
        }
        debug!(name, offset = pl.offset, length, "deleted playlist");
        Ok(())
    }

    // ---------- paths ----------

    /// Inserts `path` into the playlist's bucket, growing the record (and
    /// shifting every later record) if the bucket is full.
    ///
    /// # Errors
    ///
    /// [`LibraryError::PathExists`] if the path is already present; the file
    /// is untouched in that case.
    pub fn add_path_to_playlist(&mut self, pl: Playlist, path: &str) -> Result<()> {
        self.check_record(pl.offset)?;
        let quantum = self.config().growth_quantum;

        let mut host = PlaylistHost {
            container: self,
            record: pl.offset,
        };
        bucket::add(&mut host, pl.offset + PLAYLIST_HEADER_LEN, path, quantum).map_err(
            |e| match e {
                BucketError::Duplicate => LibraryError::PathExists(path.to_string()),
                other => other.into(),
            },
        )?;

        let record = self.record_mut(pl)?;
        let count = PL_MCOUNT.get(record).saturating_add(1);
        PL_MCOUNT.set(record, count);
        self.refresh_media_count(pl)
    }

    /// Removes `path` from the playlist. Returns whether it was present.
    ///
    /// The record keeps its length; the freed bytes become free space in
    /// its bucket.
    pub fn remove_path(&mut self, pl: Playlist, path: &str) -> Result<bool> {
        let record = self.record_mut(pl)?;
        let removed = BucketMut::open(&mut record[PLAYLIST_HEADER_LEN..])?.remove(path)?;
        if !removed {
            return Ok(false);
        }
        let count = PL_MCOUNT.get(record).saturating_sub(1);
        PL_MCOUNT.set(record, count);
        self.refresh_media_count(pl)?;
        Ok(true)
    }

    /// Sorted position of `path` in the playlist, if present.
    pub fn find_path(&self, pl: Playlist, path: &str) -> Result<Option<usize>> {
        Ok(self.bucket(pl)?.contains(path)?)
    }

    /// The `n`-th path in sorted order.
    pub fn path_at(&self, pl: Playlist, n: usize) -> Result<Option<String>> {
        Ok(self.bucket(pl)?.ordinal(n)?.map(str::to_string))
    }

    /// All paths in sorted order.
    pub fn paths(&self, pl: Playlist) -> Result<Vec<String>> {
        self.bucket(pl)?
            .iter()
            .map(|path| path.map(str::to_string).map_err(LibraryError::from))
            .collect()
    }

    /// Keeps the header's media count in step with the mirror playlist.
    fn refresh_media_count(&mut self, pl: Playlist) -> Result<()> {
        let record = self.record(pl)?;
        if !PL_NAME.matches(record, self.config().global_playlist.as_bytes()) {
            return Ok(());
        }
        let count = PL_MCOUNT.get(record);
        self.set_media_count(count)
    }
}
