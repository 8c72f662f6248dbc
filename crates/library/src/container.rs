//! The library file itself: a 1 KiB header followed by playlist records,
//! mapped read-write with `memmap2`.
//!
//! Every operation that changes the file's size lives here. The mapping is
//! dropped and re-created around each `set_len`, so callers must not hold
//! slices into the image across [`Container::expand`],
//! [`Container::truncate`], [`Container::excise`] or
//! [`Container::insert_space`].

use crate::error::{LibraryError, Result};
use crate::header::{
    LIBRARY_HEADER_LEN, LIBRARY_MAGIC, LIB_LEN, LIB_MAGIC, LIB_MEDIA_COUNT, LIB_MEDIA_PREFIX,
    LIB_NAME, PLAYLIST_HEADER_LEN, PL_MCOUNT, PL_NAME,
};
use codec::NameField;
use config::LibraryConfig;
use memmap2::MmapMut;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An open, mapped library file.
///
/// `Container` is not synchronised; [`crate::Library`] wraps it in a mutex.
pub struct Container {
    path: PathBuf,
    file: File,
    /// `None` only if re-mapping after a resize failed.
    map: Option<MmapMut>,
    config: LibraryConfig,
}

/// Summary returned by [`Container::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    pub lib_len: usize,
    pub playlists: usize,
    pub paths: usize,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path)
            .field("mapped_len", &self.map.as_ref().map(|m| m.len()))
            .field("config", &self.config)
            .finish()
    }
}

fn check_name(field: &'static str, layout: NameField, value: &str) -> Result<()> {
    layout
        .check(value.as_bytes())
        .map_err(|source| LibraryError::InvalidField { field, source })
}

fn write_name(
    field: &'static str,
    layout: NameField,
    record: &mut [u8],
    value: &str,
) -> Result<()> {
    layout
        .set(record, value.as_bytes())
        .map_err(|source| LibraryError::InvalidField { field, source })
}

fn corrupt(msg: impl Into<String>) -> LibraryError {
    LibraryError::Corrupt(msg.into())
}

impl Container {
    /// Creates a new, empty library file at `path`.
    ///
    /// The file must not already exist. On success it holds only the
    /// 1024-byte header and has been flushed to disk. If anything fails
    /// after the file was created, the file is removed again.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::InvalidField`] if `name` or `media_prefix` does not
    ///   fit its header field with a terminating NUL.
    /// - [`LibraryError::Io`] if the file exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, name: &str, media_prefix: &str) -> Result<()> {
        let path = path.as_ref();
        check_name("library name", LIB_NAME, name)?;
        check_name("media prefix", LIB_MEDIA_PREFIX, media_prefix)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        if let Err(e) = Self::format(&file, name, media_prefix) {
            drop(file);
            let _ = fs::remove_file(path);
            return Err(e);
        }

        debug!(path = %path.display(), name, "created library");
        Ok(())
    }

    fn format(file: &File, name: &str, media_prefix: &str) -> Result<()> {
        file.set_len(LIBRARY_HEADER_LEN as u64)?;

        // SAFETY: the file was just created with create_new, so no other
        // mapping of it exists.
        let mut map = unsafe { MmapMut::map_mut(file)? };
        map.fill(0);
        LIB_MAGIC.set(&mut map, LIBRARY_MAGIC);
        LIB_MEDIA_COUNT.set(&mut map, 0);
        LIB_LEN.set(&mut map, LIBRARY_HEADER_LEN as u32);
        write_name("library name", LIB_NAME, &mut map, name)?;
        write_name("media prefix", LIB_MEDIA_PREFIX, &mut map, media_prefix)?;
        map.flush()?;
        Ok(())
    }

    /// Opens and maps an existing library read-write.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::Config`] if `config` fails validation.
    /// - [`LibraryError::NotALibrary`] if the file is shorter than a header
    ///   or has the wrong magic.
    /// - [`LibraryError::Corrupt`] if the header length disagrees with the
    ///   file size.
    pub fn open<P: AsRef<Path>>(path: P, config: LibraryConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let file_len = file.metadata()?.len();
        if file_len < LIBRARY_HEADER_LEN as u64 {
            return Err(LibraryError::NotALibrary(path));
        }
        if file_len > u64::from(u32::MAX) {
            return Err(corrupt(format!("file size {} exceeds 4 GiB", file_len)));
        }

        // SAFETY: the mapping is owned by this container and only touched
        // under the library's mutex. Concurrent external writers are
        // unsupported.
        let map = unsafe { MmapMut::map_mut(&file)? };
        if LIB_MAGIC.get(&map) != LIBRARY_MAGIC {
            return Err(LibraryError::NotALibrary(path));
        }
        let lib_len = u64::from(LIB_LEN.get(&map));
        if lib_len != file_len {
            return Err(corrupt(format!(
                "header length {} does not match file size {}",
                lib_len, file_len
            )));
        }

        debug!(path = %path.display(), len = file_len, "opened library");
        Ok(Self {
            path,
            file,
            map: Some(map),
            config,
        })
    }

    /// Flushes and unmaps the library.
    ///
    /// The mapping and the file are released even if the flush fails; the
    /// flush error is then returned.
    pub fn close(mut self) -> Result<()> {
        let flushed = match self.map.as_ref() {
            Some(map) => map.flush(),
            None => Ok(()),
        };
        self.map = None;

        if let Err(e) = flushed {
            warn!(path = %self.path.display(), error = %e, "flush on close failed");
            return Err(e.into());
        }
        debug!(path = %self.path.display(), "closed library");
        Ok(())
    }

    /// Synchronously flushes the mapping to disk.
    pub fn sync(&self) -> Result<()> {
        self.map.as_ref().ok_or(LibraryError::Unmapped)?.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub(crate) fn bytes(&self) -> Result<&[u8]> {
        self.map.as_deref().ok_or(LibraryError::Unmapped)
    }

    pub(crate) fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        self.map.as_deref_mut().ok_or(LibraryError::Unmapped)
    }

    /// Infallible image view for the bucket growth seam. Empty when unmapped.
    pub(crate) fn image(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    pub(crate) fn image_mut(&mut self) -> &mut [u8] {
        self.map.as_deref_mut().unwrap_or(&mut [])
    }

    // ---------- header ----------

    /// Total library length as recorded in the header.
    pub fn lib_len(&self) -> Result<usize> {
        Ok(LIB_LEN.get(self.bytes()?) as usize)
    }

    pub fn name(&self) -> Result<String> {
        Ok(LIB_NAME.to_string_lossy(self.bytes()?))
    }

    pub fn media_prefix(&self) -> Result<String> {
        Ok(LIB_MEDIA_PREFIX.to_string_lossy(self.bytes()?))
    }

    pub fn media_count(&self) -> Result<u32> {
        Ok(LIB_MEDIA_COUNT.get(self.bytes()?))
    }

    pub(crate) fn set_media_count(&mut self, count: u32) -> Result<()> {
        LIB_MEDIA_COUNT.set(self.bytes_mut()?, count);
        Ok(())
    }

    // ---------- geometry ----------

    /// Resizes the file and re-maps it, then records the new length.
    fn resize(&mut self, new_len: usize) -> Result<()> {
        let header_len = u32::try_from(new_len).map_err(|_| LibraryError::TooLarge)?;

        self.map = None;
        let resized = self.file.set_len(new_len as u64);
        // SAFETY: see `open`; the previous mapping was dropped above.
        let mut map = unsafe { MmapMut::map_mut(&self.file)? };
        if let Err(e) = resized {
            // file kept its old size; keep serving the old extent
            self.map = Some(map);
            return Err(e.into());
        }
        LIB_LEN.set(&mut map, header_len);
        self.map = Some(map);
        Ok(())
    }

    /// Grows the file to `new_len` bytes. The new tail reads as zeros.
    ///
    /// # Errors
    ///
    /// [`LibraryError::InvalidArgument`] unless `new_len` is larger than the
    /// current length, [`LibraryError::TooLarge`] past 4 GiB.
    pub fn expand(&mut self, new_len: usize) -> Result<()> {
        let old_len = self.lib_len()?;
        if new_len <= old_len {
            return Err(LibraryError::InvalidArgument(format!(
                "expand to {} does not grow a {}-byte library",
                new_len, old_len
            )));
        }
        self.resize(new_len)?;
        debug!(from = old_len, to = new_len, "expanded library");
        Ok(())
    }

    /// Shrinks the file to `new_len` bytes, discarding the tail.
    ///
    /// `new_len` must lie in `[1024, lib_len]`.
    pub fn truncate(&mut self, new_len: usize) -> Result<()> {
        let old_len = self.lib_len()?;
        if new_len < LIBRARY_HEADER_LEN || new_len > old_len {
            return Err(LibraryError::InvalidArgument(format!(
                "truncate to {} outside [{}, {}]",
                new_len, LIBRARY_HEADER_LEN, old_len
            )));
        }
        if new_len == old_len {
            return Ok(());
        }
        self.resize(new_len)?;
        debug!(from = old_len, to = new_len, "truncated library");
        Ok(())
    }

    /// Removes `[start, end)` from the file, closing the gap.
    ///
    /// ```text
    /// before: | header | A | start..end | B |
    /// after:  | header | A | B |
    /// ```
    pub fn excise(&mut self, start: usize, end: usize) -> Result<()> {
        let old_len = self.lib_len()?;
        if start < LIBRARY_HEADER_LEN || start > end || end > old_len {
            return Err(LibraryError::InvalidArgument(format!(
                "excise [{}, {}) outside [{}, {}]",
                start, end, LIBRARY_HEADER_LEN, old_len
            )));
        }
        if start == end {
            return Ok(());
        }
        self.shift(end..old_len, start)?;
        self.truncate(old_len - (end - start))?;
        debug!(start, end, "excised range");
        Ok(())
    }

    /// Opens a zero-filled gap of `len` bytes at `offset`, moving everything
    /// from `offset` onward up.
    ///
    /// `offset` must lie in `[1024, lib_len]`.
    pub fn insert_space(&mut self, offset: usize, len: usize) -> Result<()> {
        let old_len = self.lib_len()?;
        if offset < LIBRARY_HEADER_LEN || offset > old_len {
            return Err(LibraryError::InvalidArgument(format!(
                "insert at {} outside [{}, {}]",
                offset, LIBRARY_HEADER_LEN, old_len
            )));
        }
        if len == 0 {
            return Ok(());
        }
        let new_len = old_len.checked_add(len).ok_or(LibraryError::TooLarge)?;
        self.expand(new_len)?;
        self.shift(offset..old_len, offset + len)?;
        self.bytes_mut()?[offset..offset + len].fill(0);
        Ok(())
    }

    /// Moves the bytes in `src` so they start at `dest`. Ranges may overlap.
    ///
    /// Every relocation in the library goes through here.
    pub fn shift(&mut self, src: Range<usize>, dest: usize) -> Result<()> {
        let image = self.bytes_mut()?;
        let fits = src.start <= src.end
            && src.end <= image.len()
            && dest
                .checked_add(src.end - src.start)
                .map_or(false, |end| end <= image.len());
        if !fits {
            return Err(LibraryError::InvalidArgument(format!(
                "shift {:?} -> {} outside a {}-byte image",
                src,
                dest,
                image.len()
            )));
        }
        image.copy_within(src, dest);
        Ok(())
    }

    // ---------- integrity ----------

    /// Walks the whole file and checks every structural invariant.
    ///
    /// Checks header magic and length against the file size, each playlist's
    /// magic and bounds, bucket geometry and ordering, `mcount` against the
    /// bucket's entry count, unique playlist names, that the records exactly
    /// fill the file, and that `media_count` matches the mirror playlist.
    pub fn verify(&self) -> Result<VerifyReport> {
        let image = self.bytes()?;
        if LIB_MAGIC.get(image) != LIBRARY_MAGIC {
            return Err(corrupt("bad library magic"));
        }
        let lib_len = LIB_LEN.get(image) as usize;
        let file_len = self.file.metadata()?.len();
        if lib_len != image.len() || lib_len as u64 != file_len {
            return Err(corrupt(format!(
                "header length {} vs mapped {} vs file {}",
                lib_len,
                image.len(),
                file_len
            )));
        }

        let mut covered = LIBRARY_HEADER_LEN;
        let mut playlists = 0;
        let mut paths = 0;
        let mut names = HashSet::new();
        let mut mirrored = None;

        let mut cursor = None;
        while let Some(pl) = self.next_playlist(cursor)? {
            let record = self.record(pl)?;
            let bucket = self.bucket(pl)?;

            if PLAYLIST_HEADER_LEN + bucket.len() != record.len() {
                return Err(corrupt(format!(
                    "bucket of {} bytes does not fill playlist at {}",
                    bucket.len(),
                    pl.offset()
                )));
            }
            let mcount = PL_MCOUNT.get(record) as usize;
            if mcount != bucket.index_count() {
                return Err(corrupt(format!(
                    "playlist at {} counts {} paths but holds {}",
                    pl.offset(),
                    mcount,
                    bucket.index_count()
                )));
            }
            bucket.validate_order()?;

            let name = PL_NAME.get(record);
            if !names.insert(name) {
                return Err(corrupt(format!(
                    "duplicate playlist name `{}`",
                    String::from_utf8_lossy(name)
                )));
            }
            if name == self.config.global_playlist.as_bytes() {
                mirrored = Some(mcount);
            }

            covered += record.len();
            playlists += 1;
            paths += mcount;
            cursor = Some(pl);
        }

        if covered != lib_len {
            return Err(corrupt(format!(
                "records cover {} of {} bytes",
                covered, lib_len
            )));
        }
        let media_count = LIB_MEDIA_COUNT.get(image) as usize;
        if media_count != mirrored.unwrap_or(0) {
            return Err(corrupt(format!(
                "media_count {} disagrees with `{}`",
                media_count, self.config.global_playlist
            )));
        }

        Ok(VerifyReport {
            lib_len,
            playlists,
            paths,
        })
    }
}
