//! The public handle collaborators use to work with a library.

use crate::container::{Container, VerifyReport};
use crate::error::{LibraryError, Result};
use crate::playlist::PlaylistInfo;
use crate::registry;
use bucket::BucketError;
use config::LibraryConfig;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Shared handle to an open library.
///
/// Cloning is cheap; all clones refer to the same mapped file and every
/// operation on it is serialised by one mutex. Once any clone calls
/// [`close`](Library::close), every clone reports [`LibraryError::Closed`].
///
/// An open library stays registered (and mapped) until it is explicitly
/// closed; dropping handles does not close it.
///
/// # Example
///
/// ```no_run
/// use library::Library;
///
/// # fn main() -> library::Result<()> {
/// Library::create("music.lib", "mymusic", "/music")?;
/// let lib = Library::open("music.lib")?;
/// lib.start_playlist("rock")?;
/// lib.add_path("rock", "/music/a.mp3")?;
/// assert_eq!(lib.find_path("rock", "/music/a.mp3")?, Some(0));
/// lib.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Library {
    inner: Arc<Mutex<Option<Container>>>,
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Library");
        match self.inner.try_lock() {
            Ok(guard) => match guard.as_ref() {
                Some(c) => s.field("path", &c.path()).field("state", &"open"),
                None => s.field("state", &"closed"),
            },
            Err(_) => s.field("state", &"busy"),
        };
        s.finish()
    }
}

impl Library {
    /// Creates an empty library file. Does not open it.
    pub fn create<P: AsRef<Path>>(path: P, name: &str, media_prefix: &str) -> Result<()> {
        Container::create(path, name, media_prefix)
    }

    /// Opens a library with configuration read from the environment.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, LibraryConfig::from_env())
    }

    /// Opens a library and registers it under its header name.
    ///
    /// # Errors
    ///
    /// Everything [`Container::open`] reports, plus
    /// [`LibraryError::AlreadyOpen`] if a library with the same name is open.
    pub fn open_with<P: AsRef<Path>>(path: P, config: LibraryConfig) -> Result<Self> {
        let container = Container::open(path, config)?;
        let name = container.name()?;
        let media_prefix = container.media_prefix()?;

        let library = Self {
            inner: Arc::new(Mutex::new(Some(container))),
        };
        registry::global().register(&name, &media_prefix, &library)?;
        Ok(library)
    }

    /// Unregisters, flushes, and unmaps the library.
    ///
    /// The mapping is released even if the final flush fails; that error is
    /// still returned.
    pub fn close(&self) -> Result<()> {
        registry::global().unregister(self)?;
        let container = self.lock()?.take().ok_or(LibraryError::Closed)?;
        container.close()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().map_or(true, |guard| guard.is_none())
    }

    pub(crate) fn same_as(&self, other: &Library) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Container>>> {
        self.inner.lock().map_err(|_| LibraryError::LockPoisoned)
    }

    fn with<T>(&self, f: impl FnOnce(&Container) -> Result<T>) -> Result<T> {
        let guard = self.lock()?;
        f(guard.as_ref().ok_or(LibraryError::Closed)?)
    }

    fn with_mut<T>(&self, f: impl FnOnce(&mut Container) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        f(guard.as_mut().ok_or(LibraryError::Closed)?)
    }

    pub fn sync(&self) -> Result<()> {
        self.with(Container::sync)
    }

    // ---------- header ----------

    pub fn path(&self) -> Result<PathBuf> {
        self.with(|c| Ok(c.path().to_path_buf()))
    }

    pub fn config(&self) -> Result<LibraryConfig> {
        self.with(|c| Ok(c.config().clone()))
    }

    pub fn name(&self) -> Result<String> {
        self.with(Container::name)
    }

    pub fn media_prefix(&self) -> Result<String> {
        self.with(Container::media_prefix)
    }

    /// Number of unique paths across the library, as tracked by the mirror
    /// playlist.
    pub fn media_count(&self) -> Result<usize> {
        self.with(|c| Ok(c.media_count()? as usize))
    }

    /// Total file length in bytes.
    pub fn len(&self) -> Result<usize> {
        self.with(Container::lib_len)
    }

    // ---------- playlists ----------

    pub fn start_playlist(&self, name: &str) -> Result<()> {
        self.with_mut(|c| c.start_playlist(name).map(drop))
    }

    pub fn find_playlist(&self, name: &str) -> Result<Option<PlaylistInfo>> {
        self.with(|c| match c.find_playlist(name)? {
            Some(pl) => c.playlist_info(pl).map(Some),
            None => Ok(None),
        })
    }

    /// Every playlist in file order.
    pub fn playlists(&self) -> Result<Vec<PlaylistInfo>> {
        self.with(|c| {
            c.playlist_handles()?
                .into_iter()
                .map(|pl| c.playlist_info(pl))
                .collect()
        })
    }

    pub fn delete_playlist(&self, name: &str) -> Result<()> {
        self.with_mut(|c| c.delete_playlist(name))
    }

    // ---------- paths ----------

    /// Adds `path` to `playlist`, mirroring it into the global playlist first.
    ///
    /// The global playlist is created on first use. A path that is already
    /// mirrored is not an error; a path already in `playlist` is
    /// ([`LibraryError::PathExists`]). A rejected path leaves the file as it was.
    pub fn add_path(&self, playlist: &str, path: &str) -> Result<()> {
        self.with_mut(|c| {
            let target = c.playlist(playlist)?;
            if path.contains('\0') {
                return Err(BucketError::InteriorNul.into());
            }
            if c.find_path(target, path)?.is_some() {
                return Err(LibraryError::PathExists(path.to_string()));
            }

            let global = c.config().global_playlist.clone();
            if c.config().mirror_to_global && playlist != global {
                let mirror = match c.find_playlist(&global)? {
                    Some(pl) => pl,
                    None => {
                        warn!(playlist = %global, "creating missing global playlist");
                        c.start_playlist(&global)?
                    }
                };
                match c.add_path_to_playlist(mirror, path) {
                    Ok(()) | Err(LibraryError::PathExists(_)) => {}
                    Err(e) => return Err(e),
                }
            }

            // growing the mirror may have moved the target
            let target = c.playlist(playlist)?;
            c.add_path_to_playlist(target, path)
        })
    }

    /// Sorted position of `path` within `playlist`, if present.
    pub fn find_path(&self, playlist: &str, path: &str) -> Result<Option<usize>> {
        self.with(|c| c.find_path(c.playlist(playlist)?, path))
    }

    /// All paths of `playlist` in sorted order.
    pub fn paths(&self, playlist: &str) -> Result<Vec<String>> {
        self.with(|c| c.paths(c.playlist(playlist)?))
    }

    pub fn path_at(&self, playlist: &str, n: usize) -> Result<Option<String>> {
        self.with(|c| c.path_at(c.playlist(playlist)?, n))
    }

    /// Removes `path` from `playlist` only; the mirror is left alone.
    pub fn remove_path(&self, playlist: &str, path: &str) -> Result<bool> {
        self.with_mut(|c| {
            let pl = c.playlist(playlist)?;
            c.remove_path(pl, path)
        })
    }

    /// Checks every structural invariant of the file.
    pub fn verify(&self) -> Result<VerifyReport> {
        self.with(Container::verify)
    }
}
