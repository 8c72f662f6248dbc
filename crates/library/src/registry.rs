//! Process-wide list of open libraries.
//!
//! Libraries are keyed by the name stored in their header, so two different
//! files that share a name cannot be open at once, while the same file
//! reached through two paths is only caught if the names match.

use crate::error::{LibraryError, Result};
use crate::query::Library;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

struct Entry {
    name: String,
    media_prefix: String,
    library: Library,
}

/// Name and media prefix of an open library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenLibrary {
    pub name: String,
    pub media_prefix: String,
}

/// Set of open libraries guarded by a single mutex.
///
/// The registry never takes a library's lock, so it can be consulted while
/// any library is busy.
pub struct Registry {
    entries: Mutex<Vec<Entry>>,
}

static GLOBAL: Registry = Registry::new();

/// The registry used by [`Library::open`] and [`Library::close`].
#[must_use]
pub fn global() -> &'static Registry {
    &GLOBAL
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, Vec<Entry>>> {
        self.entries.lock().map_err(|_| LibraryError::LockPoisoned)
    }

    /// Adds `library` under `name`, failing if the name is already taken.
    ///
    /// The check and the insert happen under one lock.
    pub fn register(&self, name: &str, media_prefix: &str, library: &Library) -> Result<()> {
        let mut entries = self.entries()?;
        if entries.iter().any(|e| e.name == name) {
            return Err(LibraryError::AlreadyOpen(name.to_string()));
        }
        entries.push(Entry {
            name: name.to_string(),
            media_prefix: media_prefix.to_string(),
            library: library.clone(),
        });
        debug!(name, open = entries.len(), "registered library");
        Ok(())
    }

    /// Drops `library` from the registry. Returns whether it was present.
    pub fn unregister(&self, library: &Library) -> Result<bool> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|e| !e.library.same_as(library));
        Ok(entries.len() != before)
    }

    pub fn find_open_by_name(&self, name: &str) -> Result<Option<Library>> {
        Ok(self
            .entries()?
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.library.clone()))
    }

    pub fn is_name_open(&self, name: &str) -> Result<bool> {
        Ok(self.entries()?.iter().any(|e| e.name == name))
    }

    /// Every open library, in the order they were opened.
    pub fn open_libraries(&self) -> Result<Vec<OpenLibrary>> {
        Ok(self
            .entries()?
            .iter()
            .map(|e| OpenLibrary {
                name: e.name.clone(),
                media_prefix: e.media_prefix.clone(),
            })
            .collect())
    }
}
