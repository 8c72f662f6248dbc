//! # Config - runtime knobs for a media library
//!
//! Settings are plain fields on [`LibraryConfig`] with sensible defaults.
//! They can be overridden from the environment:
//!
//! ```text
//!  MLIB_GROWTH_QUANTUM   - bucket growth step in bytes   (default: 128)
//!  MLIB_GLOBAL_PLAYLIST  - name of the mirror playlist   (default: ".global")
//!  MLIB_MIRROR_GLOBAL    - mirror every add into it      (default: "true")
//!  MLIB_SYNC_ON_CREATE   - sync after playlist creation  (default: "true")
//! ```
//!
//! Unparseable values fall back to the default. Semantic problems (a
//! quantum smaller than a bucket header, a mirror name that cannot be
//! stored in a playlist record) are caught by [`LibraryConfig::validate`].

use thiserror::Error;

pub use bucket::DEFAULT_GROWTH_QUANTUM;

/// Smallest usable growth step: one bucket header.
pub const MIN_GROWTH_QUANTUM: usize = bucket::HEADER_BYTES;

/// Longest mirror playlist name: the 116-byte record name field minus its
/// terminating NUL.
pub const MAX_GLOBAL_NAME_LEN: usize = 115;

/// Default name of the playlist that mirrors every added path.
pub const DEFAULT_GLOBAL_PLAYLIST: &str = ".global";

pub const ENV_GROWTH_QUANTUM: &str = "MLIB_GROWTH_QUANTUM";
pub const ENV_GLOBAL_PLAYLIST: &str = "MLIB_GLOBAL_PLAYLIST";
pub const ENV_MIRROR_GLOBAL: &str = "MLIB_MIRROR_GLOBAL";
pub const ENV_SYNC_ON_CREATE: &str = "MLIB_SYNC_ON_CREATE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("growth quantum {0} is below the minimum of 16 bytes")]
    QuantumTooSmall(usize),

    #[error("global playlist name must not be empty")]
    EmptyGlobalName,

    #[error("global playlist name is {0} bytes, longer than 115")]
    GlobalNameTooLong(usize),

    #[error("global playlist name contains a NUL byte")]
    GlobalNameHasNul,
}

/// Tunables for one open library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Bytes a playlist's bucket grows by when it runs out of room. Also the
    /// initial bucket size of a new playlist.
    pub growth_quantum: usize,
    /// Playlist that receives a copy of every path added anywhere.
    pub global_playlist: String,
    /// Whether `add_path` mirrors into [`global_playlist`](Self::global_playlist).
    pub mirror_to_global: bool,
    /// Whether creating a playlist flushes the mapping to disk.
    pub sync_on_playlist_create: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            growth_quantum: DEFAULT_GROWTH_QUANTUM,
            global_playlist: DEFAULT_GLOBAL_PLAYLIST.to_string(),
            mirror_to_global: true,
            sync_on_playlist_create: true,
        }
    }
}

impl LibraryConfig {
    /// Builds a config from `MLIB_*` environment variables over the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads through `lookup`.
    ///
    /// Lets callers (and tests) supply settings without touching the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env_or = |key: &str, default: String| lookup(key).unwrap_or(default);

        Self {
            growth_quantum: env_or(ENV_GROWTH_QUANTUM, defaults.growth_quantum.to_string())
                .trim()
                .parse()
                .unwrap_or(defaults.growth_quantum),
            global_playlist: env_or(ENV_GLOBAL_PLAYLIST, defaults.global_playlist.clone()),
            mirror_to_global: env_or(ENV_MIRROR_GLOBAL, defaults.mirror_to_global.to_string())
                .trim()
                .parse()
                .unwrap_or(defaults.mirror_to_global),
            sync_on_playlist_create: env_or(
                ENV_SYNC_ON_CREATE,
                defaults.sync_on_playlist_create.to_string(),
            )
            .trim()
            .parse()
            .unwrap_or(defaults.sync_on_playlist_create),
        }
    }

    /// Checks the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::QuantumTooSmall`] if `growth_quantum` cannot
    /// hold a bucket header, or one of the `GlobalName*` variants if the
    /// mirror playlist name is empty, too long or contains a NUL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.growth_quantum < MIN_GROWTH_QUANTUM {
            return Err(ConfigError::QuantumTooSmall(self.growth_quantum));
        }
        if self.global_playlist.is_empty() {
            return Err(ConfigError::EmptyGlobalName);
        }
        if self.global_playlist.len() > MAX_GLOBAL_NAME_LEN {
            return Err(ConfigError::GlobalNameTooLong(self.global_playlist.len()));
        }
        if self.global_playlist.contains('\0') {
            return Err(ConfigError::GlobalNameHasNul);
        }
        Ok(())
    }

    #[must_use]
    pub fn with_growth_quantum(mut self, quantum: usize) -> Self {
        self.growth_quantum = quantum;
        self
    }

    #[must_use]
    pub fn with_global_playlist(mut self, name: impl Into<String>) -> Self {
        self.global_playlist = name.into();
        self
    }

    #[must_use]
    pub fn with_mirror_to_global(mut self, mirror: bool) -> Self {
        self.mirror_to_global = mirror;
        self
    }

    #[must_use]
    pub fn with_sync_on_playlist_create(mut self, sync: bool) -> Self {
        self.sync_on_playlist_create = sync;
        self
    }
}
