use crate::{Container, Library, LibraryConfig};
use anyhow::Result;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// A library name no other test in this process uses; the registry is global.
pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Defaults minus the per-playlist fsync.
pub fn quiet_config() -> LibraryConfig {
    LibraryConfig::default().with_sync_on_playlist_create(false)
}

pub fn new_container(dir: &Path) -> Result<Container> {
    new_container_with(dir, quiet_config())
}

pub fn new_container_with(dir: &Path, config: LibraryConfig) -> Result<Container> {
    let path = dir.join("test.lib");
    Container::create(&path, "test", "/music")?;
    Ok(Container::open(&path, config)?)
}

pub fn new_library(dir: &Path) -> Result<Library> {
    new_library_with(dir, quiet_config())
}

pub fn new_library_with(dir: &Path, config: LibraryConfig) -> Result<Library> {
    let path = dir.join("test.lib");
    Library::create(&path, &unique_name("lib"), "/music")?;
    Ok(Library::open_with(&path, config)?)
}

pub fn media_path(i: usize) -> String {
    format!("/music/album{:02}/track{:04}.mp3", i % 7, i)
}
