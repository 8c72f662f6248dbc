use super::helpers::*;
use crate::header::*;
use crate::*;
use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use tempfile::tempdir;

// --------------------- Create ---------------------

#[test]
fn create_writes_header() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("t.lib");
    Container::create(&path, "mymusic", "/music")?;

    let bytes = fs::read(&path)?;
    assert_eq!(bytes.len(), LIBRARY_HEADER_LEN);
    assert_eq!(&bytes[0..4], b"MLIB");
    assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
    assert_eq!(&bytes[8..12], &[0, 0, 4, 0]);
    assert_eq!(&bytes[12..19], b"mymusic");
    assert!(bytes[19..128].iter().all(|&b| b == 0));
    assert_eq!(&bytes[128..134], b"/music");
    assert!(bytes[134..].iter().all(|&b| b == 0));
    Ok(())
}

#[test]
fn create_refuses_existing_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("t.lib");
    Container::create(&path, "a", "/a")?;

    let err = Container::create(&path, "b", "/b").unwrap_err();
    assert!(matches!(err, LibraryError::Io(ref e) if e.kind() == std::io::ErrorKind::AlreadyExists));
    // the existing file survives
    let c = Container::open(&path, quiet_config())?;
    assert_eq!(c.name()?, "a");
    Ok(())
}

#[test]
fn create_checks_field_widths() -> Result<()> {
    let dir = tempdir()?;

    let longest = "n".repeat(MAX_LIBRARY_NAME_LEN);
    Container::create(dir.path().join("ok.lib"), &longest, "/m")?;

    let path = dir.path().join("long.lib");
    let err = Container::create(&path, &"n".repeat(MAX_LIBRARY_NAME_LEN + 1), "/m").unwrap_err();
    assert!(matches!(err, LibraryError::InvalidField { field: "library name", .. }));
    assert!(!path.exists());

    let err = Container::create(&path, "x", &"p".repeat(MAX_MEDIA_PREFIX_LEN + 1)).unwrap_err();
    assert!(matches!(err, LibraryError::InvalidField { field: "media prefix", .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!path.exists());
    Ok(())
}

#[test]
fn create_rejects_interior_nul() -> Result<()> {
    let dir = tempdir()?;
    let err = Container::create(dir.path().join("t.lib"), "a\0b", "/m").unwrap_err();
    assert!(matches!(err, LibraryError::InvalidField { .. }));
    Ok(())
}

// --------------------- Open ---------------------

#[test]
fn open_reads_header() -> Result<()> {
    let dir = tempdir()?;
    let c = new_container(dir.path())?;
    assert_eq!(c.name()?, "test");
    assert_eq!(c.media_prefix()?, "/music");
    assert_eq!(c.media_count()?, 0);
    assert_eq!(c.lib_len()?, LIBRARY_HEADER_LEN);
    assert!(c.next_playlist(None)?.is_none());
    Ok(())
}

#[test]
fn open_rejects_short_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("short.lib");
    fs::write(&path, b"MLIB")?;

    let err = Container::open(&path, quiet_config()).unwrap_err();
    assert!(matches!(err, LibraryError::NotALibrary(_)));
    assert_eq!(err.kind(), ErrorKind::Corruption);
    Ok(())
}

#[test]
fn open_rejects_bad_magic() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("zeros.lib");
    fs::write(&path, vec![0u8; LIBRARY_HEADER_LEN])?;

    let err = Container::open(&path, quiet_config()).unwrap_err();
    assert!(matches!(err, LibraryError::NotALibrary(_)));
    Ok(())
}

#[test]
fn open_rejects_length_mismatch() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("t.lib");
    Container::create(&path, "t", "/m")?;
    OpenOptions::new()
        .append(true)
        .open(&path)?
        .write_all(&[0u8; 16])?;

    let err = Container::open(&path, quiet_config()).unwrap_err();
    assert!(matches!(err, LibraryError::Corrupt(_)));
    Ok(())
}

#[test]
fn open_rejects_missing_file() -> Result<()> {
    let dir = tempdir()?;
    let err = Container::open(dir.path().join("nope.lib"), quiet_config()).unwrap_err();
    assert!(matches!(err, LibraryError::Io(_)));
    assert_eq!(err.kind(), ErrorKind::Resource);
    Ok(())
}

#[test]
fn open_rejects_invalid_config() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("t.lib");
    Container::create(&path, "t", "/m")?;

    let err = Container::open(&path, quiet_config().with_growth_quantum(4)).unwrap_err();
    assert!(matches!(err, LibraryError::Config(_)));
    Ok(())
}

#[test]
fn open_rejects_global_name_wider_than_record_field() -> Result<()> {
    assert_eq!(config::MAX_GLOBAL_NAME_LEN, MAX_PLAYLIST_NAME_LEN);

    let dir = tempdir()?;
    let path = dir.path().join("t.lib");
    Container::create(&path, "t", "/m")?;

    let err = Container::open(&path, quiet_config().with_global_playlist("g".repeat(200)))
        .unwrap_err();
    assert!(matches!(
        err,
        LibraryError::Config(config::ConfigError::GlobalNameTooLong(200))
    ));

    let err = Library::open_with(&path, quiet_config().with_global_playlist("a\0b")).unwrap_err();
    assert!(matches!(
        err,
        LibraryError::Config(config::ConfigError::GlobalNameHasNul)
    ));
    Ok(())
}

// --------------------- Expand / Truncate ---------------------

#[test]
fn expand_grows_file_and_header() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;

    c.expand(2048)?;
    assert_eq!(c.lib_len()?, 2048);
    assert_eq!(fs::metadata(c.path())?.len(), 2048);
    assert!(c.bytes()?[LIBRARY_HEADER_LEN..].iter().all(|&b| b == 0));
    Ok(())
}

#[test]
fn expand_must_grow() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;

    assert!(matches!(
        c.expand(LIBRARY_HEADER_LEN).unwrap_err(),
        LibraryError::InvalidArgument(_)
    ));
    assert!(c.expand(100).is_err());
    Ok(())
}

#[test]
fn truncate_respects_bounds() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    c.expand(1500)?;

    assert!(c.truncate(1000).is_err());
    assert!(c.truncate(1501).is_err());
    c.truncate(1500)?;
    assert_eq!(c.lib_len()?, 1500);

    c.truncate(LIBRARY_HEADER_LEN)?;
    assert_eq!(c.lib_len()?, LIBRARY_HEADER_LEN);
    assert_eq!(fs::metadata(c.path())?.len(), LIBRARY_HEADER_LEN as u64);
    Ok(())
}

// --------------------- Excise / Insert ---------------------

fn fill_pattern(c: &mut Container, len: usize) -> Result<()> {
    c.expand(LIBRARY_HEADER_LEN + len)?;
    for (i, b) in c.bytes_mut()?[LIBRARY_HEADER_LEN..].iter_mut().enumerate() {
        *b = i as u8;
    }
    Ok(())
}

#[test]
fn excise_middle_closes_gap() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    fill_pattern(&mut c, 30)?;

    c.excise(LIBRARY_HEADER_LEN + 10, LIBRARY_HEADER_LEN + 20)?;

    assert_eq!(c.lib_len()?, LIBRARY_HEADER_LEN + 20);
    let body: Vec<u8> = c.bytes()?[LIBRARY_HEADER_LEN..].to_vec();
    let expected: Vec<u8> = (0..10).chain(20..30).collect();
    assert_eq!(body, expected);
    Ok(())
}

#[test]
fn excise_tail_only_truncates() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    fill_pattern(&mut c, 30)?;

    c.excise(LIBRARY_HEADER_LEN + 25, LIBRARY_HEADER_LEN + 30)?;
    assert_eq!(c.lib_len()?, LIBRARY_HEADER_LEN + 25);
    assert_eq!(c.bytes()?[LIBRARY_HEADER_LEN + 24], 24);
    Ok(())
}

#[test]
fn excise_empty_range_is_noop() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    fill_pattern(&mut c, 8)?;
    c.excise(LIBRARY_HEADER_LEN + 4, LIBRARY_HEADER_LEN + 4)?;
    assert_eq!(c.lib_len()?, LIBRARY_HEADER_LEN + 8);
    Ok(())
}

#[test]
fn excise_rejects_bad_ranges() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    fill_pattern(&mut c, 8)?;

    // into the header
    assert!(c.excise(1000, LIBRARY_HEADER_LEN + 2).is_err());
    // reversed
    assert!(c.excise(LIBRARY_HEADER_LEN + 4, LIBRARY_HEADER_LEN + 2).is_err());
    // past the end
    assert!(c.excise(LIBRARY_HEADER_LEN, LIBRARY_HEADER_LEN + 9).is_err());
    assert_eq!(c.lib_len()?, LIBRARY_HEADER_LEN + 8);
    Ok(())
}

#[test]
fn insert_space_shifts_and_zero_fills() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    fill_pattern(&mut c, 6)?;

    c.insert_space(LIBRARY_HEADER_LEN + 2, 3)?;

    assert_eq!(c.lib_len()?, LIBRARY_HEADER_LEN + 9);
    assert_eq!(
        &c.bytes()?[LIBRARY_HEADER_LEN..],
        &[0, 1, 0, 0, 0, 2, 3, 4, 5]
    );
    Ok(())
}

#[test]
fn insert_space_at_end_appends() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    c.insert_space(LIBRARY_HEADER_LEN, 64)?;
    assert_eq!(c.lib_len()?, LIBRARY_HEADER_LEN + 64);
    Ok(())
}

#[test]
fn insert_space_rejects_header_offset() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    assert!(c.insert_space(12, 4).is_err());
    assert!(c.insert_space(LIBRARY_HEADER_LEN + 1, 4).is_err());
    assert_eq!(c.lib_len()?, LIBRARY_HEADER_LEN);
    Ok(())
}

#[test]
fn shift_rejects_out_of_bounds() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    assert!(c.shift(1000..1030, 0).is_err());
    assert!(c.shift(0..10, 1020).is_err());
    c.shift(0..4, 4)?;
    assert_eq!(&c.bytes()?[4..8], b"MLIB");
    Ok(())
}

// --------------------- Sync / Close ---------------------

#[test]
fn close_persists_changes() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    let path = c.path().to_path_buf();
    fill_pattern(&mut c, 4)?;
    c.close()?;

    let bytes = fs::read(&path)?;
    assert_eq!(bytes.len(), LIBRARY_HEADER_LEN + 4);
    assert_eq!(&bytes[LIBRARY_HEADER_LEN..], &[0, 1, 2, 3]);
    Ok(())
}

#[test]
fn reopen_after_growth() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    let path = c.path().to_path_buf();
    c.start_playlist("rock")?;
    c.sync()?;
    c.close()?;

    let c = Container::open(&path, quiet_config())?;
    assert!(c.find_playlist("rock")?.is_some());
    c.verify()?;
    Ok(())
}

// --------------------- Verify ---------------------

#[test]
fn verify_fresh_library() -> Result<()> {
    let dir = tempdir()?;
    let c = new_container(dir.path())?;
    let report = c.verify()?;
    assert_eq!(
        report,
        VerifyReport {
            lib_len: LIBRARY_HEADER_LEN,
            playlists: 0,
            paths: 0,
        }
    );
    Ok(())
}

#[test]
fn verify_detects_mcount_drift() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    let pl = c.start_playlist("rock")?;
    c.add_path_to_playlist(pl, "/music/a.mp3")?;
    c.verify()?;

    let mcount = pl.offset() + 8;
    c.bytes_mut()?[mcount + 3] = 9;
    assert!(matches!(c.verify().unwrap_err(), LibraryError::Corrupt(_)));
    Ok(())
}

#[test]
fn verify_detects_media_count_drift() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    c.set_media_count(3)?;
    assert!(c.verify().is_err());
    Ok(())
}

#[test]
fn verify_detects_unsorted_bucket() -> Result<()> {
    let dir = tempdir()?;
    let mut c = new_container(dir.path())?;
    let pl = c.start_playlist("rock")?;
    c.add_path_to_playlist(pl, "a")?;
    c.add_path_to_playlist(pl, "b")?;

    // swap the two index slots at the end of the record
    let end = pl.offset() + c.playlist_info(pl)?.length;
    let image = c.bytes_mut()?;
    let (first, second) = (end - 8, end - 4);
    for i in 0..4 {
        image.swap(first + i, second + i);
    }
    assert!(c.verify().is_err());
    Ok(())
}
